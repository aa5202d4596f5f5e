//! # Log File Reader
//!
//! Flat iteration over the change log written alongside a backup's data
//! files. Each record is a big-endian length word (zero terminates the
//! log) followed by that many words:
//!
//! ```text
//! +----------+---------------+--------------------------------+-----------+
//! | table id | trigger word  | attribute stream               | gcp       |
//! | u32 BE   | u32 BE        | (header + payload) per column  | u32 BE    |
//! |          |               |                                | if flagged|
//! +----------+---------------+--------------------------------+-----------+
//! ```
//!
//! The trigger word's low 16 bits carry the event code; bit `0x10000`
//! flags a trailing GCP word, which is excluded from the attribute stream.
//! Each attribute header word packs `attr_id << 16 | size_in_words`; a
//! zero size marks a null cell, otherwise the payload follows immediately
//! and is byte-swapped with the column's declared array length.
//!
//! ## Checkpoint Filter
//!
//! Entries stamped with a GCP beyond `stop_gcp + 1` fall outside the
//! backup's consistency window and are dropped silently before any schema
//! work; the reader advances to the next record. Entries without a GCP
//! stamp always pass.
//!
//! Yielded entries are owned values: the record buffer lives inside the
//! [`LogEntry`] and attribute views borrow from it, same policy as the
//! data path.

use eyre::{bail, ensure, Result};
use smallvec::SmallVec;

use crate::error::ReadError;
use crate::format::{
    log_file_name, FileKind, TRIGGER_DELETE, TRIGGER_EVENT_MASK, TRIGGER_HAS_GCP, TRIGGER_INSERT,
    TRIGGER_UPDATE,
};
use crate::reader::attr::{AttrSlot, Attribute};
use crate::reader::file::BackupFile;
use crate::schema::{Metadata, Table};
use crate::sink::MessageSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEntryKind {
    Insert,
    Update,
    Delete,
}

/// One change record, bound to its table. Owns its record buffer;
/// attribute views borrow from it. Attributes appear in stream order,
/// which is the producer's column-change order, not attribute-id order.
#[derive(Debug)]
pub struct LogEntry<'a> {
    table: &'a Table,
    kind: LogEntryKind,
    gcp: Option<u32>,
    data: Vec<u8>,
    values: SmallVec<[AttrSlot; 8]>,
}

impl<'a> LogEntry<'a> {
    pub fn table(&self) -> &'a Table {
        self.table
    }

    pub fn kind(&self) -> LogEntryKind {
        self.kind
    }

    /// The record's checkpoint stamp, when the producer wrote one.
    pub fn gcp(&self) -> Option<u32> {
        self.gcp
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    pub fn value(&self, index: usize) -> Option<Attribute<'_>> {
        let slot = self.values.get(index)?;
        let desc = self.table.attr(slot.attr_id)?;
        Some(Attribute::new(desc, &self.data, slot))
    }

    /// Attributes present in this entry, in stream order.
    pub fn values(&self) -> impl Iterator<Item = Attribute<'_>> {
        self.values.iter().map(|slot| {
            let desc = self.table.attr(slot.attr_id).expect("slot ids match table");
            Attribute::new(desc, &self.data, slot)
        })
    }
}

pub struct LogReader<'a> {
    meta: &'a Metadata,
    file: BackupFile,
    count: u32,
}

impl<'a> LogReader<'a> {
    /// Opens `BACKUP-<backupId>.<nodeId>.log` under the metadata's
    /// directory.
    pub fn new(meta: &'a Metadata) -> Result<Self> {
        let path = meta
            .dir()
            .join(log_file_name(meta.backup_id(), meta.node_id()));
        let file = BackupFile::open(path, FileKind::Log, meta.backup_id())?;
        Ok(Self {
            meta,
            file,
            count: 0,
        })
    }

    pub fn with_sink(mut self, sink: Box<dyn MessageSink>) -> Self {
        self.file.set_sink(sink);
        self
    }

    pub fn read_header(&mut self) -> Result<()> {
        self.file.read_header()
    }

    /// Entries emitted so far (dropped entries are not counted).
    pub fn entries_read(&self) -> u32 {
        self.count
    }

    /// Decodes the next change record within the checkpoint window.
    /// `Ok(None)` on the zero length word that terminates the log.
    pub fn next_entry(&mut self) -> Result<Option<LogEntry<'a>>> {
        self.file.ensure_header()?;
        let stop_gcp = self.meta.stop_gcp();

        loop {
            let len = self.file.read_u32_be()? as usize;
            if len == 0 {
                return Ok(None);
            }
            ensure!(
                len >= 2,
                ReadError::format(format!(
                    "log record of {} words cannot carry table id and event",
                    len
                ))
            );

            let mut buf = vec![0u8; len * 4];
            self.file.read_into(&mut buf)?;

            let table_id = be_word(&buf, 0);
            let trigger = be_word(&buf, 1);
            let has_gcp = trigger & TRIGGER_HAS_GCP != 0;

            let (stream_end, gcp) = if has_gcp {
                ensure!(
                    len >= 3,
                    ReadError::format("log record flags a GCP word it does not carry")
                );
                (len - 1, Some(be_word(&buf, len - 1)))
            } else {
                (len, None)
            };

            // Entries past the consistency window are dropped before any
            // schema work.
            if let Some(gcp) = gcp {
                if gcp > stop_gcp + 1 {
                    continue;
                }
            }

            let table = self
                .meta
                .table(table_id)
                .ok_or_else(|| ReadError::unknown_table(table_id))?;

            let kind = match trigger & TRIGGER_EVENT_MASK {
                TRIGGER_INSERT => LogEntryKind::Insert,
                TRIGGER_UPDATE => LogEntryKind::Update,
                TRIGGER_DELETE => LogEntryKind::Delete,
                other => bail!(ReadError::format(format!(
                    "unrecognized trigger event {} for table {}",
                    other, table_id
                ))),
            };

            let values = self.decode_values(&mut buf, table, stream_end)?;

            self.count += 1;
            return Ok(Some(LogEntry {
                table,
                kind,
                gcp,
                data: buf,
                values,
            }));
        }
    }

    fn decode_values(
        &self,
        buf: &mut [u8],
        table: &Table,
        stream_end: usize,
    ) -> Result<SmallVec<[AttrSlot; 8]>> {
        let mut values = SmallVec::new();
        let mut pos = 2;

        while pos < stream_end {
            let header = be_word(buf, pos);
            let attr_id = header >> 16;
            let sz = (header & 0xFFFF) as usize;

            let desc = table.attr(attr_id).ok_or_else(|| {
                ReadError::consistency(format!(
                    "log record changes attribute {} unknown to table {}",
                    attr_id,
                    table.id()
                ))
            })?;

            if sz == 0 {
                values.push(AttrSlot::null(attr_id));
                pos += 1;
                continue;
            }

            ensure!(
                pos + 1 + sz <= stream_end,
                ReadError::format(format!(
                    "payload of attribute {} overruns the log record",
                    attr_id
                ))
            );

            let declared = desc.size_in_bytes();
            ensure!(
                declared <= sz * 4,
                ReadError::consistency(format!(
                    "payload of attribute {} holds {} bytes, declared size is {}",
                    attr_id,
                    sz * 4,
                    declared
                ))
            );

            let offset = (pos + 1) * 4;
            self.file
                .twiddle_attr(&mut buf[offset..offset + declared], desc, None)?;
            values.push(AttrSlot::data(attr_id, offset, declared));
            pos += 1 + sz;
        }

        Ok(values)
    }
}

fn be_word(buf: &[u8], word_index: usize) -> u32 {
    let offset = word_index * 4;
    u32::from_be_bytes(buf[offset..offset + 4].try_into().unwrap())
}
