//! # Data File Reader
//!
//! Iterates a data file at two levels: fragments, then tuples within the
//! current fragment. A fragment is one partition of one table's rows:
//!
//! ```text
//! +-----------------+--------+--------+-----+--------+------------+-----------------+
//! | fragment header | tuple  | tuple  | ... | tuple  | 0x00000000 | fragment footer |
//! | (5 words)       |        |        |     |        | terminator | (6 words)       |
//! +-----------------+--------+--------+-----+--------+------------+-----------------+
//! ```
//!
//! ## Tuple Layout
//!
//! Each tuple is a length word (in 32-bit words) followed by that many
//! words, laid out as:
//!
//! ```text
//! +--------------+-----------------+------------------+---------------------------+
//! | null bitmask | fixed-key area  | fixed-attr area  | variable area             |
//! | [u32; B]     | per key column  | per non-nullable | per non-null nullable:    |
//! |              | size_in_words   | size_in_words    | (sz, id) + sz words       |
//! +--------------+-----------------+------------------+---------------------------+
//! ```
//!
//! Bit `i` of the bitmask marks the nullable column with null-bit index
//! `i` as null; null columns occupy nothing in the variable area. The
//! variable records carry `(sz, id)` big-endian framing words; `id` must
//! equal the expected attribute id, and the payload may pad past the
//! declared array length, so byte-swapping uses the declared length.
//!
//! ## Yield Policy
//!
//! `next_tuple` returns an owned [`Tuple`]: the tuple buffer lives inside
//! the value and the consumer decides how long to keep it. Attribute views
//! borrow from the tuple they came from. Nothing is invalidated behind the
//! consumer's back and nothing leaks.
//!
//! After the end-of-fragment sentinel (`next_tuple` returning `Ok(None)`),
//! the caller runs `validate_fragment_footer`, then `next_fragment`. The
//! footer's record count must match what was decoded; its checksum is
//! parsed but not verified.

use eyre::{bail, ensure, Result};

use crate::error::ReadError;
use crate::format::{
    data_file_name, FileKind, FragmentFooter, FragmentHeader, SectionKind, FRAGMENT_FOOTER_SIZE,
    FRAGMENT_HEADER_SIZE,
};
use crate::reader::attr::{AttrSlot, Attribute};
use crate::reader::file::BackupFile;
use crate::schema::{Metadata, Table};
use crate::sink::MessageSink;

/// One fragment's identity, yielded by [`DataReader::next_fragment`].
#[derive(Debug, Clone, Copy)]
pub struct Fragment<'a> {
    table: &'a Table,
    fragment_no: u32,
    checksum_type: u32,
}

impl<'a> Fragment<'a> {
    pub fn table(&self) -> &'a Table {
        self.table
    }

    pub fn fragment_no(&self) -> u32 {
        self.fragment_no
    }

    /// Parsed from the fragment header; checksums are not verified.
    pub fn checksum_type(&self) -> u32 {
        self.checksum_type
    }
}

/// One decoded row, bound to its table. Owns its data buffer; attribute
/// views borrow from it.
#[derive(Debug)]
pub struct Tuple<'a> {
    table: &'a Table,
    data: Vec<u8>,
    slots: Vec<AttrSlot>,
}

impl<'a> Tuple<'a> {
    pub fn table(&self) -> &'a Table {
        self.table
    }

    pub fn attr_count(&self) -> usize {
        self.slots.len()
    }

    pub fn attr(&self, attr_id: u32) -> Option<Attribute<'_>> {
        let slot = self.slots.get(attr_id as usize)?;
        let desc = self.table.attr(attr_id)?;
        Some(Attribute::new(desc, &self.data, slot))
    }

    /// All attributes in attribute-id order.
    pub fn attrs(&self) -> impl Iterator<Item = Attribute<'_>> {
        self.slots.iter().map(|slot| {
            let desc = self.table.attr(slot.attr_id).expect("slot ids match table");
            Attribute::new(desc, &self.data, slot)
        })
    }
}

#[derive(Debug)]
pub struct DataReader<'a> {
    meta: &'a Metadata,
    file: BackupFile,
    current_table: Option<&'a Table>,
    fragment_no: u32,
    tuple_count: u32,
}

impl<'a> DataReader<'a> {
    /// Opens `BACKUP-<backupId>-<fileNo>.<nodeId>.Data` under the
    /// metadata's directory. One reader covers one file; walking a node's
    /// file sequence is the consumer's loop.
    pub fn new(meta: &'a Metadata, file_no: u32) -> Result<Self> {
        let path = meta
            .dir()
            .join(data_file_name(meta.backup_id(), file_no, meta.node_id()));
        let file = BackupFile::open(path, FileKind::Data, meta.backup_id())?;
        Ok(Self {
            meta,
            file,
            current_table: None,
            fragment_no: 0,
            tuple_count: 0,
        })
    }

    pub fn with_sink(mut self, sink: Box<dyn MessageSink>) -> Self {
        self.file.set_sink(sink);
        self
    }

    pub fn read_header(&mut self) -> Result<()> {
        self.file.read_header()
    }

    /// Advances to the next fragment. `Ok(None)` at clean end of file.
    pub fn next_fragment(&mut self) -> Result<Option<Fragment<'a>>> {
        self.file.ensure_header()?;
        if self.file.at_eof() {
            return Ok(None);
        }

        let bytes = self.file.read_exact(FRAGMENT_HEADER_SIZE)?;
        let header = FragmentHeader::from_bytes(bytes)?;
        ensure!(
            header.section_type() == SectionKind::FragmentHeader as u32,
            ReadError::format(format!(
                "{}: section tag {} where a fragment header was expected",
                self.file.path().display(),
                header.section_type()
            ))
        );

        let table = self
            .meta
            .table(header.table_id())
            .ok_or_else(|| ReadError::unknown_table(header.table_id()))?;

        self.current_table = Some(table);
        self.fragment_no = header.fragment_no();
        self.tuple_count = 0;

        self.file.sink().info(&format!(
            "restoring data in table {} ({}) fragment {}",
            table.name(),
            table.id(),
            header.fragment_no()
        ));

        Ok(Some(Fragment {
            table,
            fragment_no: header.fragment_no(),
            checksum_type: header.checksum_type(),
        }))
    }

    /// Decodes the next tuple of the current fragment. `Ok(None)` on the
    /// end-of-fragment sentinel; follow with `validate_fragment_footer`.
    pub fn next_tuple(&mut self) -> Result<Option<Tuple<'a>>> {
        let table = match self.current_table {
            Some(table) => table,
            None => bail!(ReadError::format(
                "next_tuple called without an open fragment"
            )),
        };

        let data_len_words = self.file.read_u32_be()? as usize;
        if data_len_words == 0 {
            return Ok(None);
        }

        let mut buf = vec![0u8; data_len_words * 4];
        self.file.read_into(&mut buf)?;

        let mut slots: Vec<AttrSlot> = table
            .attrs()
            .iter()
            .map(|a| AttrSlot::null(a.attr_id()))
            .collect();

        let bitmask_words = table.null_bitmask_words();
        ensure!(
            bitmask_words <= data_len_words,
            ReadError::format(format!(
                "tuple of {} words is shorter than its {}-word null bitmask",
                data_len_words, bitmask_words
            ))
        );

        let mut cursor = bitmask_words;

        for desc in table.fixed_keys().chain(table.fixed_attrs()) {
            let sz_words = desc.size_in_words();
            ensure!(
                cursor + sz_words <= data_len_words,
                ReadError::format(format!(
                    "fixed area of attribute {} overruns the tuple buffer",
                    desc.attr_id()
                ))
            );

            let offset = cursor * 4;
            let len = desc.size_in_bytes();
            self.file
                .twiddle_attr(&mut buf[offset..offset + len], desc, None)?;
            slots[desc.attr_id() as usize] = AttrSlot::data(desc.attr_id(), offset, len);
            cursor += sz_words;
        }

        // Variable area: the var group is exactly the nullable columns.
        for desc in table.var_attrs() {
            if null_bit(&buf, desc.null_bit_index()) {
                continue;
            }

            ensure!(
                cursor + 2 <= data_len_words,
                ReadError::format(format!(
                    "variable record of attribute {} overruns the tuple buffer",
                    desc.attr_id()
                ))
            );
            let sz = be_word(&buf, cursor) as usize;
            let id = be_word(&buf, cursor + 1);
            ensure!(
                id == desc.attr_id(),
                ReadError::consistency(format!(
                    "variable record carries attribute id {}, expected {}",
                    id,
                    desc.attr_id()
                ))
            );
            ensure!(
                cursor + 2 + sz <= data_len_words,
                ReadError::format(format!(
                    "variable payload of attribute {} overruns the tuple buffer",
                    id
                ))
            );

            // Payload may pad past the declared array length.
            let elem_bytes = desc.width_bits() as usize / 8;
            let effective_len = (4 * sz) / elem_bytes;
            ensure!(
                effective_len >= desc.array_len() as usize,
                ReadError::consistency(format!(
                    "variable payload holds {} elements, declared array is {}",
                    effective_len,
                    desc.array_len()
                ))
            );

            let offset = (cursor + 2) * 4;
            let len = desc.size_in_bytes();
            self.file
                .twiddle_attr(&mut buf[offset..offset + len], desc, None)?;
            slots[desc.attr_id() as usize] = AttrSlot::data(desc.attr_id(), offset, len);
            cursor += sz + 2;
        }

        self.tuple_count += 1;
        Ok(Some(Tuple {
            table,
            data: buf,
            slots,
        }))
    }

    /// Reads the fragment footer after the end-of-fragment sentinel and
    /// checks its record count against what was decoded. The checksum is
    /// parsed but not verified.
    pub fn validate_fragment_footer(&mut self) -> Result<()> {
        ensure!(
            self.current_table.is_some(),
            ReadError::format("validate_fragment_footer called without an open fragment")
        );

        let bytes = self.file.read_exact(FRAGMENT_FOOTER_SIZE)?;
        let footer = FragmentFooter::from_bytes(bytes)?;
        ensure!(
            footer.section_type() == SectionKind::FragmentFooter as u32,
            ReadError::format(format!(
                "{}: section tag {} where a fragment footer was expected",
                self.file.path().display(),
                footer.section_type()
            ))
        );
        ensure!(
            footer.no_of_records() == self.tuple_count,
            ReadError::consistency(format!(
                "fragment {} footer declares {} records, decoded {}",
                self.fragment_no,
                footer.no_of_records(),
                self.tuple_count
            ))
        );

        self.file.sink().debug(&format!(
            "fragment {} complete: {} tuples",
            self.fragment_no, self.tuple_count
        ));
        self.current_table = None;
        Ok(())
    }
}

fn be_word(buf: &[u8], word_index: usize) -> u32 {
    let offset = word_index * 4;
    u32::from_be_bytes(buf[offset..offset + 4].try_into().unwrap())
}

fn null_bit(buf: &[u8], bit: u32) -> bool {
    let word = be_word(buf, (bit / 32) as usize);
    word >> (bit % 32) & 1 == 1
}
