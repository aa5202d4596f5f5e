//! Synthetic backup-file writer shared by the integration tests.
//!
//! `FileBuilder` assembles a backup file byte by byte: framing words go in
//! big-endian, payload scalars go in the byte order of the producer being
//! simulated (native, or swapped to model a foreign-endian node). The
//! helpers on top assemble whole control files and fragment skeletons so
//! individual tests only spell out the bytes they care about.

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::Path;

use backread::format::{
    ctl_file_name, data_file_name, log_file_name, FileHeader, FileKind, FragmentFooter,
    FragmentHeader, GcpEntry, SectionKind, TRIGGER_HAS_GCP,
};
use backread::schema::{encode_table_info, ColumnInfo, TableImpl};

pub const TEST_VERSION: u32 = 70;
pub const NODE_ID: u32 = 3;
pub const BACKUP_ID: u32 = 42;

pub struct FileBuilder {
    bytes: Vec<u8>,
    swapped: bool,
}

impl FileBuilder {
    pub fn new(kind: FileKind, backup_id: u32, swapped: bool) -> Self {
        let mut header = FileHeader::new(TEST_VERSION, kind, backup_id, [0xBACC, 0x0FF5]);
        if swapped {
            header = header.with_swapped_byte_order();
        }
        Self {
            bytes: header.to_bytes().to_vec(),
            swapped,
        }
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// One big-endian framing word.
    pub fn word_be(&mut self, word: u32) -> &mut Self {
        self.bytes.extend_from_slice(&word.to_be_bytes());
        self
    }

    pub fn words_be(&mut self, words: &[u32]) -> &mut Self {
        for &word in words {
            self.word_be(word);
        }
        self
    }

    /// One payload scalar in the simulated producer's byte order.
    pub fn payload_u32(&mut self, value: u32) -> &mut Self {
        let value = if self.swapped { value.swap_bytes() } else { value };
        self.bytes.extend_from_slice(&value.to_ne_bytes());
        self
    }

    pub fn payload_u16(&mut self, value: u16) -> &mut Self {
        let value = if self.swapped { value.swap_bytes() } else { value };
        self.bytes.extend_from_slice(&value.to_ne_bytes());
        self
    }

    pub fn payload_u64(&mut self, value: u64) -> &mut Self {
        let value = if self.swapped { value.swap_bytes() } else { value };
        self.bytes.extend_from_slice(&value.to_ne_bytes());
        self
    }

    /// Width-8 payload, endian-neutral.
    pub fn payload_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn table_list(&mut self, table_count: u32) -> &mut Self {
        self.word_be(SectionKind::TableList as u32)
            .word_be(table_count + 2);
        for _ in 0..table_count {
            self.word_be(0);
        }
        self
    }

    pub fn table_description(&mut self, table: &TableImpl) -> &mut Self {
        let blob = encode_table_info(table);
        self.word_be(SectionKind::TableDescription as u32)
            .word_be(blob.len() as u32 + 2)
            .words_be(&blob)
    }

    pub fn gcp_entry(&mut self, start_gcp: u32, stop_gcp: u32) -> &mut Self {
        self.raw(&GcpEntry::new(start_gcp, stop_gcp).to_bytes());
        self
    }

    pub fn fragment_header(&mut self, table_id: u32, fragment_no: u32) -> &mut Self {
        self.raw(&FragmentHeader::new(table_id, fragment_no, 0).to_bytes());
        self
    }

    /// End-of-fragment sentinel plus footer.
    pub fn end_fragment(&mut self, table_id: u32, fragment_no: u32, records: u32) -> &mut Self {
        self.word_be(0)
            .raw(&FragmentFooter::new(table_id, fragment_no, records, 0).to_bytes());
        self
    }

    /// Log record framing: length word, table id, trigger word with
    /// optional GCP flag. The caller appends the attribute stream words
    /// (already counted in `body_words`) and the GCP word if flagged.
    pub fn log_record_head(
        &mut self,
        body_words: u32,
        table_id: u32,
        event: u32,
        gcp: Option<u32>,
    ) -> &mut Self {
        let gcp_words = if gcp.is_some() { 1 } else { 0 };
        let trigger = if gcp.is_some() {
            event | TRIGGER_HAS_GCP
        } else {
            event
        };
        self.word_be(2 + body_words + gcp_words)
            .word_be(table_id)
            .word_be(trigger)
    }

    pub fn write_to(&self, path: &Path) {
        File::create(path).unwrap().write_all(&self.bytes).unwrap();
    }
}

/// A one-column table `name(pk: int32 primary key)`.
pub fn int32_pk_table(id: u32, name: &str) -> TableImpl {
    TableImpl {
        id,
        version: 1,
        name: name.to_string(),
        columns: vec![ColumnInfo::new("pk", 32, 1).primary_key()],
    }
}

/// `name(pk: int32 primary key, v: char[8] nullable)`.
pub fn nullable_char_table(id: u32, name: &str) -> TableImpl {
    TableImpl {
        id,
        version: 1,
        name: name.to_string(),
        columns: vec![
            ColumnInfo::new("pk", 32, 1).primary_key(),
            ColumnInfo::new("v", 8, 8).nullable(),
        ],
    }
}

/// Writes a complete control file for the given tables and GCP range.
pub fn write_ctl(dir: &Path, tables: &[TableImpl], start_gcp: u32, stop_gcp: u32) {
    let mut builder = FileBuilder::new(FileKind::Ctl, BACKUP_ID, false);
    builder.table_list(tables.len() as u32);
    for table in tables {
        builder.table_description(table);
    }
    builder.gcp_entry(start_gcp, stop_gcp);
    builder.write_to(&dir.join(ctl_file_name(BACKUP_ID, NODE_ID)));
}

pub fn ctl_path(dir: &Path) -> std::path::PathBuf {
    dir.join(ctl_file_name(BACKUP_ID, NODE_ID))
}

pub fn data_path(dir: &Path, file_no: u32) -> std::path::PathBuf {
    dir.join(data_file_name(BACKUP_ID, file_no, NODE_ID))
}

pub fn log_path(dir: &Path) -> std::path::PathBuf {
    dir.join(log_file_name(BACKUP_ID, NODE_ID))
}
