//! # On-Disk Backup Format
//!
//! Framing definitions shared by the control, data and log readers. Every
//! backup file starts with the same fixed 40-byte header; the body is a
//! sequence of tagged sections whose framing words (tags, lengths, table
//! ids, GCP values) are big-endian 32-bit on disk. Scalar *payload* inside
//! tuples and log records is stored in the producer's native byte order;
//! the header's byte-order marker tells the reader whether to swap it.
//!
//! ## File Header Layout (40 bytes)
//!
//! ```text
//! +----------+---------+-------------+-------------+-----------+-----------+------------+------------+
//! | magic    | version | sectionType | sectionLen  | fileType  | backupId  | backupKey  | byteOrder  |
//! | [u8; 8]  | u32 BE  | u32 BE      | u32 BE      | u32 BE    | u32 BE    | [u32 BE;2] | u32 native |
//! +----------+---------+-------------+-------------+-----------+-----------+------------+------------+
//! ```
//!
//! The byte-order marker is the one header field *not* stored big-endian:
//! the producer writes `0x12345678` in its native order, and the reader
//! interprets the four bytes in host order. Reading `0x12345678` means the
//! payload is already in host order; reading `0x78563412` means every
//! payload scalar must be byte-swapped; anything else is a corrupt file.
//!
//! ## Section Tags
//!
//! | Tag | Section | File |
//! |-----|---------|------|
//! | 1 | file header | all |
//! | 2 | table list | ctl |
//! | 3 | table description | ctl |
//! | 4 | GCP entry | ctl |
//! | 5 | fragment header | data |
//! | 6 | fragment footer | data |
//!
//! Log files carry no section tags after the header; their body is a flat
//! sequence of length-prefixed change records.
//!
//! ## File Naming
//!
//! One backup produces per node:
//!
//! ```text
//! BACKUP-<backupId>.<nodeId>.ctl
//! BACKUP-<backupId>-<fileNo>.<nodeId>.Data      (one or more)
//! BACKUP-<backupId>.<nodeId>.log
//! ```

use eyre::{ensure, Result};
use zerocopy::big_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::ReadError;

pub const MAGIC: &[u8; 8] = b"BCKUPFIL";

/// Marker value as seen when producer and reader agree on byte order.
pub const BYTE_ORDER_MAGIC: u32 = 0x1234_5678;
/// Marker value as seen when every payload scalar needs swapping.
pub const BYTE_ORDER_SWAPPED: u32 = 0x7856_3412;

pub const FILE_HEADER_SIZE: usize = 40;
pub const FRAGMENT_HEADER_SIZE: usize = 20;
pub const FRAGMENT_FOOTER_SIZE: usize = 24;
pub const GCP_ENTRY_SIZE: usize = 16;

/// Low 16 bits of a log record's trigger word: the event code.
pub const TRIGGER_EVENT_MASK: u32 = 0xFFFF;
/// Trigger-word flag: the record's last word is a GCP value.
pub const TRIGGER_HAS_GCP: u32 = 0x1_0000;

pub const TRIGGER_INSERT: u32 = 0;
pub const TRIGGER_UPDATE: u32 = 1;
pub const TRIGGER_DELETE: u32 = 2;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    FileHeader = 1,
    TableList = 2,
    TableDescription = 3,
    GcpEntry = 4,
    FragmentHeader = 5,
    FragmentFooter = 6,
}

impl SectionKind {
    pub fn from_word(word: u32) -> Option<Self> {
        match word {
            1 => Some(SectionKind::FileHeader),
            2 => Some(SectionKind::TableList),
            3 => Some(SectionKind::TableDescription),
            4 => Some(SectionKind::GcpEntry),
            5 => Some(SectionKind::FragmentHeader),
            6 => Some(SectionKind::FragmentFooter),
            _ => None,
        }
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Ctl = 1,
    Data = 2,
    Log = 3,
}

impl FileKind {
    pub fn from_word(word: u32) -> Option<Self> {
        match word {
            1 => Some(FileKind::Ctl),
            2 => Some(FileKind::Data),
            3 => Some(FileKind::Log),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FileKind::Ctl => "control",
            FileKind::Data => "data",
            FileKind::Log => "log",
        }
    }
}

pub fn ctl_file_name(backup_id: u32, node_id: u32) -> String {
    format!("BACKUP-{}.{}.ctl", backup_id, node_id)
}

pub fn data_file_name(backup_id: u32, file_no: u32, node_id: u32) -> String {
    format!("BACKUP-{}-{}.{}.Data", backup_id, file_no, node_id)
}

pub fn log_file_name(backup_id: u32, node_id: u32) -> String {
    format!("BACKUP-{}.{}.log", backup_id, node_id)
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct FileHeader {
    magic: [u8; 8],
    version: U32,
    section_type: U32,
    section_length: U32,
    file_type: U32,
    backup_id: U32,
    backup_key: [U32; 2],
    byte_order: [u8; 4],
}

const _: () = assert!(std::mem::size_of::<FileHeader>() == FILE_HEADER_SIZE);

impl FileHeader {
    pub fn new(version: u32, file_kind: FileKind, backup_id: u32, backup_key: [u32; 2]) -> Self {
        Self {
            magic: *MAGIC,
            version: U32::new(version),
            section_type: U32::new(SectionKind::FileHeader as u32),
            // Header length in words, including the magic.
            section_length: U32::new((FILE_HEADER_SIZE / 4) as u32),
            file_type: U32::new(file_kind as u32),
            backup_id: U32::new(backup_id),
            backup_key: [U32::new(backup_key[0]), U32::new(backup_key[1])],
            byte_order: BYTE_ORDER_MAGIC.to_ne_bytes(),
        }
    }

    /// Marks the header as produced on a machine of the opposite byte
    /// order. Used by the synthetic-file writers in tests.
    pub fn with_swapped_byte_order(mut self) -> Self {
        self.byte_order = BYTE_ORDER_MAGIC.swap_bytes().to_ne_bytes();
        self
    }

    pub fn to_bytes(&self) -> [u8; FILE_HEADER_SIZE] {
        let mut out = [0u8; FILE_HEADER_SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure!(
            bytes.len() >= FILE_HEADER_SIZE,
            ReadError::format(format!(
                "buffer too small for file header: {} < {}",
                bytes.len(),
                FILE_HEADER_SIZE
            ))
        );

        let header = Self::read_from_bytes(&bytes[..FILE_HEADER_SIZE])
            .map_err(|e| ReadError::format(format!("unreadable file header: {:?}", e)))?;

        ensure!(
            &header.magic == MAGIC,
            ReadError::format("bad magic in backup file header")
        );

        Ok(header)
    }

    pub fn version(&self) -> u32 {
        self.version.get()
    }

    pub fn section_type(&self) -> u32 {
        self.section_type.get()
    }

    pub fn section_length(&self) -> u32 {
        self.section_length.get()
    }

    pub fn file_type(&self) -> u32 {
        self.file_type.get()
    }

    pub fn backup_id(&self) -> u32 {
        self.backup_id.get()
    }

    pub fn backup_key(&self) -> [u32; 2] {
        [self.backup_key[0].get(), self.backup_key[1].get()]
    }

    /// The marker word interpreted in host order; compare against
    /// [`BYTE_ORDER_MAGIC`] and [`BYTE_ORDER_SWAPPED`].
    pub fn byte_order_marker(&self) -> u32 {
        u32::from_ne_bytes(self.byte_order)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct FragmentHeader {
    section_type: U32,
    section_length: U32,
    table_id: U32,
    fragment_no: U32,
    checksum_type: U32,
}

const _: () = assert!(std::mem::size_of::<FragmentHeader>() == FRAGMENT_HEADER_SIZE);

impl FragmentHeader {
    pub fn new(table_id: u32, fragment_no: u32, checksum_type: u32) -> Self {
        Self {
            section_type: U32::new(SectionKind::FragmentHeader as u32),
            section_length: U32::new((FRAGMENT_HEADER_SIZE / 4) as u32),
            table_id: U32::new(table_id),
            fragment_no: U32::new(fragment_no),
            checksum_type: U32::new(checksum_type),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read_from_bytes(bytes)
            .map_err(|e| ReadError::format(format!("unreadable fragment header: {:?}", e)).into())
    }

    pub fn to_bytes(&self) -> [u8; FRAGMENT_HEADER_SIZE] {
        let mut out = [0u8; FRAGMENT_HEADER_SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    pub fn section_type(&self) -> u32 {
        self.section_type.get()
    }

    pub fn table_id(&self) -> u32 {
        self.table_id.get()
    }

    pub fn fragment_no(&self) -> u32 {
        self.fragment_no.get()
    }

    pub fn checksum_type(&self) -> u32 {
        self.checksum_type.get()
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct FragmentFooter {
    section_type: U32,
    section_length: U32,
    table_id: U32,
    fragment_no: U32,
    no_of_records: U32,
    checksum: U32,
}

const _: () = assert!(std::mem::size_of::<FragmentFooter>() == FRAGMENT_FOOTER_SIZE);

impl FragmentFooter {
    pub fn new(table_id: u32, fragment_no: u32, no_of_records: u32, checksum: u32) -> Self {
        Self {
            section_type: U32::new(SectionKind::FragmentFooter as u32),
            section_length: U32::new((FRAGMENT_FOOTER_SIZE / 4) as u32),
            table_id: U32::new(table_id),
            fragment_no: U32::new(fragment_no),
            no_of_records: U32::new(no_of_records),
            checksum: U32::new(checksum),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read_from_bytes(bytes)
            .map_err(|e| ReadError::format(format!("unreadable fragment footer: {:?}", e)).into())
    }

    pub fn to_bytes(&self) -> [u8; FRAGMENT_FOOTER_SIZE] {
        let mut out = [0u8; FRAGMENT_FOOTER_SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    pub fn section_type(&self) -> u32 {
        self.section_type.get()
    }

    pub fn table_id(&self) -> u32 {
        self.table_id.get()
    }

    pub fn fragment_no(&self) -> u32 {
        self.fragment_no.get()
    }

    pub fn no_of_records(&self) -> u32 {
        self.no_of_records.get()
    }

    pub fn checksum(&self) -> u32 {
        self.checksum.get()
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct GcpEntry {
    section_type: U32,
    section_length: U32,
    start_gcp: U32,
    stop_gcp: U32,
}

const _: () = assert!(std::mem::size_of::<GcpEntry>() == GCP_ENTRY_SIZE);

impl GcpEntry {
    pub fn new(start_gcp: u32, stop_gcp: u32) -> Self {
        Self {
            section_type: U32::new(SectionKind::GcpEntry as u32),
            section_length: U32::new((GCP_ENTRY_SIZE / 4) as u32),
            start_gcp: U32::new(start_gcp),
            stop_gcp: U32::new(stop_gcp),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read_from_bytes(bytes)
            .map_err(|e| ReadError::format(format!("unreadable GCP entry: {:?}", e)).into())
    }

    pub fn to_bytes(&self) -> [u8; GCP_ENTRY_SIZE] {
        let mut out = [0u8; GCP_ENTRY_SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    pub fn section_type(&self) -> u32 {
        self.section_type.get()
    }

    pub fn start_gcp(&self) -> u32 {
        self.start_gcp.get()
    }

    pub fn stop_gcp(&self) -> u32 {
        self.stop_gcp.get()
    }
}
