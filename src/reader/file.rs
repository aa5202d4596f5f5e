//! # Backup File Access
//!
//! [`BackupFile`] owns one open backup file: the handle, the negotiated
//! header, and a reusable scratch buffer for section framing. All three
//! readers (control, data, log) sit on top of it.
//!
//! ## Byte-Order Negotiation
//!
//! The header's own integer fields are always big-endian on disk. The
//! payload inside data and log files is in the *producer's* native order;
//! `read_header` interprets the marker word in host order and records
//! whether payload scalars need swapping. [`BackupFile::twiddle_attr`]
//! applies that decision so decode loops never test the flag themselves.
//!
//! ## Scratch Buffer
//!
//! Section framing is read through one buffer owned by the file, grown to
//! `current + 2 * requested` whenever a read does not fit and never shrunk.
//! Tuple and log-record payload is *not* read into the scratch buffer: it
//! goes into fresh buffers owned by the yielded values (see the data and
//! log readers).
//!
//! ## End of File
//!
//! A short read is an `Io` error. Clean end-of-file is only observable at
//! a record boundary, via [`BackupFile::at_eof`], which compares consumed
//! bytes against the size captured at open.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use eyre::{bail, ensure, Result};

use crate::error::ReadError;
use crate::format::{
    FileHeader, FileKind, SectionKind, BYTE_ORDER_MAGIC, BYTE_ORDER_SWAPPED, FILE_HEADER_SIZE,
};
use crate::schema::AttributeDesc;
use crate::sink::{MessageSink, NullSink};
use crate::twiddle::twiddle;

pub struct BackupFile {
    path: PathBuf,
    file: File,
    file_size: u64,
    consumed: u64,
    expected_kind: FileKind,
    /// Recorded for diagnostics; the format does not require the producer
    /// to re-check it in every file, and neither do we.
    expected_backup_id: u32,
    header: Option<FileHeader>,
    host_byte_order: bool,
    scratch: Vec<u8>,
    sink: Box<dyn MessageSink>,
}

impl std::fmt::Debug for BackupFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupFile")
            .field("path", &self.path)
            .field("file_size", &self.file_size)
            .field("consumed", &self.consumed)
            .field("expected_kind", &self.expected_kind)
            .field("expected_backup_id", &self.expected_backup_id)
            .field("header", &self.header)
            .field("host_byte_order", &self.host_byte_order)
            .finish()
    }
}

impl BackupFile {
    /// Opens a backup file. The header is not read yet; `read_header`
    /// validates magic, file kind and byte-order marker.
    pub fn open(path: PathBuf, expected_kind: FileKind, expected_backup_id: u32) -> Result<Self> {
        let file = File::open(&path).map_err(|e| {
            ReadError::io(format!("failed to open {}: {}", path.display(), e))
        })?;
        let file_size = file
            .metadata()
            .map_err(|e| ReadError::io(format!("failed to stat {}: {}", path.display(), e)))?
            .len();

        Ok(Self {
            path,
            file,
            file_size,
            consumed: 0,
            expected_kind,
            expected_backup_id,
            header: None,
            host_byte_order: true,
            scratch: Vec::new(),
            sink: Box::new(NullSink),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn expected_backup_id(&self) -> u32 {
        self.expected_backup_id
    }

    pub fn set_sink(&mut self, sink: Box<dyn MessageSink>) {
        self.sink = sink;
    }

    pub fn sink(&self) -> &dyn MessageSink {
        self.sink.as_ref()
    }

    /// Reads and validates the fixed file header, then resolves the
    /// byte-order marker. Must precede any section read.
    pub fn read_header(&mut self) -> Result<()> {
        let bytes = read_scratch(
            &mut self.file,
            &mut self.scratch,
            &mut self.consumed,
            &self.path,
            FILE_HEADER_SIZE,
        )?;
        let header = FileHeader::from_bytes(bytes)?;

        ensure!(
            header.section_type() == SectionKind::FileHeader as u32,
            ReadError::format(format!(
                "{}: first section tag is {}, expected file header",
                self.path.display(),
                header.section_type()
            ))
        );

        let kind = FileKind::from_word(header.file_type());
        ensure!(
            kind == Some(self.expected_kind),
            ReadError::format(format!(
                "{}: file type word {} does not mark a {} file",
                self.path.display(),
                header.file_type(),
                self.expected_kind.name()
            ))
        );

        self.host_byte_order = match header.byte_order_marker() {
            BYTE_ORDER_MAGIC => true,
            BYTE_ORDER_SWAPPED => false,
            other => bail!(ReadError::format(format!(
                "{}: unrecognized byte-order marker {:#010x}",
                self.path.display(),
                other
            ))),
        };

        self.sink.debug(&format!(
            "{}: header ok, backup {} version {} host-order {}",
            self.path.display(),
            header.backup_id(),
            header.version(),
            self.host_byte_order
        ));

        self.header = Some(header);
        Ok(())
    }

    /// Header negotiated by `read_header`, if it ran.
    pub fn header(&self) -> Option<&FileHeader> {
        self.header.as_ref()
    }

    pub(crate) fn ensure_header(&mut self) -> Result<()> {
        if self.header.is_none() {
            self.read_header()?;
        }
        Ok(())
    }

    /// Whether payload scalars are already in host order.
    pub fn host_byte_order(&self) -> bool {
        self.host_byte_order
    }

    /// True once every byte of the file has been consumed.
    pub fn at_eof(&self) -> bool {
        self.consumed >= self.file_size
    }

    /// Reads exactly `len` bytes through the scratch buffer.
    pub fn read_exact(&mut self, len: usize) -> Result<&[u8]> {
        read_scratch(
            &mut self.file,
            &mut self.scratch,
            &mut self.consumed,
            &self.path,
            len,
        )
    }

    /// Reads exactly `buf.len()` bytes into a caller-owned buffer.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        self.file.read_exact(buf).map_err(|e| {
            ReadError::io(format!(
                "{}: short read of {} bytes at offset {}: {}",
                self.path.display(),
                buf.len(),
                self.consumed,
                e
            ))
        })?;
        self.consumed += buf.len() as u64;
        Ok(())
    }

    /// Reads one big-endian framing word.
    pub fn read_u32_be(&mut self) -> Result<u32> {
        let bytes = self.read_exact(4)?;
        Ok(u32::from_be_bytes(bytes.try_into().unwrap()))
    }

    /// Reads `count` big-endian framing words into host order.
    pub fn read_words_be(&mut self, count: usize) -> Result<Vec<u32>> {
        let bytes = self.read_exact(count * 4)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|w| u32::from_be_bytes(w.try_into().unwrap()))
            .collect())
    }

    /// Byte-swaps one decoded attribute in place, honoring the negotiated
    /// byte order. `count` defaults to the descriptor's declared array
    /// length.
    pub fn twiddle_attr(
        &self,
        bytes: &mut [u8],
        desc: &AttributeDesc,
        count: Option<u32>,
    ) -> Result<()> {
        if self.host_byte_order {
            return Ok(());
        }
        let count = count.unwrap_or_else(|| desc.array_len());
        twiddle(bytes, desc.width_bits(), count as usize)
    }
}

fn read_scratch<'a>(
    file: &mut File,
    scratch: &'a mut Vec<u8>,
    consumed: &mut u64,
    path: &Path,
    len: usize,
) -> Result<&'a [u8]> {
    if len > scratch.len() {
        let grown = scratch.len() + 2 * len;
        scratch.resize(grown, 0);
    }

    file.read_exact(&mut scratch[..len]).map_err(|e| {
        ReadError::io(format!(
            "{}: short read of {} bytes at offset {}: {}",
            path.display(),
            len,
            consumed,
            e
        ))
    })?;
    *consumed += len as u64;
    Ok(&scratch[..len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{error_kind, ReadErrorKind};
    use std::io::Write;
    use tempfile::tempdir;
    use zerocopy::IntoBytes;

    fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        File::create(&path).unwrap().write_all(bytes).unwrap();
        path
    }

    #[test]
    fn open_missing_file_is_io() {
        let dir = tempdir().unwrap();
        let err = BackupFile::open(dir.path().join("absent.ctl"), FileKind::Ctl, 1).unwrap_err();
        assert_eq!(error_kind(&err), Some(ReadErrorKind::Io));
    }

    #[test]
    fn header_negotiation_native() {
        let dir = tempdir().unwrap();
        let header = FileHeader::new(70, FileKind::Ctl, 42, [1, 2]);
        let path = write_file(dir.path(), "b.ctl", header.as_bytes());

        let mut file = BackupFile::open(path, FileKind::Ctl, 42).unwrap();
        file.read_header().unwrap();

        assert!(file.host_byte_order());
        assert_eq!(file.header().unwrap().backup_id(), 42);
        assert!(file.at_eof());
    }

    #[test]
    fn header_negotiation_swapped() {
        let dir = tempdir().unwrap();
        let header = FileHeader::new(70, FileKind::Data, 42, [0, 0]).with_swapped_byte_order();
        let path = write_file(dir.path(), "b.data", header.as_bytes());

        let mut file = BackupFile::open(path, FileKind::Data, 42).unwrap();
        file.read_header().unwrap();
        assert!(!file.host_byte_order());
    }

    #[test]
    fn wrong_file_kind_is_format() {
        let dir = tempdir().unwrap();
        let header = FileHeader::new(70, FileKind::Data, 42, [0, 0]);
        let path = write_file(dir.path(), "b.ctl", header.as_bytes());

        let mut file = BackupFile::open(path, FileKind::Ctl, 42).unwrap();
        let err = file.read_header().unwrap_err();
        assert_eq!(error_kind(&err), Some(ReadErrorKind::Format));
    }

    #[test]
    fn garbage_marker_is_format() {
        let dir = tempdir().unwrap();
        let header = FileHeader::new(70, FileKind::Ctl, 42, [0, 0]);
        let mut bytes = header.as_bytes().to_vec();
        bytes[36..40].copy_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
        let path = write_file(dir.path(), "b.ctl", &bytes);

        let mut file = BackupFile::open(path, FileKind::Ctl, 42).unwrap();
        let err = file.read_header().unwrap_err();
        assert_eq!(error_kind(&err), Some(ReadErrorKind::Format));
    }

    #[test]
    fn truncated_header_is_io() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "b.ctl", &[0u8; 12]);

        let mut file = BackupFile::open(path, FileKind::Ctl, 42).unwrap();
        let err = file.read_header().unwrap_err();
        assert_eq!(error_kind(&err), Some(ReadErrorKind::Io));
    }

    #[test]
    fn framing_words_decode_big_endian() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "w", &[0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x01, 0x00]);

        let mut file = BackupFile::open(path, FileKind::Ctl, 0).unwrap();
        assert_eq!(file.read_u32_be().unwrap(), 7);
        assert_eq!(file.read_words_be(1).unwrap(), vec![256]);
        assert!(file.at_eof());
    }

    #[test]
    fn scratch_grows_by_current_plus_twice_requested() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "w", &[0u8; 64]);

        let mut file = BackupFile::open(path, FileKind::Ctl, 0).unwrap();
        file.read_exact(8).unwrap();
        assert_eq!(file.scratch.len(), 16);
        // A read that fits must not grow or shrink the buffer.
        file.read_exact(16).unwrap();
        assert_eq!(file.scratch.len(), 16);
        file.read_exact(20).unwrap();
        assert_eq!(file.scratch.len(), 16 + 40);
    }

    #[test]
    fn short_read_is_io_and_reports_offset() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "w", &[0u8; 6]);

        let mut file = BackupFile::open(path, FileKind::Ctl, 0).unwrap();
        file.read_exact(4).unwrap();
        let err = file.read_exact(4).unwrap_err();
        assert_eq!(error_kind(&err), Some(ReadErrorKind::Io));
        assert!(err.to_string().contains("offset 4"));
    }
}
