//! # Control File Reader
//!
//! Walks one control file and produces the backup's [`Metadata`]. The body
//! of a control file is three section groups in fixed order:
//!
//! ```text
//! +-------------+----------------------+-----+----------------------+-----------+
//! | table list  | table description 1  | ... | table description N  | GCP entry |
//! +-------------+----------------------+-----+----------------------+-----------+
//! ```
//!
//! The table list is a count preamble: `(tag, len)` followed by `len - 2`
//! words that are read and discarded; the descriptors that follow carry
//! the actual dictionary blobs. A control file listing zero tables is
//! rejected — a backup with no tables has nothing to restore and marks a
//! producer-side fault.

use std::path::PathBuf;

use eyre::{ensure, Result};

use crate::error::ReadError;
use crate::format::{ctl_file_name, FileKind, GcpEntry, SectionKind, GCP_ENTRY_SIZE};
use crate::reader::file::BackupFile;
use crate::schema::{parse_table_info, Metadata, Table};
use crate::sink::MessageSink;

#[derive(Debug)]
pub struct MetadataReader {
    file: BackupFile,
    dir: PathBuf,
    node_id: u32,
    backup_id: u32,
}

impl MetadataReader {
    /// Opens `BACKUP-<backupId>.<nodeId>.ctl` under `dir`. An empty `dir`
    /// resolves to the current directory.
    pub fn new(dir: impl Into<PathBuf>, node_id: u32, backup_id: u32) -> Result<Self> {
        let dir = dir.into();
        let path = dir.join(ctl_file_name(backup_id, node_id));
        let file = BackupFile::open(path, FileKind::Ctl, backup_id)?;
        Ok(Self {
            file,
            dir,
            node_id,
            backup_id,
        })
    }

    pub fn with_sink(mut self, sink: Box<dyn MessageSink>) -> Self {
        self.file.set_sink(sink);
        self
    }

    /// Validates the file header. Called implicitly by `load_content` if
    /// the caller skipped it.
    pub fn read_header(&mut self) -> Result<()> {
        self.file.read_header()
    }

    /// Consumes the reader, walks all sections and returns the decoded
    /// metadata. Any framing violation exhausts the reader.
    pub fn load_content(mut self) -> Result<Metadata> {
        self.file.ensure_header()?;
        let version = self.file.header().map(|h| h.version()).unwrap_or(0);

        let tab_count = self.read_table_list()?;
        let mut tables = Vec::with_capacity(tab_count as usize);
        for _ in 0..tab_count {
            tables.push(self.read_table_description(version)?);
        }
        let (start_gcp, stop_gcp) = self.read_gcp_entry()?;

        self.file.sink().info(&format!(
            "loaded {} tables, GCP {}..{}",
            tables.len(),
            start_gcp,
            stop_gcp
        ));

        Metadata::assemble(
            self.dir,
            self.node_id,
            self.backup_id,
            version,
            start_gcp,
            stop_gcp,
            tables,
        )
    }

    fn read_section_tag(&mut self, expected: SectionKind) -> Result<u32> {
        let tag = self.file.read_u32_be()?;
        let length = self.file.read_u32_be()?;
        ensure!(
            SectionKind::from_word(tag) == Some(expected),
            ReadError::format(format!(
                "{}: section tag {} where {:?} was expected",
                self.file.path().display(),
                tag,
                expected
            ))
        );
        ensure!(
            length >= 2,
            ReadError::format(format!(
                "{}: section length {} shorter than its own framing",
                self.file.path().display(),
                length
            ))
        );
        Ok(length)
    }

    fn read_table_list(&mut self) -> Result<u32> {
        let length = self.read_section_tag(SectionKind::TableList)?;
        let tab_count = length - 2;
        ensure!(
            tab_count > 0,
            ReadError::format(format!(
                "{}: control file lists no tables",
                self.file.path().display()
            ))
        );

        // The list body is a count preamble; the descriptors that follow
        // carry everything, so the entries are discarded.
        self.file.read_exact(4 * tab_count as usize)?;
        Ok(tab_count)
    }

    fn read_table_description(&mut self, version: u32) -> Result<Table> {
        let length = self.read_section_tag(SectionKind::TableDescription)?;
        let words = self.file.read_words_be((length - 2) as usize)?;

        let info = parse_table_info(&words)?;
        self.file.sink().debug(&format!(
            "parsed table {} ({}) with {} columns",
            info.name,
            info.id,
            info.columns.len()
        ));

        Table::build(info, version)
    }

    fn read_gcp_entry(&mut self) -> Result<(u32, u32)> {
        let bytes = self.file.read_exact(GCP_ENTRY_SIZE)?;
        let entry = GcpEntry::from_bytes(bytes)?;
        ensure!(
            entry.section_type() == SectionKind::GcpEntry as u32,
            ReadError::format(format!(
                "{}: section tag {} where the GCP entry was expected",
                self.file.path().display(),
                entry.section_type()
            ))
        );
        Ok((entry.start_gcp(), entry.stop_gcp()))
    }
}
