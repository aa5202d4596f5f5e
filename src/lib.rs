//! # backread - Backup File Reader Core
//!
//! backread is the file-reading core of a cluster restore pipeline. Given
//! the files one node's online backup produced — a control file, one or
//! more data files, and a change log — it reconstructs the schema in
//! memory and emits a typed stream of tuples and log entries. Applying
//! that stream to a target database is the consumer's job; this crate
//! never writes anything.
//!
//! ## Backup File Set
//!
//! ```text
//! backup_dir/
//! ├── BACKUP-42.3.ctl       # schema + global checkpoint range
//! ├── BACKUP-42-0.3.Data    # per-fragment tuple dumps
//! ├── BACKUP-42-1.3.Data    # (data may span several files)
//! └── BACKUP-42.3.log       # redo-style change log
//! ```
//!
//! ## Reading a Backup
//!
//! ```ignore
//! use backread::{DataReader, LogReader, MetadataReader};
//!
//! let mut reader = MetadataReader::new("backup_dir", node_id, backup_id)?;
//! reader.read_header()?;
//! let meta = reader.load_content()?;
//!
//! let mut data = DataReader::new(&meta, 0)?;
//! while let Some(fragment) = data.next_fragment()? {
//!     while let Some(tuple) = data.next_tuple()? {
//!         // hand tuple to the insertion client
//!     }
//!     data.validate_fragment_footer()?;
//! }
//!
//! let mut log = LogReader::new(&meta)?;
//! while let Some(entry) = log.next_entry()? {
//!     // apply the change record
//! }
//! ```
//!
//! ## Byte-Order Contract
//!
//! Section framing (tags, lengths, table ids, GCP values) is big-endian
//! 32-bit on disk. Scalar payload inside tuples and log records is in the
//! *producer's* native order; the file header carries a marker word the
//! reader interprets in host order to decide whether payload needs
//! byte-swapping. Swapping happens in place on the decoded buffer, so
//! attribute views cost no per-cell allocation.
//!
//! ## Error Model
//!
//! Failures carry one of five kinds (io / format / schema / unknown table
//! / consistency) inside `eyre::Report`; see [`error`]. Any error on a
//! `next*` call exhausts that reader. Malformed input never panics and
//! never aborts the process.
//!
//! ## Module Overview
//!
//! - [`format`]: on-disk structs, section tags, file naming
//! - [`twiddle`]: in-place endian conversion over scalar arrays
//! - [`schema`]: dictionary decoding, tables, backup metadata
//! - [`reader`]: the control / data / log readers
//! - [`sink`]: caller-supplied progress reporting
//! - [`error`]: the tagged error taxonomy

pub mod error;
pub mod format;
pub mod reader;
pub mod schema;
pub mod sink;
pub mod twiddle;

pub use error::{error_kind, ReadError, ReadErrorKind};
pub use format::{FileKind, SectionKind};
pub use reader::{
    Attribute, BackupFile, DataReader, Fragment, LogEntry, LogEntryKind, LogReader,
    MetadataReader, Tuple,
};
pub use schema::{AttributeDesc, ColumnInfo, Metadata, Table, TableImpl};
pub use sink::{MessageSink, NullSink, StderrSink};
