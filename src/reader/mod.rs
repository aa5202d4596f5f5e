//! # Backup File Readers
//!
//! The three readers and their shared plumbing:
//!
//! - `file`: [`BackupFile`], one open handle with header negotiation and
//!   the reusable framing scratch buffer
//! - `metadata`: [`MetadataReader`], control file → [`Metadata`]
//! - `data`: [`DataReader`], data file → fragments → [`Tuple`]s
//! - `log`: [`LogReader`], log file → filtered [`LogEntry`]s
//! - `attr`: the decoded-cell views both value types yield
//!
//! Each reader owns its file handle and scratch buffer exclusively; after
//! the metadata is built the readers only borrow it immutably, so the
//! control, data and log files of one node can be driven sequentially
//! from one thread or from one thread each.
//!
//! [`Metadata`]: crate::schema::Metadata

pub mod attr;
pub mod data;
pub mod file;
pub mod log;
pub mod metadata;

pub use attr::Attribute;
pub use data::{DataReader, Fragment, Tuple};
pub use file::BackupFile;
pub use log::{LogEntry, LogEntryKind, LogReader};
pub use metadata::MetadataReader;
