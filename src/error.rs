//! # Reader Error Taxonomy
//!
//! Every failure surfaced by the readers carries one of five kinds, so a
//! restore driver can decide between "retry with another file", "skip this
//! backup" and "operator intervention" without string matching:
//!
//! | Kind | Meaning |
//! |------|---------|
//! | `Io` | underlying read failure or premature end of file |
//! | `Format` | bad magic, unexpected section tag, wrong file kind, unsupported scalar width, structural overrun |
//! | `Schema` | table descriptor blob rejected by the dictionary parser |
//! | `UnknownTable` | fragment or log record references a table id missing from the metadata |
//! | `Consistency` | decoded content disagrees with its framing (footer count, variable-record id, short payload) |
//!
//! Errors travel inside `eyre::Report`; raise them with
//! `bail!(ReadError::format(..))` and recover the kind on the consumer side
//! with `report.downcast_ref::<ReadError>()`.
//!
//! A failed `next*` call exhausts the reader. There is no retry and no
//! partial recovery; malformed input is terminal for the affected file.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadErrorKind {
    Io,
    Format,
    Schema,
    UnknownTable,
    Consistency,
}

impl ReadErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadErrorKind::Io => "io",
            ReadErrorKind::Format => "format",
            ReadErrorKind::Schema => "schema",
            ReadErrorKind::UnknownTable => "unknown table",
            ReadErrorKind::Consistency => "consistency",
        }
    }
}

impl fmt::Display for ReadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct ReadError {
    kind: ReadErrorKind,
    message: String,
}

impl ReadError {
    pub fn new(kind: ReadErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ReadErrorKind::Io, message)
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::new(ReadErrorKind::Format, message)
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(ReadErrorKind::Schema, message)
    }

    pub fn unknown_table(table_id: u32) -> Self {
        Self::new(
            ReadErrorKind::UnknownTable,
            format!("table id {} is not in the backup metadata", table_id),
        )
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        Self::new(ReadErrorKind::Consistency, message)
    }

    pub fn kind(&self) -> ReadErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

impl std::error::Error for ReadError {}

/// Extracts the typed kind from an `eyre::Report`, if the root cause is a
/// [`ReadError`]. Convenience for drivers and tests.
pub fn error_kind(report: &eyre::Report) -> Option<ReadErrorKind> {
    report.downcast_ref::<ReadError>().map(ReadError::kind)
}
