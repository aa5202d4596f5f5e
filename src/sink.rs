//! # Progress Reporting
//!
//! Readers report progress ("restoring table X fragment 2") through a
//! caller-supplied sink instead of process-global streams. The default
//! sink discards everything, so embedding the readers in a server costs
//! nothing; a CLI driver hands in a [`StderrSink`] with the verbosity it
//! wants.
//!
//! Sinks take `&self` and carry no reader state; a reader owns exactly one
//! boxed sink for its lifetime.

/// Receiver for reader progress messages. All methods default to no-ops,
/// so implementors override only the levels they care about.
pub trait MessageSink: Send {
    fn info(&self, _message: &str) {}
    fn debug(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// Discards every message. The default sink for all readers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MessageSink for NullSink {}

/// Writes to stderr, filtered by a verbosity threshold:
/// 0 = errors only, 1 = +info, 2 = +debug.
#[derive(Debug, Clone, Copy)]
pub struct StderrSink {
    verbosity: u8,
}

impl StderrSink {
    pub fn new(verbosity: u8) -> Self {
        Self { verbosity }
    }
}

impl MessageSink for StderrSink {
    fn info(&self, message: &str) {
        if self.verbosity >= 1 {
            eprintln!("{}", message);
        }
    }

    fn debug(&self, message: &str) {
        if self.verbosity >= 2 {
            eprintln!("{}", message);
        }
    }

    fn error(&self, message: &str) {
        eprintln!("{}", message);
    }
}
