//! Core types for non-blocking stream collection

use std::fmt;

/// Stream source identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSource::Stdout => f.write_str("stdout"),
            StreamSource::Stderr => f.write_str("stderr"),
        }
    }
}

/// Why a reader's collection task stopped
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CloseReason {
    /// The peer closed the pipe (usually because the process exited)
    #[error("end of stream")]
    EndOfStream,
    /// Reading the pipe failed
    #[error("read failed: {0}")]
    Io(String),
    /// The owner cancelled collection
    #[error("reader shut down")]
    Shutdown,
}

/// Lifecycle of a reader's collection task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderState {
    Active,
    Closed(CloseReason),
}

impl ReaderState {
    pub fn is_closed(&self) -> bool {
        matches!(self, ReaderState::Closed(_))
    }
}

/// Result of a single `read_unit` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Next unit from the FIFO, in production order
    Unit(Vec<u8>),
    /// Nothing arrived within the timeout
    Empty,
    /// The buffer is exhausted and the stream will produce nothing more
    Closed(CloseReason),
}

/// Everything collected by one drain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Drained {
    pub data: Vec<u8>,
    /// Set when the drain ran into a closed stream instead of a quiet one
    pub closed: Option<CloseReason>,
}
