//! Background collection of subprocess output
//!
//! Each output pipe gets a [`NonBlockingReader`]: a collection task plus a
//! FIFO buffer that callers poll with bounded waits instead of blocking on
//! the pipe themselves.

pub mod reader;
pub mod types;

pub use reader::{NonBlockingReader, MAX_DRAIN_BYTES, READ_CHUNK_SIZE};
pub use types::{CloseReason, Drained, ReadOutcome, ReaderState, StreamSource};
