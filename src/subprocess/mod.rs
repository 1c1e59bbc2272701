//! Subprocess launch and output collection
//!
//! `runner` starts the long-lived interactive process; `streaming` turns its
//! blocking output pipes into pollable, timeout-bounded sources.

pub mod builder;
pub mod error;
pub mod runner;
pub mod streaming;


pub use builder::ProcessCommandBuilder;
pub use error::ProcessError;
pub use runner::{terminate_group, ExitStatus, InteractiveProcess, ProcessCommand};
pub use streaming::{
    CloseReason, Drained, NonBlockingReader, ReadOutcome, ReaderState, StreamSource,
};
