//! Command line interface
//!
//! Argument parsing and routing of subcommands to their implementations.

pub mod args;
pub mod router;

pub use args::{Cli, Commands};
pub use router::execute_command;
