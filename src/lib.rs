//! # penpi
//!
//! Remote shell bridge: a client connected over a read/write/notify
//! characteristic writes shell commands and reads back their output, while
//! one interactive shell keeps running in the background.
//!
//! ## Usage
//!
//! ```bash
//! penpi [-v] [--config PATH] [console [--shell PROGRAM] [--home DIR] | config]
//! ```
//!
//! ## Modules
//!
//! - `subprocess` - Shell launch and non-blocking readers over its output pipes
//! - `bridge` - The long-lived shell with its input and two drained outputs
//! - `notify` - Periodic "output is waiting" notifications
//! - `transport` - The characteristic contract and a terminal client for it
//! - `config` - Layered configuration (file, environment, command line)
//! - `app` / `cli` - Logging, error reporting and argument handling
pub mod app;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod error;
pub mod notify;
pub mod subprocess;
pub mod transport;

pub use error::{Error, Result};
