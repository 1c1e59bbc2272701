//! CLI argument structures

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Drive an interactive shell through a read/write/notify characteristic
#[derive(Parser)]
#[command(name = "penpi")]
#[command(about = "penpi - remote shell bridge", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Serve the shell to a client on this terminal (default command)
    Console {
        /// Shell program to run instead of the configured one
        #[arg(long)]
        shell: Option<String>,

        /// Directory the shell starts in
        #[arg(long)]
        home: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    Config,
}
