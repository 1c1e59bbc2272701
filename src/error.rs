use thiserror::Error;

use crate::bridge::BridgeError;
use crate::subprocess::ProcessError;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl Error {
    /// Process exit code for this error: 2 for bad configuration, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::Toml(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
