//! Transport boundary
//!
//! A remote client sees the shell as a single read/write/notify
//! characteristic. Writing sends one line of input, reading returns whatever
//! the shell printed since the last read, and subscribing asks for a
//! "value changed" event whenever new output is waiting.
//!
//! Registration with a radio stack is outside this crate. [`console`]
//! provides a local client that drives the same contract from a terminal.

pub mod console;
mod error;


pub use error::TransportError;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::bridge::{BridgeError, ProcessBridge};
use crate::notify::{NotificationScheduler, OutputMonitor, ValueChangedSink};
use crate::subprocess::StreamSource;

/// UUID of the shell service
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x999d97c6_0e31_4b46_b8cb_ef4c2c918c00);

/// UUID of the command characteristic
pub const COMMAND_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x999d97c6_0e31_4b46_b8cb_ef4c2c918c01);

/// UUID of the output-ready characteristic
pub const OUTPUT_READY_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x999d97c6_0e31_4b46_b8cb_ef4c2c918c02);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacteristicFlag {
    SecureRead,
    SecureWrite,
    Notify,
}

impl CharacteristicFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CharacteristicFlag::SecureRead => "secure-read",
            CharacteristicFlag::SecureWrite => "secure-write",
            CharacteristicFlag::Notify => "notify",
        }
    }
}

impl fmt::Display for CharacteristicFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One read/write/notify endpoint as seen by a remote client
#[async_trait]
pub trait Characteristic: Send + Sync {
    fn uuid(&self) -> Uuid;

    fn flags(&self) -> &'static [CharacteristicFlag];

    async fn read_value(&self) -> Result<Vec<u8>, TransportError>;

    async fn write_value(&self, value: &[u8]) -> Result<(), TransportError>;

    async fn start_notify(&self) -> Result<(), TransportError> {
        Err(TransportError::NotSupported)
    }

    async fn stop_notify(&self) -> Result<(), TransportError> {
        Err(TransportError::NotSupported)
    }
}

const COMMAND_FLAGS: &[CharacteristicFlag] = &[
    CharacteristicFlag::SecureRead,
    CharacteristicFlag::SecureWrite,
    CharacteristicFlag::Notify,
];

/// The shell exposed as a characteristic
pub struct CommandCharacteristic {
    bridge: Arc<ProcessBridge>,
    scheduler: NotificationScheduler,
}

impl CommandCharacteristic {
    /// Wrap `bridge`, sending value-changed events to `sink` every
    /// `poll_interval` while a client is subscribed.
    pub fn new(
        bridge: Arc<ProcessBridge>,
        sink: Arc<dyn ValueChangedSink>,
        poll_interval: Duration,
    ) -> Self {
        let monitor: Arc<dyn OutputMonitor> = bridge.clone();
        Self {
            scheduler: NotificationScheduler::new(monitor, sink, poll_interval),
            bridge,
        }
    }

    pub fn bridge(&self) -> &Arc<ProcessBridge> {
        &self.bridge
    }

    pub fn is_notifying(&self) -> bool {
        self.scheduler.is_notifying()
    }

    /// Stop notifications and the shell.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        self.bridge.shutdown().await;
    }
}

#[async_trait]
impl Characteristic for CommandCharacteristic {
    fn uuid(&self) -> Uuid {
        COMMAND_CHARACTERISTIC_UUID
    }

    fn flags(&self) -> &'static [CharacteristicFlag] {
        COMMAND_FLAGS
    }

    /// Everything the shell printed on stdout, followed by everything it
    /// printed on stderr.
    ///
    /// Fails only once both streams are closed and nothing is left to
    /// deliver.
    async fn read_value(&self) -> Result<Vec<u8>, TransportError> {
        let mut value = Vec::new();
        let mut closed = 0;

        for source in [StreamSource::Stdout, StreamSource::Stderr] {
            match self.bridge.drain(source).await {
                Ok(data) => value.extend(data),
                Err(e @ BridgeError::StreamClosed { .. }) => {
                    trace!("{}", e);
                    closed += 1;
                }
                Err(e) => warn!("Failed to read shell {}: {}", source, e),
            }
        }

        if value.is_empty() && closed == 2 {
            return Err(TransportError::ProcessTerminated);
        }

        debug!("Read {} bytes of shell output", value.len());
        Ok(value)
    }

    async fn write_value(&self, value: &[u8]) -> Result<(), TransportError> {
        let command = std::str::from_utf8(value)
            .map_err(|e| TransportError::InvalidValue(format!("command is not UTF-8: {}", e)))?;

        debug!("Received command: {:?}", command);
        self.bridge.write_stdin(command).await.map_err(|e| {
            warn!("Failed to send command to shell: {}", e);
            TransportError::from(e)
        })
    }

    async fn start_notify(&self) -> Result<(), TransportError> {
        self.scheduler.enable();
        Ok(())
    }

    async fn stop_notify(&self) -> Result<(), TransportError> {
        self.scheduler.disable();
        Ok(())
    }
}
