use crate::bridge::BridgeError;
use thiserror::Error;

/// Failure reported back across the characteristic boundary.
///
/// Every variant corresponds to one of the error names a BlueZ GATT
/// characteristic may return to its client.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Operation not supported")]
    NotSupported,

    #[error("Operation not permitted")]
    NotPermitted,

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Shell process has terminated")]
    ProcessTerminated,

    #[error("{0}")]
    Failed(String),
}

impl TransportError {
    pub fn dbus_name(&self) -> &'static str {
        match self {
            TransportError::NotSupported => "org.bluez.Error.NotSupported",
            TransportError::NotPermitted => "org.bluez.Error.NotPermitted",
            TransportError::InvalidValue(_) => "org.bluez.Error.InvalidValueLength",
            // A dead shell is reported as a plain failure with its own message
            TransportError::ProcessTerminated | TransportError::Failed(_) => {
                "org.bluez.Error.Failed"
            }
        }
    }
}

impl From<BridgeError> for TransportError {
    fn from(err: BridgeError) -> Self {
        if err.is_terminal() {
            TransportError::ProcessTerminated
        } else {
            TransportError::Failed(err.to_string())
        }
    }
}
