use crate::subprocess::{CloseReason, ProcessError, StreamSource};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Shell input is closed")]
    StdinClosed,

    #[error("Failed to write to shell input: {0}")]
    Stdin(#[source] std::io::Error),

    #[error("Shell {stream} is closed: {reason}")]
    StreamClosed {
        stream: StreamSource,
        reason: CloseReason,
    },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl BridgeError {
    /// True when the failure means the shell is gone for good
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BridgeError::StdinClosed | BridgeError::StreamClosed { .. }
        ) || matches!(self, BridgeError::Stdin(e) if e.kind() == std::io::ErrorKind::BrokenPipe)
    }
}
