#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Child process did not expose a {0} pipe")]
    MissingPipe(&'static str),

    #[error("Internal error: {message}")]
    InternalError { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
