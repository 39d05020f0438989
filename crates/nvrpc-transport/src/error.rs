use std::path::PathBuf;

/// Errors that can occur on a msgpack-RPC channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the specified address.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred on the channel.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer stopped accepting bytes.
    #[error("channel closed")]
    Closed,
}

impl TransportError {
    /// Classify a write-side I/O error, folding "peer went away" kinds into
    /// [`TransportError::Closed`].
    pub fn from_write(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::WriteZero
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset => TransportError::Closed,
            _ => TransportError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
