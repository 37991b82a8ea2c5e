//! Transport-level error types.

use beacon_api::ApiError;
use thiserror::Error;

/// Errors raised by a [`BusClient`](crate::BusClient) implementation.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Could not connect to the bus hub.
    #[error("failed to connect to bus hub at {path}: {reason}")]
    ConnectionFailed {
        /// Hub socket path.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// The hub connection is gone.
    #[error("bus connection closed: {0}")]
    Closed(String),

    /// A frame could not be handed to the bus.
    #[error("failed to send to bus: {0}")]
    SendFailed(String),

    /// I/O error on the hub socket.
    #[error("bus I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::Transport(err.to_string())
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
