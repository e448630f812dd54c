//! Connection error types.

use std::time::Duration;

use thiserror::Error;

use crate::codec::EncodeError;
use crate::transport::TransportError;

/// Errors returned by `ConnectionManager::connect`.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The transport could not be opened or failed before the handshake.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The hello could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// No server hello within the configured timeout.
    #[error("no handshake acknowledgment within {0:?}")]
    HandshakeTimeout(Duration),

    /// The link closed or broke before the server hello.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The server placed the client in a different room.
    #[error("handshake room mismatch: requested `{requested}`, got `{assigned}`")]
    RoomMismatch {
        /// Room in the client hello.
        requested: String,
        /// Room in the server hello.
        assigned: String,
    },

    /// `disconnect` was called before the handshake completed.
    #[error("connection attempt cancelled")]
    Cancelled,
}

impl ConnectError {
    /// Whether a reconnection attempt may succeed after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            ConnectError::Transport(e) => e.is_transient(),
            ConnectError::HandshakeTimeout(_) | ConnectError::HandshakeFailed(_) => true,
            ConnectError::InvalidConfig(_)
            | ConnectError::Encode(_)
            | ConnectError::RoomMismatch { .. }
            | ConnectError::Cancelled => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ConnectError::HandshakeTimeout(Duration::from_secs(1)).is_retryable());
        assert!(ConnectError::Transport(TransportError::Refused("x".into())).is_retryable());
        assert!(
            !ConnectError::Transport(TransportError::InvalidEndpoint("x".into())).is_retryable()
        );
        assert!(
            !ConnectError::RoomMismatch {
                requested: "a".into(),
                assigned: "b".into()
            }
            .is_retryable()
        );
    }
}
