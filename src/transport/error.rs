//! Transport layer error types.

use std::io;

use thiserror::Error;

/// Transport layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error on the underlying stream.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The endpoint could not be parsed or resolved.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The peer refused the connection.
    #[error("connection refused: {0}")]
    Refused(String),

    /// The link is already closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// A stream frame declared a length above the frame limit.
    #[error("frame of {0} bytes exceeds the transport limit")]
    FrameTooLarge(usize),

    /// A stream frame carried an unknown kind byte.
    #[error("unknown frame kind: {0:#04x}")]
    UnknownFrameKind(u8),

    /// A text frame was not valid UTF-8.
    #[error("text frame is not valid UTF-8")]
    InvalidText,
}

impl TransportError {
    /// Whether the link cannot be used after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::Io(_)
                | TransportError::ConnectionClosed
                | TransportError::FrameTooLarge(_)
                | TransportError::UnknownFrameKind(_)
        )
    }

    /// Whether retrying the same endpoint later may succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, TransportError::InvalidEndpoint(_))
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
