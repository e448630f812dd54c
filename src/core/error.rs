//! Top-level error type.
//!
//! Each layer owns its own error enum; [`MeshError`] unifies them for callers
//! that prefer a single type.

use thiserror::Error;

use crate::client::ConnectError;
use crate::codec::{DecodeError, EncodeError};
use crate::sync::DirectoryError;
use crate::transport::TransportError;

/// Top-level meshsync errors.
#[derive(Debug, Error)]
pub enum MeshError {
    /// A message could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Inbound bytes could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Connecting or handshaking failed.
    #[error("connect error: {0}")]
    Connect(#[from] ConnectError),

    /// The entity directory rejected an operation.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),
}

/// Result alias using [`MeshError`].
pub type MeshResult<T> = Result<T, MeshError>;
