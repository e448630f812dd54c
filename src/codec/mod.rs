//! Message codec.
//!
//! Two encodings share one entry point:
//!
//! - **Compact binary** for everything high frequency: fixed 8-byte header
//!   (marker, version, type tag, reserved, body length) validated before the
//!   body is read, fixed-width little-endian numerics, short length-prefixed
//!   identifiers.
//! - **JSON text** for the once-per-session hello documents.
//!
//! [`decode`] picks the path from the first byte and never guesses: unknown
//! markers, tags, or shapes are hard errors. Truncated input reports
//! [`DecodeError::Incomplete`] so stream callers can wait for more bytes.
//!
//! For every structurally valid message `m`, `decode(&encode(&m)?) == Ok(m)`.

mod binary;
mod buffer;
mod error;
mod hello;
mod message;
mod types;
mod wire;

pub use binary::FrameHeader;
pub use buffer::FrameBuffer;
pub use error::{DecodeError, EncodeError};
pub use message::{Message, MessageBuilder, Payload};
pub use types::*;

use crate::core::constants::{BINARY_MARKER, TEXT_MARKER};

/// Encode a message into its wire bytes.
///
/// Hello messages produce a UTF-8 JSON document; everything else the compact
/// binary frame.
pub fn encode(message: &Message) -> Result<Vec<u8>, EncodeError> {
    if message.is_textual() {
        hello::encode(message)
    } else {
        binary::encode(message)
    }
}

/// Decode exactly one message; trailing bytes are an error.
pub fn decode(data: &[u8]) -> Result<Message, DecodeError> {
    let (message, used) = decode_with_length(data)?;
    if used != data.len() {
        return Err(DecodeError::TrailingBytes(data.len() - used));
    }
    Ok(message)
}

/// Decode the first message in `data`, returning it and the bytes consumed.
pub fn decode_with_length(data: &[u8]) -> Result<(Message, usize), DecodeError> {
    match data.first() {
        None => Err(DecodeError::Incomplete { needed: 1 }),
        Some(&TEXT_MARKER) => hello::decode(data),
        Some(&BINARY_MARKER) => binary::decode(data),
        Some(&other) => Err(DecodeError::UnknownMarker(other)),
    }
}
