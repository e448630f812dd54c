//! Codec error types.

use thiserror::Error;

use super::types::MessageType;

/// Errors produced while encoding a message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// An identifier exceeds the 255-byte wire limit.
    #[error("identifier `{field}` is {len} bytes, limit is 255")]
    IdTooLong {
        /// Offending field.
        field: &'static str,
        /// Actual length in bytes.
        len: usize,
    },

    /// A text field exceeds the 65535-byte wire limit.
    #[error("text `{field}` is {len} bytes, limit is 65535")]
    TextTooLong {
        /// Offending field.
        field: &'static str,
        /// Actual length in bytes.
        len: usize,
    },

    /// A collection has more entries than its count prefix can express.
    #[error("`{field}` has {count} entries, limit is 65535")]
    TooManyEntries {
        /// Offending field.
        field: &'static str,
        /// Actual entry count.
        count: usize,
    },

    /// The encoded body exceeds the frame size limit.
    #[error("encoded body is {0} bytes, above the frame limit")]
    BodyTooLarge(usize),

    /// A textual message type was handed to the binary encoder.
    #[error("{0} must use the textual encoding")]
    WrongEncoding(MessageType),

    /// The hello document could not be serialized.
    #[error("hello serialization failed: {0}")]
    Json(String),
}

/// Errors produced while decoding bytes.
///
/// [`DecodeError::Incomplete`] means "not decodable yet" and is expected under
/// fragmentation; every other variant is a protocol violation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// More bytes are needed before the frame can be decoded.
    #[error("incomplete frame: {needed} more bytes needed")]
    Incomplete {
        /// Minimum number of additional bytes required.
        needed: usize,
    },

    /// The first byte is neither the binary nor the text marker.
    #[error("unknown frame marker: {0:#04x}")]
    UnknownMarker(u8),

    /// Wire format version is not supported.
    #[error("unsupported wire version: {0}")]
    UnsupportedVersion(u8),

    /// Type tag is not part of the taxonomy.
    #[error("unknown message type: {0}")]
    UnknownType(u8),

    /// Reserved header byte was not zero.
    #[error("reserved header bits set: {0:#04x}")]
    ReservedBits(u8),

    /// A textual message type arrived in the binary encoding.
    #[error("{0} must use the textual encoding")]
    WrongEncoding(MessageType),

    /// Declared body length exceeds the frame limit.
    #[error("declared body length {0} exceeds the frame limit")]
    BodyTooLarge(usize),

    /// The body ended before the payload shape was complete.
    #[error("body truncated while reading `{field}`")]
    Truncated {
        /// Field being read.
        field: &'static str,
    },

    /// The body is longer than the payload shape.
    #[error("{0} unexpected trailing bytes in body")]
    TrailingBytes(usize),

    /// A string field is not valid UTF-8.
    #[error("field `{field}` is not valid UTF-8")]
    InvalidUtf8 {
        /// Offending field.
        field: &'static str,
    },

    /// An enumerated field carries an unknown value.
    #[error("field `{field}` has invalid value {value}")]
    InvalidValue {
        /// Offending field.
        field: &'static str,
        /// Raw value.
        value: u8,
    },

    /// The hello document is malformed.
    #[error("malformed hello document: {0}")]
    Json(String),
}

impl DecodeError {
    /// Whether the input may still decode once more bytes arrive.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, DecodeError::Incomplete { .. })
    }
}
