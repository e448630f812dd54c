//! Transport frames and link events.

use crate::codec::{EncodeError, Message, encode};
use crate::core::constants::{CLOSE_ABNORMAL, CLOSE_NORMAL};

use super::error::TransportError;

/// Close code plus a human readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    /// Numeric close code (WebSocket numbering).
    pub code: u16,
    /// Free-form reason.
    pub reason: String,
}

impl CloseReason {
    /// Create a close reason.
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Caller-initiated normal closure.
    pub fn normal() -> Self {
        Self::new(CLOSE_NORMAL, "client disconnect")
    }

    /// The link went away without a close frame.
    pub fn abnormal() -> Self {
        Self::new(CLOSE_ABNORMAL, "connection lost")
    }
}

/// One message-oriented transport frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Compact binary message.
    Binary(Vec<u8>),
    /// UTF-8 text message (hello documents).
    Text(String),
    /// Orderly close.
    Close(CloseReason),
}

impl Frame {
    /// Encode a message into the frame kind its encoding requires.
    pub fn from_message(message: &Message) -> Result<Self, EncodeError> {
        let bytes = encode(message)?;
        if message.is_textual() {
            // JSON output is always UTF-8.
            String::from_utf8(bytes)
                .map(Frame::Text)
                .map_err(|e| EncodeError::Json(e.to_string()))
        } else {
            Ok(Frame::Binary(bytes))
        }
    }

    /// Payload bytes, if this frame carries a message.
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Frame::Binary(bytes) => Some(bytes),
            Frame::Text(text) => Some(text.as_bytes()),
            Frame::Close(_) => None,
        }
    }
}

/// Events a link delivers to its owner.
#[derive(Debug)]
pub enum TransportEvent {
    /// A frame arrived.
    Frame(Frame),
    /// The peer or the transport closed the link.
    Closed(CloseReason),
    /// The transport failed; a `Closed` event or channel end follows.
    Error(TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ClientHello, MessageBuilder};

    #[test]
    fn test_hello_becomes_text_frame() {
        let msg = MessageBuilder::client_hello(ClientHello {
            client_id: "temp-1".into(),
            display_name: String::new(),
            auth_token: String::new(),
            requested_room: "lobby".into(),
        });
        let frame = Frame::from_message(&msg).unwrap();
        assert!(matches!(frame, Frame::Text(ref t) if t.starts_with('{')));
    }

    #[test]
    fn test_ping_becomes_binary_frame() {
        let frame = Frame::from_message(&MessageBuilder::ping()).unwrap();
        assert!(matches!(frame, Frame::Binary(_)));
        assert!(frame.payload().is_some());
        assert!(Frame::Close(CloseReason::normal()).payload().is_none());
    }
}
