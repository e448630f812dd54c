//! Textual hello documents.
//!
//! The handshake is exchanged once per session and carries optional,
//! forward-compatible fields, so it travels as JSON instead of the compact
//! form:
//!
//! ```text
//! {"type":"SERVER_HELLO","message_id":"…","timestamp":1700000000000,
//!  "client_id":"srv-456","room_id":"lobby","server_version":"1.0.0",
//!  "initial_state":{"entities":[…],"players":[…],"last_update":0}}
//! ```
//!
//! Unknown fields are ignored. A missing `message_id` or `timestamp` is
//! filled in locally.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{DecodeError, EncodeError};
use super::message::{Message, Payload};
use super::types::{ClientHello, ServerHello};
use crate::core::now_millis;

#[derive(Serialize, Deserialize)]
#[serde(tag = "type")]
enum HelloDocument {
    #[serde(rename = "CLIENT_HELLO")]
    Client {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
        #[serde(flatten)]
        hello: ClientHello,
    },
    #[serde(rename = "SERVER_HELLO")]
    Server {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
        #[serde(flatten)]
        hello: ServerHello,
    },
}

impl HelloDocument {
    fn into_message(self) -> Message {
        let (message_id, timestamp, payload) = match self {
            HelloDocument::Client {
                message_id,
                timestamp,
                hello,
            } => (message_id, timestamp, Payload::ClientHello(hello)),
            HelloDocument::Server {
                message_id,
                timestamp,
                hello,
            } => (message_id, timestamp, Payload::ServerHello(hello)),
        };
        Message {
            message_id: message_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            timestamp: timestamp.unwrap_or_else(now_millis),
            payload,
        }
    }
}

/// Encode a hello message as a JSON document.
pub(crate) fn encode(message: &Message) -> Result<Vec<u8>, EncodeError> {
    let document = match &message.payload {
        Payload::ClientHello(hello) => HelloDocument::Client {
            message_id: Some(message.message_id.clone()),
            timestamp: Some(message.timestamp),
            hello: hello.clone(),
        },
        Payload::ServerHello(hello) => HelloDocument::Server {
            message_id: Some(message.message_id.clone()),
            timestamp: Some(message.timestamp),
            hello: hello.clone(),
        },
        other => return Err(EncodeError::Json(format!("{} is not a hello", other.message_type()))),
    };
    serde_json::to_vec(&document).map_err(|e| EncodeError::Json(e.to_string()))
}

/// Decode one hello document from the front of `data`, returning bytes consumed.
pub(crate) fn decode(data: &[u8]) -> Result<(Message, usize), DecodeError> {
    let mut stream = serde_json::Deserializer::from_slice(data).into_iter::<HelloDocument>();
    match stream.next() {
        Some(Ok(document)) => Ok((document.into_message(), stream.byte_offset())),
        Some(Err(e)) if e.is_eof() => Err(DecodeError::Incomplete { needed: 1 }),
        Some(Err(e)) => Err(DecodeError::Json(e.to_string())),
        None => Err(DecodeError::Incomplete { needed: 1 }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::types::{EntitySnapshot, WorldState};
    use crate::core::{Quat, Vec3};

    #[test]
    fn test_decode_minimal_server_hello() {
        let doc = br#"{"type":"SERVER_HELLO","client_id":"srv-456"}"#;
        let (msg, used) = decode(doc).unwrap();
        assert_eq!(used, doc.len());
        match msg.payload {
            Payload::ServerHello(hello) => {
                assert_eq!(hello.assigned_client_id, "srv-456");
                assert_eq!(hello.server_version, "1.0.0");
                assert!(hello.room_id.is_empty());
                assert!(hello.initial_state.is_none());
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert!(!msg.message_id.is_empty());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let doc = br#"{"type":"SERVER_HELLO","client_id":"a","future_flag":true,"room_id":"r"}"#;
        let (msg, _) = decode(doc).unwrap();
        assert!(matches!(msg.payload, Payload::ServerHello(ref h) if h.room_id == "r"));
    }

    #[test]
    fn test_snapshot_defaults() {
        let doc = br#"{"type":"SERVER_HELLO","client_id":"a",
            "initial_state":{"entities":[{"id":"e1","position":{"x":1.5}}]}}"#;
        let (msg, _) = decode(doc).unwrap();
        let Payload::ServerHello(hello) = msg.payload else {
            panic!("expected server hello");
        };
        let state = hello.initial_state.unwrap();
        assert_eq!(
            state.entities[0],
            EntitySnapshot {
                id: "e1".into(),
                position: Vec3::new(1.5, 0.0, 0.0),
                rotation: Quat::IDENTITY,
                ..Default::default()
            }
        );
        assert_eq!(state.players.len(), 0);
    }

    #[test]
    fn test_truncated_document_is_incomplete() {
        let doc = br#"{"type":"SERVER_HELLO","client_id":"sr"#;
        assert_eq!(decode(doc), Err(DecodeError::Incomplete { needed: 1 }));
    }

    #[test]
    fn test_unknown_hello_type_is_rejected() {
        let doc = br#"{"type":"ROOM_HELLO","client_id":"a"}"#;
        assert!(matches!(decode(doc), Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_server_hello_roundtrip_with_state() {
        let msg = Message::new(
            "hello-1",
            1_700_000_000_000,
            Payload::ServerHello(ServerHello {
                server_version: "2.1.0".into(),
                assigned_client_id: "srv-456".into(),
                room_id: "lobby".into(),
                initial_state: Some(WorldState {
                    entities: vec![EntitySnapshot {
                        id: "e1".into(),
                        template_id: "crate".into(),
                        owner_id: "srv-456".into(),
                        position: Vec3::new(1.0, 2.0, 3.0),
                        rotation: Quat::IDENTITY,
                        components: [("color".to_string(), "red".to_string())].into(),
                    }],
                    players: vec![],
                    last_update: 42,
                }),
            }),
        );
        let bytes = encode(&msg).unwrap();
        assert_eq!(bytes[0], b'{');
        let (decoded, _) = decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }
}
