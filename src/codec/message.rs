//! Message envelope and builders.

use uuid::Uuid;

use super::types::*;
use crate::core::now_millis;

/// Typed message body. The variant fixes the [`MessageType`] tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Handshake request.
    ClientHello(ClientHello),
    /// Handshake acknowledgment.
    ServerHello(ServerHello),
    /// Liveness ping.
    Ping,
    /// Transform update.
    PositionUpdate(PositionUpdate),
    /// Voice frame.
    VoiceData(VoiceData),
    /// Entity creation.
    EntitySpawn(EntitySpawn),
    /// Entity component delta.
    EntityUpdate(EntityUpdate),
    /// Entity removal.
    EntityDespawn(EntityDespawn),
    /// Chat line.
    ChatMessage(ChatMessage),
    /// Participant joined.
    PresenceJoin(PresenceEvent),
    /// Participant left.
    PresenceLeave(PresenceEvent),
    /// Participant changed.
    PresenceUpdate(PresenceEvent),
    /// Emoji reaction.
    EmojiReaction(EmojiReaction),
    /// Object grabbed.
    ObjectGrab(ObjectGrab),
    /// Object released.
    ObjectRelease(ObjectRelease),
}

impl Payload {
    /// Tag for this payload.
    pub fn message_type(&self) -> MessageType {
        match self {
            Payload::ClientHello(_) => MessageType::ClientHello,
            Payload::ServerHello(_) => MessageType::ServerHello,
            Payload::Ping => MessageType::Ping,
            Payload::PositionUpdate(_) => MessageType::PositionUpdate,
            Payload::VoiceData(_) => MessageType::VoiceData,
            Payload::EntitySpawn(_) => MessageType::EntitySpawn,
            Payload::EntityUpdate(_) => MessageType::EntityUpdate,
            Payload::EntityDespawn(_) => MessageType::EntityDespawn,
            Payload::ChatMessage(_) => MessageType::ChatMessage,
            Payload::PresenceJoin(_) => MessageType::PresenceJoin,
            Payload::PresenceLeave(_) => MessageType::PresenceLeave,
            Payload::PresenceUpdate(_) => MessageType::PresenceUpdate,
            Payload::EmojiReaction(_) => MessageType::EmojiReaction,
            Payload::ObjectGrab(_) => MessageType::ObjectGrab,
            Payload::ObjectRelease(_) => MessageType::ObjectRelease,
        }
    }
}

/// A protocol message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Unique opaque id.
    pub message_id: String,
    /// Milliseconds since the Unix epoch at creation.
    pub timestamp: u64,
    /// Typed body.
    pub payload: Payload,
}

impl Message {
    /// Create a message with an explicit id and timestamp.
    pub fn new(message_id: impl Into<String>, timestamp: u64, payload: Payload) -> Self {
        Self {
            message_id: message_id.into(),
            timestamp,
            payload,
        }
    }

    /// Tag for this message.
    pub fn message_type(&self) -> MessageType {
        self.payload.message_type()
    }

    /// Whether this message travels as a text frame.
    pub fn is_textual(&self) -> bool {
        self.message_type().is_textual()
    }
}

/// Builds messages with a fresh UUID and the current wall-clock time.
pub struct MessageBuilder;

impl MessageBuilder {
    /// Wrap a payload.
    pub fn create(payload: Payload) -> Message {
        Message::new(Uuid::new_v4().to_string(), now_millis(), payload)
    }

    /// Handshake request.
    pub fn client_hello(hello: ClientHello) -> Message {
        Self::create(Payload::ClientHello(hello))
    }

    /// Liveness ping.
    pub fn ping() -> Message {
        Self::create(Payload::Ping)
    }

    /// Transform update stamped with the current time.
    pub fn position_update(
        entity_id: impl Into<String>,
        position: crate::core::Vec3,
        rotation: crate::core::Quat,
        sequence_number: u32,
    ) -> Message {
        let timestamp = now_millis();
        Message::new(
            Uuid::new_v4().to_string(),
            timestamp,
            Payload::PositionUpdate(PositionUpdate {
                entity_id: entity_id.into(),
                position,
                rotation,
                sequence_number,
                timestamp,
            }),
        )
    }

    /// Entity creation.
    pub fn entity_spawn(spawn: EntitySpawn) -> Message {
        Self::create(Payload::EntitySpawn(spawn))
    }

    /// Entity component delta.
    pub fn entity_update(entity_id: impl Into<String>, components: Components) -> Message {
        Self::create(Payload::EntityUpdate(EntityUpdate {
            entity_id: entity_id.into(),
            components,
        }))
    }

    /// Entity removal.
    pub fn entity_despawn(entity_id: impl Into<String>) -> Message {
        Self::create(Payload::EntityDespawn(EntityDespawn {
            entity_id: entity_id.into(),
        }))
    }

    /// Chat line stamped with the current time.
    pub fn chat_message(
        from_client_id: impl Into<String>,
        message: impl Into<String>,
        kind: ChatKind,
    ) -> Message {
        let timestamp = now_millis();
        Message::new(
            Uuid::new_v4().to_string(),
            timestamp,
            Payload::ChatMessage(ChatMessage {
                from_client_id: from_client_id.into(),
                message: message.into(),
                timestamp,
                kind,
            }),
        )
    }

    /// Presence change for `client_id`.
    pub fn presence_update(client_id: impl Into<String>, data: PresenceData) -> Message {
        Self::create(Payload::PresenceUpdate(PresenceEvent {
            client_id: client_id.into(),
            data,
        }))
    }

    /// Voice frame.
    pub fn voice_data(voice: VoiceData) -> Message {
        Self::create(Payload::VoiceData(voice))
    }

    /// Emoji reaction.
    pub fn emoji_reaction(reaction: EmojiReaction) -> Message {
        Self::create(Payload::EmojiReaction(reaction))
    }

    /// Object grabbed.
    pub fn object_grab(grab: ObjectGrab) -> Message {
        Self::create(Payload::ObjectGrab(grab))
    }

    /// Object released.
    pub fn object_release(release: ObjectRelease) -> Message {
        Self::create(Payload::ObjectRelease(release))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Quat, Vec3};

    #[test]
    fn test_builder_assigns_unique_ids() {
        let a = MessageBuilder::ping();
        let b = MessageBuilder::ping();
        assert_ne!(a.message_id, b.message_id);
        assert!(a.timestamp > 0);
        assert_eq!(a.message_type(), MessageType::Ping);
    }

    #[test]
    fn test_position_update_timestamp_matches_envelope() {
        let msg = MessageBuilder::position_update("e1", Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY, 7);
        match &msg.payload {
            Payload::PositionUpdate(update) => {
                assert_eq!(update.timestamp, msg.timestamp);
                assert_eq!(update.sequence_number, 7);
                assert_eq!(update.entity_id, "e1");
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_chat_defaults() {
        let msg = MessageBuilder::chat_message("c1", "hello", ChatKind::Normal);
        assert_eq!(msg.message_type(), MessageType::ChatMessage);
        assert!(!msg.is_textual());
    }

    #[test]
    fn test_hello_is_textual() {
        let msg = MessageBuilder::client_hello(ClientHello {
            client_id: "temp-1".into(),
            display_name: "Ada".into(),
            auth_token: String::new(),
            requested_room: "lobby".into(),
        });
        assert!(msg.is_textual());
    }
}
