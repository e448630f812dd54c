//! Message type taxonomy and payload shapes.
//!
//! Tags are an external wire contract: existing values and payload shapes are
//! frozen once deployed. New tags may be added.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::constants::DEFAULT_SERVER_VERSION;
use crate::core::{Quat, Transform, Vec3};

/// Message type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum MessageType {
    /// Handshake request (client → server), textual.
    ClientHello = 1,
    /// Handshake acknowledgment (server → client), textual.
    ServerHello = 2,
    /// Liveness ping; no reply expected.
    Ping = 3,
    /// High-frequency transform update.
    PositionUpdate = 10,
    /// Encoded voice frame.
    VoiceData = 11,
    /// Entity creation.
    EntitySpawn = 20,
    /// Entity component delta.
    EntityUpdate = 21,
    /// Entity removal.
    EntityDespawn = 22,
    /// Chat line.
    ChatMessage = 30,
    /// Participant joined.
    PresenceJoin = 40,
    /// Participant left.
    PresenceLeave = 41,
    /// Participant profile or pose changed.
    PresenceUpdate = 42,
    /// Emoji reaction.
    EmojiReaction = 50,
    /// Object picked up.
    ObjectGrab = 60,
    /// Object let go.
    ObjectRelease = 61,
}

impl MessageType {
    /// Every known tag, in tag order.
    pub const ALL: [MessageType; 15] = [
        Self::ClientHello,
        Self::ServerHello,
        Self::Ping,
        Self::PositionUpdate,
        Self::VoiceData,
        Self::EntitySpawn,
        Self::EntityUpdate,
        Self::EntityDespawn,
        Self::ChatMessage,
        Self::PresenceJoin,
        Self::PresenceLeave,
        Self::PresenceUpdate,
        Self::EmojiReaction,
        Self::ObjectGrab,
        Self::ObjectRelease,
    ];

    /// Parse a tag byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::ClientHello),
            2 => Some(Self::ServerHello),
            3 => Some(Self::Ping),
            10 => Some(Self::PositionUpdate),
            11 => Some(Self::VoiceData),
            20 => Some(Self::EntitySpawn),
            21 => Some(Self::EntityUpdate),
            22 => Some(Self::EntityDespawn),
            30 => Some(Self::ChatMessage),
            40 => Some(Self::PresenceJoin),
            41 => Some(Self::PresenceLeave),
            42 => Some(Self::PresenceUpdate),
            50 => Some(Self::EmojiReaction),
            60 => Some(Self::ObjectGrab),
            61 => Some(Self::ObjectRelease),
            _ => None,
        }
    }

    /// Tag byte.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Whether this type travels as a JSON text document.
    pub fn is_textual(self) -> bool {
        matches!(self, Self::ClientHello | Self::ServerHello)
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self, self.as_byte())
    }
}

/// Component name → serialized component value.
pub type Components = BTreeMap<String, String>;

/// Handshake request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientHello {
    /// Identity the client would like to keep.
    pub client_id: String,
    /// Human readable name.
    #[serde(default)]
    pub display_name: String,
    /// Token from the authentication layer.
    #[serde(default)]
    pub auth_token: String,
    /// Room the client wants to join.
    pub requested_room: String,
}

fn default_server_version() -> String {
    DEFAULT_SERVER_VERSION.to_string()
}

/// Handshake acknowledgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerHello {
    /// Server build identifier.
    #[serde(default = "default_server_version")]
    pub server_version: String,
    /// Identity assigned to the client; replaces the requested one. Empty
    /// means the requested identity was kept.
    #[serde(rename = "client_id", default)]
    pub assigned_client_id: String,
    /// Room the client was placed in.
    #[serde(default)]
    pub room_id: String,
    /// World snapshot for a newly joined participant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<WorldState>,
}

/// World snapshot delivered with the handshake acknowledgment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldState {
    /// Entities present in the room.
    pub entities: Vec<EntitySnapshot>,
    /// Participants present in the room.
    pub players: Vec<PlayerSnapshot>,
    /// Server time of the snapshot.
    pub last_update: u64,
}

/// One entity inside a [`WorldState`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitySnapshot {
    /// Network id.
    pub id: String,
    /// Template the entity was created from.
    pub template_id: String,
    /// Owning client; empty when the server owns it.
    pub owner_id: String,
    /// Position at snapshot time.
    pub position: Vec3,
    /// Rotation at snapshot time.
    pub rotation: Quat,
    /// Initial component data.
    pub components: Components,
}

/// One participant inside a [`WorldState`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSnapshot {
    /// Participant id.
    pub client_id: String,
    /// Display name.
    pub display_name: String,
    /// Avatar asset URL.
    pub avatar_url: String,
    /// Position at snapshot time.
    pub position: Vec3,
    /// Rotation at snapshot time.
    pub rotation: Quat,
}

/// Transform update for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    /// Network id.
    pub entity_id: String,
    /// Position.
    pub position: Vec3,
    /// Rotation.
    pub rotation: Quat,
    /// Per-entity ordering counter.
    pub sequence_number: u32,
    /// Sender time the transform was sampled.
    pub timestamp: u64,
}

impl PositionUpdate {
    /// The carried transform.
    pub fn transform(&self) -> Transform {
        Transform::new(self.position, self.rotation)
    }
}

/// Audio codec of a [`VoiceData`] frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VoiceCodec {
    /// Opus.
    Opus = 0,
    /// G.711 µ-law.
    Pcmu = 1,
    /// G.711 A-law.
    Pcma = 2,
}

impl VoiceCodec {
    /// Parse a codec byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Opus),
            1 => Some(Self::Pcmu),
            2 => Some(Self::Pcma),
            _ => None,
        }
    }
}

/// Voice frame relayed through the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceData {
    /// Speaker.
    pub from_client_id: String,
    /// Encoded audio.
    pub audio: Vec<u8>,
    /// Frame counter.
    pub sequence_number: u32,
    /// Audio codec.
    pub codec: VoiceCodec,
}

/// Entity creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySpawn {
    /// Network id.
    pub entity_id: String,
    /// Template to instantiate.
    pub template_id: String,
    /// Owning client.
    pub owner_id: String,
    /// Initial component data.
    pub components: Components,
}

/// Entity component delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityUpdate {
    /// Network id.
    pub entity_id: String,
    /// Changed components.
    pub components: Components,
}

/// Entity removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDespawn {
    /// Network id.
    pub entity_id: String,
}

/// Chat delivery style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ChatKind {
    /// Room-wide.
    #[default]
    Normal = 0,
    /// Direct.
    Whisper = 1,
    /// Extended range.
    Shout = 2,
}

impl ChatKind {
    /// Parse a kind byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Normal),
            1 => Some(Self::Whisper),
            2 => Some(Self::Shout),
            _ => None,
        }
    }
}

/// Chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Author.
    pub from_client_id: String,
    /// Text.
    pub message: String,
    /// Author's send time.
    pub timestamp: u64,
    /// Delivery style.
    pub kind: ChatKind,
}

/// Optional presence attributes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PresenceData {
    /// Display name.
    pub display_name: Option<String>,
    /// Avatar asset URL.
    pub avatar_url: Option<String>,
    /// Current position.
    pub position: Option<Vec3>,
    /// Current rotation.
    pub rotation: Option<Quat>,
}

/// Presence join/leave/update body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PresenceEvent {
    /// Participant.
    pub client_id: String,
    /// Attributes that accompany the event.
    pub data: PresenceData,
}

/// Emoji reaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmojiReaction {
    /// Reacting participant.
    pub from_client_id: String,
    /// Emoji text.
    pub emoji: String,
    /// Entity the reaction is anchored to, if any.
    pub target_entity_id: Option<String>,
}

/// Which hand holds an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Hand {
    /// Left hand or primary pointer.
    #[default]
    Left = 0,
    /// Right hand.
    Right = 1,
}

impl Hand {
    /// Parse a hand byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Left),
            1 => Some(Self::Right),
            _ => None,
        }
    }
}

/// Object grabbed by a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectGrab {
    /// Grabbed entity.
    pub entity_id: String,
    /// Grabbing participant.
    pub client_id: String,
    /// Holding hand.
    pub hand: Hand,
}

/// Object released by a participant.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRelease {
    /// Released entity.
    pub entity_id: String,
    /// Releasing participant.
    pub client_id: String,
    /// Hand that let go.
    pub hand: Hand,
    /// Transform at release.
    pub transform: Transform,
    /// Linear velocity at release.
    pub velocity: Vec3,
}
