//! Compact binary encoding.
//!
//! Wire format:
//! ```text
//! +0   Marker       (1 byte, 0xB7)
//! +1   Version      (1 byte, 0x01)
//! +2   Type tag     (1 byte)
//! +3   Reserved     (1 byte, zero)
//! +4   Body length  (4 bytes LE32)
//! +8   Body:
//!        message id (kind byte + 16-byte UUID | u8 length + UTF-8)
//!        timestamp  (8 bytes LE64)
//!        payload    (shape fixed by the type tag)
//! ```

use uuid::Uuid;

use super::error::{DecodeError, EncodeError};
use super::message::{Message, Payload};
use super::types::*;
use super::wire::{WireReader, WireWriter};
use crate::core::Transform;
use crate::core::constants::{
    BINARY_MARKER, HEADER_SIZE, ID_KIND_RAW, ID_KIND_UUID, MAX_BODY_SIZE, WIRE_VERSION,
};

const PRESENCE_NAME: u8 = 0x01;
const PRESENCE_AVATAR: u8 = 0x02;
const PRESENCE_POSITION: u8 = 0x04;
const PRESENCE_ROTATION: u8 = 0x08;
const PRESENCE_KNOWN: u8 = PRESENCE_NAME | PRESENCE_AVATAR | PRESENCE_POSITION | PRESENCE_ROTATION;

/// Decoded fixed-size header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Message type.
    pub message_type: MessageType,
    /// Declared body length.
    pub body_len: usize,
}

impl FrameHeader {
    /// Total frame length (header + body).
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.body_len
    }

    /// Parse and validate the header without touching the body.
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < HEADER_SIZE {
            return Err(DecodeError::Incomplete {
                needed: HEADER_SIZE - data.len(),
            });
        }
        if data[0] != BINARY_MARKER {
            return Err(DecodeError::UnknownMarker(data[0]));
        }
        if data[1] != WIRE_VERSION {
            return Err(DecodeError::UnsupportedVersion(data[1]));
        }
        let message_type = MessageType::from_byte(data[2]).ok_or(DecodeError::UnknownType(data[2]))?;
        if data[3] != 0 {
            return Err(DecodeError::ReservedBits(data[3]));
        }
        let body_len = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
        if body_len > MAX_BODY_SIZE {
            return Err(DecodeError::BodyTooLarge(body_len));
        }
        if message_type.is_textual() {
            return Err(DecodeError::WrongEncoding(message_type));
        }
        Ok(Self {
            message_type,
            body_len,
        })
    }
}

/// Frame length declared by a header that at least has a sane length field.
///
/// Used to skip exactly one corrupt frame in a stream.
pub(crate) fn declared_frame_len(data: &[u8]) -> Option<usize> {
    if data.len() < HEADER_SIZE || data[0] != BINARY_MARKER || data[1] != WIRE_VERSION {
        return None;
    }
    let body_len = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
    (body_len <= MAX_BODY_SIZE).then_some(HEADER_SIZE + body_len)
}

/// Encode a non-textual message.
pub(crate) fn encode(message: &Message) -> Result<Vec<u8>, EncodeError> {
    let mut body = WireWriter::new();
    put_message_id(&mut body, &message.message_id)?;
    body.put_u64(message.timestamp);
    put_payload(&mut body, &message.payload)?;
    let body = body.into_inner();

    if body.len() > MAX_BODY_SIZE {
        return Err(EncodeError::BodyTooLarge(body.len()));
    }

    let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
    frame.push(BINARY_MARKER);
    frame.push(WIRE_VERSION);
    frame.push(message.message_type().as_byte());
    frame.push(0);
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decode one frame from the front of `data`, returning bytes consumed.
pub(crate) fn decode(data: &[u8]) -> Result<(Message, usize), DecodeError> {
    let header = FrameHeader::parse(data)?;
    let frame_len = header.frame_len();
    if data.len() < frame_len {
        return Err(DecodeError::Incomplete {
            needed: frame_len - data.len(),
        });
    }

    let mut r = WireReader::new(&data[HEADER_SIZE..frame_len]);
    let message_id = get_message_id(&mut r)?;
    let timestamp = r.get_u64("timestamp")?;
    let payload = get_payload(&mut r, header.message_type)?;
    r.finish()?;

    Ok((
        Message {
            message_id,
            timestamp,
            payload,
        },
        frame_len,
    ))
}

fn put_message_id(w: &mut WireWriter, id: &str) -> Result<(), EncodeError> {
    // Only canonical lowercase hyphenated UUIDs are packed so the string
    // reproduces byte for byte on decode.
    if let Ok(uuid) = Uuid::parse_str(id) {
        if uuid.hyphenated().to_string() == id {
            w.put_u8(ID_KIND_UUID);
            w.put_raw(uuid.as_bytes());
            return Ok(());
        }
    }
    w.put_u8(ID_KIND_RAW);
    w.put_id("message_id", id)
}

fn get_message_id(r: &mut WireReader<'_>) -> Result<String, DecodeError> {
    match r.get_u8("message_id")? {
        ID_KIND_UUID => {
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(r.take("message_id", 16)?);
            Ok(Uuid::from_bytes(bytes).hyphenated().to_string())
        }
        ID_KIND_RAW => r.get_id("message_id"),
        other => Err(DecodeError::InvalidValue {
            field: "message_id kind",
            value: other,
        }),
    }
}

fn put_presence(w: &mut WireWriter, event: &PresenceEvent) -> Result<(), EncodeError> {
    w.put_id("client_id", &event.client_id)?;
    let data = &event.data;
    let mut flags = 0u8;
    if data.display_name.is_some() {
        flags |= PRESENCE_NAME;
    }
    if data.avatar_url.is_some() {
        flags |= PRESENCE_AVATAR;
    }
    if data.position.is_some() {
        flags |= PRESENCE_POSITION;
    }
    if data.rotation.is_some() {
        flags |= PRESENCE_ROTATION;
    }
    w.put_u8(flags);
    if let Some(name) = &data.display_name {
        w.put_text("display_name", name)?;
    }
    if let Some(url) = &data.avatar_url {
        w.put_text("avatar_url", url)?;
    }
    if let Some(position) = data.position {
        w.put_vec3(position);
    }
    if let Some(rotation) = data.rotation {
        w.put_quat(rotation);
    }
    Ok(())
}

fn get_presence(r: &mut WireReader<'_>) -> Result<PresenceEvent, DecodeError> {
    let client_id = r.get_id("client_id")?;
    let flags = r.get_u8("presence flags")?;
    if flags & !PRESENCE_KNOWN != 0 {
        return Err(DecodeError::InvalidValue {
            field: "presence flags",
            value: flags,
        });
    }
    let display_name = match flags & PRESENCE_NAME {
        0 => None,
        _ => Some(r.get_text("display_name")?),
    };
    let avatar_url = match flags & PRESENCE_AVATAR {
        0 => None,
        _ => Some(r.get_text("avatar_url")?),
    };
    let position = match flags & PRESENCE_POSITION {
        0 => None,
        _ => Some(r.get_vec3("position")?),
    };
    let rotation = match flags & PRESENCE_ROTATION {
        0 => None,
        _ => Some(r.get_quat("rotation")?),
    };
    Ok(PresenceEvent {
        client_id,
        data: PresenceData {
            display_name,
            avatar_url,
            position,
            rotation,
        },
    })
}

fn put_payload(w: &mut WireWriter, payload: &Payload) -> Result<(), EncodeError> {
    match payload {
        Payload::ClientHello(_) | Payload::ServerHello(_) => {
            return Err(EncodeError::WrongEncoding(payload.message_type()));
        }
        Payload::Ping => {}
        Payload::PositionUpdate(p) => {
            w.put_id("entity_id", &p.entity_id)?;
            w.put_vec3(p.position);
            w.put_quat(p.rotation);
            w.put_u32(p.sequence_number);
            w.put_u64(p.timestamp);
        }
        Payload::VoiceData(v) => {
            w.put_id("from_client_id", &v.from_client_id)?;
            w.put_u8(v.codec as u8);
            w.put_u32(v.sequence_number);
            w.put_blob(&v.audio);
        }
        Payload::EntitySpawn(s) => {
            w.put_id("entity_id", &s.entity_id)?;
            w.put_id("template_id", &s.template_id)?;
            w.put_id("owner_id", &s.owner_id)?;
            w.put_components(&s.components)?;
        }
        Payload::EntityUpdate(u) => {
            w.put_id("entity_id", &u.entity_id)?;
            w.put_components(&u.components)?;
        }
        Payload::EntityDespawn(d) => {
            w.put_id("entity_id", &d.entity_id)?;
        }
        Payload::ChatMessage(c) => {
            w.put_id("from_client_id", &c.from_client_id)?;
            w.put_text("message", &c.message)?;
            w.put_u64(c.timestamp);
            w.put_u8(c.kind as u8);
        }
        Payload::PresenceJoin(e) | Payload::PresenceLeave(e) | Payload::PresenceUpdate(e) => {
            put_presence(w, e)?;
        }
        Payload::EmojiReaction(e) => {
            w.put_id("from_client_id", &e.from_client_id)?;
            w.put_text("emoji", &e.emoji)?;
            match &e.target_entity_id {
                Some(target) => {
                    w.put_u8(1);
                    w.put_id("target_entity_id", target)?;
                }
                None => w.put_u8(0),
            }
        }
        Payload::ObjectGrab(g) => {
            w.put_id("entity_id", &g.entity_id)?;
            w.put_id("client_id", &g.client_id)?;
            w.put_u8(g.hand as u8);
        }
        Payload::ObjectRelease(o) => {
            w.put_id("entity_id", &o.entity_id)?;
            w.put_id("client_id", &o.client_id)?;
            w.put_u8(o.hand as u8);
            w.put_vec3(o.transform.position);
            w.put_quat(o.transform.rotation);
            w.put_vec3(o.velocity);
        }
    }
    Ok(())
}

fn get_hand(r: &mut WireReader<'_>) -> Result<Hand, DecodeError> {
    let value = r.get_u8("hand")?;
    Hand::from_byte(value).ok_or(DecodeError::InvalidValue { field: "hand", value })
}

fn get_payload(r: &mut WireReader<'_>, ty: MessageType) -> Result<Payload, DecodeError> {
    let payload = match ty {
        MessageType::ClientHello | MessageType::ServerHello => {
            return Err(DecodeError::WrongEncoding(ty));
        }
        MessageType::Ping => Payload::Ping,
        MessageType::PositionUpdate => Payload::PositionUpdate(PositionUpdate {
            entity_id: r.get_id("entity_id")?,
            position: r.get_vec3("position")?,
            rotation: r.get_quat("rotation")?,
            sequence_number: r.get_u32("sequence_number")?,
            timestamp: r.get_u64("timestamp")?,
        }),
        MessageType::VoiceData => {
            let from_client_id = r.get_id("from_client_id")?;
            let raw = r.get_u8("codec")?;
            let codec = VoiceCodec::from_byte(raw).ok_or(DecodeError::InvalidValue {
                field: "codec",
                value: raw,
            })?;
            Payload::VoiceData(VoiceData {
                from_client_id,
                codec,
                sequence_number: r.get_u32("sequence_number")?,
                audio: r.get_blob("audio")?,
            })
        }
        MessageType::EntitySpawn => Payload::EntitySpawn(EntitySpawn {
            entity_id: r.get_id("entity_id")?,
            template_id: r.get_id("template_id")?,
            owner_id: r.get_id("owner_id")?,
            components: r.get_components()?,
        }),
        MessageType::EntityUpdate => Payload::EntityUpdate(EntityUpdate {
            entity_id: r.get_id("entity_id")?,
            components: r.get_components()?,
        }),
        MessageType::EntityDespawn => Payload::EntityDespawn(EntityDespawn {
            entity_id: r.get_id("entity_id")?,
        }),
        MessageType::ChatMessage => {
            let from_client_id = r.get_id("from_client_id")?;
            let message = r.get_text("message")?;
            let timestamp = r.get_u64("timestamp")?;
            let raw = r.get_u8("kind")?;
            let kind = ChatKind::from_byte(raw).ok_or(DecodeError::InvalidValue {
                field: "kind",
                value: raw,
            })?;
            Payload::ChatMessage(ChatMessage {
                from_client_id,
                message,
                timestamp,
                kind,
            })
        }
        MessageType::PresenceJoin => Payload::PresenceJoin(get_presence(r)?),
        MessageType::PresenceLeave => Payload::PresenceLeave(get_presence(r)?),
        MessageType::PresenceUpdate => Payload::PresenceUpdate(get_presence(r)?),
        MessageType::EmojiReaction => {
            let from_client_id = r.get_id("from_client_id")?;
            let emoji = r.get_text("emoji")?;
            let target_entity_id = match r.get_u8("target flag")? {
                0 => None,
                1 => Some(r.get_id("target_entity_id")?),
                value => {
                    return Err(DecodeError::InvalidValue {
                        field: "target flag",
                        value,
                    });
                }
            };
            Payload::EmojiReaction(EmojiReaction {
                from_client_id,
                emoji,
                target_entity_id,
            })
        }
        MessageType::ObjectGrab => Payload::ObjectGrab(ObjectGrab {
            entity_id: r.get_id("entity_id")?,
            client_id: r.get_id("client_id")?,
            hand: get_hand(r)?,
        }),
        MessageType::ObjectRelease => {
            let entity_id = r.get_id("entity_id")?;
            let client_id = r.get_id("client_id")?;
            let hand = get_hand(r)?;
            let position = r.get_vec3("position")?;
            let rotation = r.get_quat("rotation")?;
            Payload::ObjectRelease(ObjectRelease {
                entity_id,
                client_id,
                hand,
                transform: Transform::new(position, rotation),
                velocity: r.get_vec3("velocity")?,
            })
        }
    };
    Ok(payload)
}
