//! Protocol and timing constants.
//!
//! Wire values in this module are part of the external contract and MUST NOT
//! be changed once deployed. Timing values are defaults; every one of them can
//! be overridden through the client or sync configuration.

use std::time::Duration;

// =============================================================================
// WIRE FORMAT
// =============================================================================

/// First byte of every compact binary frame.
pub const BINARY_MARKER: u8 = 0xB7;

/// First byte of every textual (JSON) hello document.
pub const TEXT_MARKER: u8 = b'{';

/// Compact wire format version.
pub const WIRE_VERSION: u8 = 0x01;

/// Compact header size (marker + version + type + reserved + body length).
pub const HEADER_SIZE: usize = 8;

/// Upper bound on a declared body length. Anything larger is corruption.
pub const MAX_BODY_SIZE: usize = 1 << 20;

/// Maximum encoded length of an identifier (u8 length prefix).
pub const MAX_ID_LEN: usize = u8::MAX as usize;

/// Maximum encoded length of free text (u16 length prefix).
pub const MAX_TEXT_LEN: usize = u16::MAX as usize;

/// Message id encoding: raw UTF-8 string.
pub const ID_KIND_RAW: u8 = 0x00;

/// Message id encoding: packed 16-byte UUID.
pub const ID_KIND_UUID: u8 = 0x01;

// =============================================================================
// CONNECTION
// =============================================================================

/// Interval between liveness pings while the session is open.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Time allowed between transport open and the server hello.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Base delay for reconnection backoff (doubles per attempt).
pub const RECONNECT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Reconnection attempts before the session is declared failed.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Close code for a caller-initiated disconnect.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code when the handshake could not be completed.
pub const CLOSE_PROTOCOL_ERROR: u16 = 1002;

/// Close code reported when the link dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Largest frame a stream transport will accept (compact frame or hello).
pub const MAX_TRANSPORT_FRAME: usize = HEADER_SIZE + MAX_BODY_SIZE;

/// Server version assumed when the hello omits it.
pub const DEFAULT_SERVER_VERSION: &str = "1.0.0";

// =============================================================================
// SYNC
// =============================================================================

/// Outbound tick rate, independent of the render rate.
pub const TICK_RATE_HZ: u32 = 30;

/// Samples retained per remote entity.
pub const INTERPOLATION_CAPACITY: usize = 60;

/// Minimum time between position updates for one owned entity.
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 1000 / TICK_RATE_HZ as u64;

/// How long a despawned id is remembered to suppress late spawns.
pub const DESPAWN_GRACE_MS: u64 = 10_000;

/// Delay applied to the render clock before sampling remote entities.
pub const RENDER_DELAY_MS: u64 = 100;
