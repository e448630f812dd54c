//! Connection state and per-session counters.

use std::collections::HashMap;
use std::fmt;

/// Connection lifecycle.
///
/// ```text
/// Idle ─connect→ Connecting ─ack→ Open ─disconnect→ Closing → Closed
///                    │              │
///                    └──────────────┴─link lost→ Closed → Reconnecting ─┐
///                                                  ↑                    │
///                                                  └── attempt failed ──┘
///                                       cap reached → Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Never connected.
    #[default]
    Idle,
    /// Transport opening or handshake in flight.
    Connecting,
    /// Handshake acknowledged.
    Open,
    /// Caller-initiated close in progress.
    Closing,
    /// Closed; a reconnect may be scheduled.
    Closed,
    /// Waiting for the next reconnection attempt.
    Reconnecting,
    /// Reconnection gave up. Only an explicit `connect` leaves this state.
    Failed,
}

impl ConnectionState {
    /// Whether `connect` should be ignored in this state.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Connecting | Self::Open | Self::Reconnecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Snapshot returned by `ConnectionManager::stats`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Current state.
    pub state: ConnectionState,
    /// Current client id.
    pub client_id: String,
    /// Room joined or requested.
    pub room_id: String,
    /// Reconnection attempts since the last successful handshake.
    pub reconnect_attempts: u32,
}

/// Identity and counters for the current session.
#[derive(Debug, Default)]
pub(crate) struct Session {
    pub(crate) client_id: String,
    pub(crate) room_id: String,
    pub(crate) reconnect_attempts: u32,
    sequences: HashMap<String, u32>,
    voice_sequence: u32,
}

impl Session {
    pub(crate) fn new(client_id: &str, room_id: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            room_id: room_id.to_string(),
            ..Self::default()
        }
    }

    /// Next position sequence number for `entity_id`, starting at 0.
    pub(crate) fn next_sequence(&mut self, entity_id: &str) -> u32 {
        let counter = self.sequences.entry(entity_id.to_string()).or_insert(0);
        let seq = *counter;
        *counter = counter.wrapping_add(1);
        seq
    }

    /// Forget the position sequence of a despawned entity.
    pub(crate) fn forget_entity(&mut self, entity_id: &str) {
        self.sequences.remove(entity_id);
    }

    pub(crate) fn next_voice_sequence(&mut self) -> u32 {
        let seq = self.voice_sequence;
        self.voice_sequence = seq.wrapping_add(1);
        seq
    }

    /// Adopt the identity assigned by the server. Empty keeps the current one.
    pub(crate) fn reassign(&mut self, assigned: &str) -> bool {
        if assigned.is_empty() || assigned == self.client_id {
            return false;
        }
        self.client_id = assigned.to_string();
        true
    }
}
