//! Client configuration.

use std::time::Duration;

use uuid::Uuid;

use crate::core::constants::{
    HANDSHAKE_TIMEOUT, KEEPALIVE_INTERVAL, MAX_RECONNECT_ATTEMPTS, RECONNECT_BASE_DELAY,
};

/// Connection configuration, kept for reconnection attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Endpoint handed to the connector.
    pub endpoint: String,

    /// Room to join.
    pub room_id: String,

    /// Identity requested in the hello. The server may replace it.
    pub client_id: String,

    /// Display name sent in the hello.
    pub display_name: String,

    /// Token from the authentication layer, forwarded verbatim.
    pub auth_token: String,

    /// Time allowed for the server hello.
    pub handshake_timeout: Duration,

    /// Interval between liveness pings.
    pub keepalive_interval: Duration,

    /// First reconnection delay; doubles per attempt.
    pub reconnect_base_delay: Duration,

    /// Attempts before giving up.
    pub max_reconnect_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            room_id: String::new(),
            client_id: format!("temp-{}", Uuid::new_v4()),
            display_name: String::new(),
            auth_token: String::new(),
            handshake_timeout: HANDSHAKE_TIMEOUT,
            keepalive_interval: KEEPALIVE_INTERVAL,
            reconnect_base_delay: RECONNECT_BASE_DELAY,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl ClientConfig {
    /// Start a builder for `endpoint`.
    pub fn builder(endpoint: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(endpoint)
    }

    /// Backoff before reconnection attempt `attempt` (1-based).
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.reconnect_base_delay.saturating_mul(factor)
    }

    /// Check the fields a connection cannot start without.
    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint.is_empty() {
            return Err("endpoint is empty".into());
        }
        if self.client_id.is_empty() {
            return Err("client id is empty".into());
        }
        if self.keepalive_interval.is_zero() {
            return Err("keepalive interval must be non-zero".into());
        }
        Ok(())
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a builder with default timings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            config: ClientConfig {
                endpoint: endpoint.into(),
                ..ClientConfig::default()
            },
        }
    }

    /// Set the room to join.
    pub fn room(mut self, room_id: impl Into<String>) -> Self {
        self.config.room_id = room_id.into();
        self
    }

    /// Set the requested client id.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.client_id = client_id.into();
        self
    }

    /// Set the display name.
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.config.display_name = name.into();
        self
    }

    /// Set the auth token.
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.config.auth_token = token.into();
        self
    }

    /// Set the handshake timeout.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Set the keepalive interval.
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.config.keepalive_interval = interval;
        self
    }

    /// Set the base reconnection delay.
    pub fn reconnect_base_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_base_delay = delay;
        self
    }

    /// Set the reconnection attempt cap.
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
