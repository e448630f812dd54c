//! Sync engine configuration.

use std::time::Duration;

use crate::core::constants::{
    DEFAULT_SYNC_INTERVAL_MS, DESPAWN_GRACE_MS, INTERPOLATION_CAPACITY, RENDER_DELAY_MS,
    TICK_RATE_HZ,
};

/// Tuning for [`SyncEngine`](super::SyncEngine) and its tick loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Outbound tick frequency.
    pub tick_rate_hz: u32,
    /// Samples kept per remote entity.
    pub buffer_capacity: usize,
    /// Minimum time between transform sends for one owned entity.
    pub sync_interval_ms: u64,
    /// How long a despawned id ignores late spawns.
    pub despawn_grace_ms: u64,
    /// How far behind "now" remote entities are rendered.
    pub render_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: TICK_RATE_HZ,
            buffer_capacity: INTERPOLATION_CAPACITY,
            sync_interval_ms: DEFAULT_SYNC_INTERVAL_MS,
            despawn_grace_ms: DESPAWN_GRACE_MS,
            render_delay_ms: RENDER_DELAY_MS,
        }
    }
}

impl SyncConfig {
    /// Start a builder from the defaults.
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::new()
    }

    /// Period of the outbound tick. A zero rate is treated as 1 Hz.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.tick_rate_hz.max(1)))
    }
}

/// Builder for [`SyncConfig`].
#[derive(Debug, Clone, Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    /// Create a builder from the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the outbound tick rate.
    pub fn tick_rate_hz(mut self, hz: u32) -> Self {
        self.config.tick_rate_hz = hz;
        self
    }

    /// Set the per-entity interpolation capacity.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    /// Set the per-entity send throttle.
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.config.sync_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the despawn tombstone lifetime.
    pub fn despawn_grace(mut self, grace: Duration) -> Self {
        self.config.despawn_grace_ms = grace.as_millis() as u64;
        self
    }

    /// Set the render delay.
    pub fn render_delay(mut self, delay: Duration) -> Self {
        self.config.render_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> SyncConfig {
        self.config
    }
}
