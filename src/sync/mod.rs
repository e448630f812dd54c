//! Entity synchronization layer.
//!
//! [`SyncEngine`] mirrors networked entities into an application-provided
//! [`EntityHost`]. Ownership decides direction: owned entities are sampled
//! and sent on a fixed tick, remote entities are buffered and interpolated.
//! The [`driver`] functions connect an engine to a
//! [`ConnectionManager`](crate::client::ConnectionManager).

mod config;
mod directory;
pub mod driver;
mod engine;
mod host;
mod interpolation;

pub use config::{SyncConfig, SyncConfigBuilder};
pub use directory::{DirectoryError, EntityDirectory, NetworkEntityRecord};
pub use driver::{SharedEngine, attach, spawn_tick_loop};
pub use engine::{OutboundUpdate, SyncEngine, SyncOutcome};
pub use host::{EntityHost, MemoryWorld, WorldEntity};
pub use interpolation::{InterpolationBuffer, TransformSample};
