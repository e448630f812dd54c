//! # meshsync
//!
//! Realtime entity synchronization for multiplayer clients.
//!
//! A client joins a room through a hub, receives a world snapshot, and then
//! exchanges small messages: transforms for the entities it owns, spawns and
//! despawns, chat, presence and voice. Remote entities are rendered slightly
//! in the past by interpolating between received transforms.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  sync       directory, interpolation,   │
//! │             SyncEngine, tick driver     │
//! ├─────────────────────────────────────────┤
//! │  client     ConnectionManager,          │
//! │             handshake, reconnection     │
//! ├─────────────────────────────────────────┤
//! │  transport  Connector / Link, frames    │
//! ├─────────────────────────────────────────┤
//! │  codec      binary + JSON hello wire    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Feature Flags
//!
//! - `tcp` (default): length-framed TCP transport
//!
//! ## Example Usage
//!
//! ```no_run
//! use meshsync::prelude::*;
//! use meshsync::sync::driver;
//!
//! # async fn run() -> Result<(), MeshError> {
//! let (connector, _hub) = MemoryConnector::pair();
//! let connection = ConnectionManager::new(connector);
//!
//! let engine = driver::shared(SyncEngine::new(MemoryWorld::new(), ""));
//! let _subscriptions = driver::attach(&engine, &connection);
//!
//! let config = ClientConfig::builder("mem://hub").room("lobby").build();
//! connection.connect(config).await?;
//!
//! let _ticker = driver::spawn_tick_loop(engine.clone(), connection.clone());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod client;
pub mod codec;
pub mod core;
pub mod sync;
pub mod transport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::client::{ClientConfig, ConnectionManager, ConnectionState, Subscription};
    pub use crate::codec::{Message, MessageBuilder, MessageType, Payload};
    pub use crate::core::{MeshError, MeshResult, Quat, Transform, Vec3};
    pub use crate::sync::{EntityHost, MemoryWorld, SharedEngine, SyncConfig, SyncEngine};
    pub use crate::transport::{Connector, MemoryConnector};

    #[cfg(feature = "tcp")]
    pub use crate::transport::TcpConnector;
}

// Re-export commonly used items at crate root
pub use codec::{DecodeError, EncodeError, Message, MessageType, Payload, decode, encode};
pub use core::{MeshError, MeshResult};
