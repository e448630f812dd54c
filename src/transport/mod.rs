//! Transport layer.
//!
//! The connection manager only needs an ordered, message-oriented duplex
//! link that distinguishes binary from text frames and reports closure. A
//! [`Connector`] opens such a [`Link`]:
//!
//! - [`MemoryConnector`]: in-process pair, used for local sessions and tests
//! - [`TcpConnector`]: length-framed TCP (feature `tcp`, on by default)
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Sync Engine                  │
//! ├─────────────────────────────────────────┤
//! │         Connection Manager              │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   frames, close reasons, link events    │
//! └─────────────────────────────────────────┘
//! ```

mod error;
mod frame;
mod memory;
#[cfg(feature = "tcp")]
mod tcp;

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

pub use error::*;
pub use frame::*;
pub use memory::{MemoryConnector, MemoryListener, ServerEnd};
#[cfg(feature = "tcp")]
#[cfg_attr(docsrs, doc(cfg(feature = "tcp")))]
pub use tcp::{TcpConnector, read_frame, write_frame};

/// An open duplex link.
///
/// Sending [`Frame::Close`] asks the transport to close; dropping `sender`
/// closes it without a close frame. The event stream ends once the
/// transport has nothing more to deliver.
#[derive(Debug)]
pub struct Link {
    /// Outbound frames.
    pub sender: mpsc::UnboundedSender<Frame>,
    /// Inbound frames and lifecycle events.
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Future returned by [`Connector::connect`].
pub type ConnectFuture<'a> = Pin<Box<dyn Future<Output = TransportResult<Link>> + Send + 'a>>;

/// Opens links to an endpoint.
pub trait Connector: Send + Sync + 'static {
    /// Open a link to `endpoint`.
    fn connect(&self, endpoint: &str) -> ConnectFuture<'_>;
}
