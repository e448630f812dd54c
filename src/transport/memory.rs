//! In-memory transport.
//!
//! Keeps client and peer in the same process. Every successful
//! [`MemoryConnector::connect`] hands a fresh [`ServerEnd`] to the paired
//! [`MemoryListener`], which plays the server side. Used for local sessions
//! and for exercising the connection manager without sockets.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tracing::warn;

use crate::codec::{DecodeError, Message, decode};

use super::error::TransportError;
use super::frame::{CloseReason, Frame, TransportEvent};
use super::{ConnectFuture, Connector, Link};

#[derive(Debug, Default)]
struct Shared {
    refusing: AtomicBool,
    attempts: AtomicUsize,
}

/// Client-side connector for the in-memory transport.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<ServerEnd>,
    shared: Arc<Shared>,
}

/// Receives the server side of every link opened through the paired connector.
#[derive(Debug)]
pub struct MemoryListener {
    accept_rx: mpsc::UnboundedReceiver<ServerEnd>,
}

impl MemoryConnector {
    /// Create a connector and its listener.
    pub fn pair() -> (Self, MemoryListener) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        (
            Self {
                accept_tx,
                shared: Arc::new(Shared::default()),
            },
            MemoryListener { accept_rx },
        )
    }

    /// Refuse (or accept again) subsequent connection attempts.
    pub fn set_refusing(&self, refusing: bool) {
        self.shared.refusing.store(refusing, Ordering::SeqCst);
    }

    /// Number of connection attempts made so far, refused ones included.
    pub fn attempts(&self) -> usize {
        self.shared.attempts.load(Ordering::SeqCst)
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, endpoint: &str) -> ConnectFuture<'_> {
        let endpoint = endpoint.to_string();
        Box::pin(async move {
            self.shared.attempts.fetch_add(1, Ordering::SeqCst);
            if self.shared.refusing.load(Ordering::SeqCst) {
                return Err(TransportError::Refused(endpoint));
            }

            let (to_server, incoming) = mpsc::unbounded_channel();
            let (outgoing, events) = mpsc::unbounded_channel();
            let server = ServerEnd {
                endpoint: endpoint.clone(),
                incoming,
                outgoing,
            };
            if self.accept_tx.send(server).is_err() {
                warn!(%endpoint, "memory listener dropped, refusing link");
                return Err(TransportError::Refused(endpoint));
            }
            Ok(Link {
                sender: to_server,
                events,
            })
        })
    }
}

impl MemoryListener {
    /// Wait for the next link. `None` once every connector is dropped.
    pub async fn accept(&mut self) -> Option<ServerEnd> {
        self.accept_rx.recv().await
    }

    /// Take an already opened link without waiting.
    pub fn try_accept(&mut self) -> Option<ServerEnd> {
        self.accept_rx.try_recv().ok()
    }
}

/// Server side of one in-memory link.
///
/// Dropping it without calling [`ServerEnd::close`] looks like a lost
/// connection to the client.
#[derive(Debug)]
pub struct ServerEnd {
    endpoint: String,
    incoming: mpsc::UnboundedReceiver<Frame>,
    outgoing: mpsc::UnboundedSender<TransportEvent>,
}

impl ServerEnd {
    /// Endpoint the client dialed.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Next frame from the client. `None` once the client side is gone.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.incoming.recv().await
    }

    /// Next decoded message from the client.
    ///
    /// Returns `None` on a close frame or when the client side is gone.
    pub async fn recv_message(&mut self) -> Option<Result<Message, DecodeError>> {
        match self.recv().await? {
            Frame::Close(_) => None,
            frame => frame.payload().map(decode),
        }
    }

    /// Deliver a raw frame to the client.
    pub fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.outgoing
            .send(TransportEvent::Frame(frame))
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Encode and deliver a message to the client.
    pub fn send_message(&self, message: &Message) -> Result<(), TransportError> {
        let frame = Frame::from_message(message).map_err(|e| {
            warn!(error = %e, "memory server could not encode message");
            TransportError::ConnectionClosed
        })?;
        self.send(frame)
    }

    /// Close the link from the server side.
    pub fn close(self, code: u16, reason: &str) {
        let _ = self
            .outgoing
            .send(TransportEvent::Closed(CloseReason::new(code, reason)));
    }

    /// Inject a transport error event.
    pub fn fail(&self, error: TransportError) {
        let _ = self.outgoing.send(TransportEvent::Error(error));
    }
}
