//! Connection manager.
//!
//! Owns one logical session to a relay: transport, handshake, keepalive,
//! reconnection with exponential backoff, and typed dispatch of inbound
//! messages. Shared state lives behind a short `std::sync::Mutex` that is
//! never held across an `.await`. Every transition that invalidates running
//! tasks bumps an epoch, and tasks carrying an older epoch do nothing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep, timeout_at};
use tracing::{debug, error, info, warn};

use crate::codec::{
    ChatKind, ClientHello, Components, EmojiReaction, EntitySpawn, Hand, Message, MessageBuilder,
    MessageType, ObjectGrab, ObjectRelease, Payload, PresenceData, ServerHello, VoiceCodec,
    FrameBuffer, VoiceData, decode,
};
use crate::core::constants::CLOSE_PROTOCOL_ERROR;
use crate::core::{Quat, Transform, Vec3};
use crate::transport::{CloseReason, Connector, Frame, Link, TransportError, TransportEvent};

use super::config::ClientConfig;
use super::error::ConnectError;
use super::handlers::{HandlerRegistry, Subscription};
use super::session::{ConnectionState, ConnectionStats, Session};

#[derive(Debug, Default)]
struct Tasks {
    reader: Option<JoinHandle<()>>,
    keepalive: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
}

impl Tasks {
    fn abort_all(&mut self) {
        for handle in [
            self.reader.take(),
            self.keepalive.take(),
            self.reconnect.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }
}

/// Resets the session if a `connect` future is dropped mid-handshake.
struct PendingConnect<'a> {
    inner: &'a Arc<Inner>,
    epoch: u64,
    armed: bool,
}

impl PendingConnect<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingConnect<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.on_connect_failed(self.epoch, &ConnectError::Cancelled);
        }
    }
}

#[derive(Debug, Default)]
struct Core {
    epoch: u64,
    config: Option<ClientConfig>,
    session: Session,
    outbound: Option<mpsc::UnboundedSender<Frame>>,
    cancel: Option<oneshot::Sender<()>>,
    tasks: Tasks,
}

struct Inner {
    connector: Arc<dyn Connector>,
    handlers: Arc<HandlerRegistry>,
    state: watch::Sender<ConnectionState>,
    core: Mutex<Core>,
}

/// Handle to one logical session. Cheap to clone.
///
/// # Example
///
/// ```ignore
/// use meshsync::client::{ClientConfig, ConnectionManager};
/// use meshsync::codec::MessageType;
/// use meshsync::transport::TcpConnector;
///
/// let manager = ConnectionManager::new(TcpConnector::new());
/// let _chat = manager.on(MessageType::ChatMessage, |msg| println!("{msg:?}"));
///
/// let config = ClientConfig::builder("tcp://127.0.0.1:7000")
///     .room("lobby")
///     .display_name("Ada")
///     .build();
/// manager.connect(config).await?;
/// manager.send_chat_message("hello", Default::default());
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a manager that opens links through `connector`.
    pub fn new<C: Connector>(connector: C) -> Self {
        Self::with_connector(Arc::new(connector))
    }

    /// Create a manager from a shared connector.
    pub fn with_connector(connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            inner: Arc::new(Inner {
                connector,
                handlers: Arc::new(HandlerRegistry::default()),
                state,
                core: Mutex::new(Core::default()),
            }),
        }
    }

    /// Open the transport and complete the handshake.
    ///
    /// Resolves once a matching server hello arrives. Calling it while a
    /// session is open, connecting or reconnecting starts nothing new: it
    /// waits for the attempt in flight and reports its outcome.
    /// `disconnect` during the handshake resolves this with
    /// [`ConnectError::Cancelled`]. Dropping the returned future abandons
    /// the attempt and leaves the manager `Closed`.
    pub async fn connect(&self, config: ClientConfig) -> Result<(), ConnectError> {
        config.validate().map_err(ConnectError::InvalidConfig)?;

        let attempt = {
            let mut core = self.inner.core();
            let state = self.inner.state();
            if state.is_busy() {
                warn!(state = %state, "connect ignored: joining the active connection");
                None
            } else {
                core.epoch += 1;
            core.tasks.abort_all();
            core.outbound = None;
            core.session = Session::new(&config.client_id, &config.room_id);
            core.config = Some(config);
                let (cancel_tx, cancel_rx) = oneshot::channel();
                core.cancel = Some(cancel_tx);
                self.inner.set_state(ConnectionState::Connecting);
                Some((core.epoch, cancel_rx))
            }
        };
        let Some((epoch, cancelled)) = attempt else {
            return self.join_attempt().await;
        };

        let pending = PendingConnect {
            inner: &self.inner,
            epoch,
            armed: true,
        };
        let result = tokio::select! {
            biased;
            result = self.inner.handshake(epoch) => result,
            _ = cancelled => Err(ConnectError::Cancelled),
        };
        pending.disarm();

        if let Err(e) = &result {
            self.inner.on_connect_failed(epoch, e);
        }
        result
    }

    /// Wait for the connection attempt already in flight.
    async fn join_attempt(&self) -> Result<(), ConnectError> {
        let mut states = self.inner.state.subscribe();
        loop {
            // Read under the core lock so the Closed between retries is never seen.
            let state = {
                let _core = self.inner.core();
                *states.borrow_and_update()
            };
            match state {
                ConnectionState::Open => return Ok(()),
                ConnectionState::Failed => {
                    return Err(ConnectError::HandshakeFailed(
                        "reconnection attempts exhausted".into(),
                    ));
                }
                ConnectionState::Idle | ConnectionState::Closed => {
                    return Err(ConnectError::HandshakeFailed(
                        "concurrent connection attempt did not open".into(),
                    ));
                }
                ConnectionState::Connecting
                | ConnectionState::Reconnecting
                | ConnectionState::Closing => {}
            }
            if states.changed().await.is_err() {
                return Err(ConnectError::Cancelled);
            }
        }
    }

    /// Close the session without reconnecting. Idempotent.
    pub fn disconnect(&self) {
        let mut core = self.inner.core();
        let state = self.inner.state();
        core.epoch += 1;
        core.tasks.abort_all();
        if let Some(cancel) = core.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(sender) = core.outbound.take() {
            self.inner.set_state(ConnectionState::Closing);
            let _ = sender.send(Frame::Close(CloseReason::normal()));
        }
        match state {
            ConnectionState::Idle | ConnectionState::Closed => {
                debug!(state = %state, "disconnect: nothing to close");
            }
            _ => {
                self.inner.set_state(ConnectionState::Closed);
                info!(client_id = %core.session.client_id, "disconnected");
            }
        }
    }

    /// Register a handler for one message type.
    pub fn on<F>(&self, message_type: MessageType, handler: F) -> Subscription
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.inner.handlers.register(message_type, Arc::new(handler))
    }

    /// Number of handlers registered for `message_type`.
    pub fn handler_count(&self, message_type: MessageType) -> usize {
        self.inner.handlers.count(message_type)
    }

    /// Send a message. Logged no-op unless the session is open.
    pub fn send(&self, message: Message) {
        let sender = {
            let core = self.inner.core();
            match (&core.outbound, self.inner.state()) {
                (Some(sender), ConnectionState::Open) => sender.clone(),
                (_, state) => {
                    warn!(
                        message_type = %message.message_type(),
                        state = %state,
                        "send ignored: not connected"
                    );
                    return;
                }
            }
        };
        match Frame::from_message(&message) {
            Ok(frame) => {
                if sender.send(frame).is_err() {
                    warn!(message_type = %message.message_type(), "send failed: link closed");
                }
            }
            Err(e) => {
                warn!(error = %e, message_type = %message.message_type(), "dropping unencodable message");
            }
        }
    }

    /// Send a transform for an owned entity with the next sequence number.
    pub fn send_position_update(&self, entity_id: &str, position: Vec3, rotation: Quat) {
        let sequence = self.inner.core().session.next_sequence(entity_id);
        self.send(MessageBuilder::position_update(entity_id, position, rotation, sequence));
    }

    /// Announce a new entity owned by this client.
    pub fn send_entity_spawn(&self, entity_id: &str, template_id: &str, components: Components) {
        self.send(MessageBuilder::entity_spawn(EntitySpawn {
            entity_id: entity_id.to_string(),
            template_id: template_id.to_string(),
            owner_id: self.client_id(),
            components,
        }));
    }

    /// Send component deltas for an entity.
    pub fn send_entity_update(&self, entity_id: &str, components: Components) {
        self.send(MessageBuilder::entity_update(entity_id, components));
    }

    /// Announce an entity removal and drop its position sequence.
    pub fn send_entity_despawn(&self, entity_id: &str) {
        self.inner.core().session.forget_entity(entity_id);
        self.send(MessageBuilder::entity_despawn(entity_id));
    }

    /// Send a chat line from this client.
    pub fn send_chat_message(&self, message: &str, kind: ChatKind) {
        self.send(MessageBuilder::chat_message(self.client_id(), message, kind));
    }

    /// Publish this client's presence attributes.
    pub fn send_presence_update(&self, data: PresenceData) {
        self.send(MessageBuilder::presence_update(self.client_id(), data));
    }

    /// Send an emoji reaction, optionally anchored to an entity.
    pub fn send_emoji_reaction(&self, emoji: &str, target_entity_id: Option<&str>) {
        self.send(MessageBuilder::emoji_reaction(EmojiReaction {
            from_client_id: self.client_id(),
            emoji: emoji.to_string(),
            target_entity_id: target_entity_id.map(str::to_string),
        }));
    }

    /// Announce that this client grabbed an object.
    pub fn send_object_grab(&self, entity_id: &str, hand: Hand) {
        self.send(MessageBuilder::object_grab(ObjectGrab {
            entity_id: entity_id.to_string(),
            client_id: self.client_id(),
            hand,
        }));
    }

    /// Announce that this client released an object.
    pub fn send_object_release(&self, entity_id: &str, hand: Hand, transform: Transform, velocity: Vec3) {
        self.send(MessageBuilder::object_release(ObjectRelease {
            entity_id: entity_id.to_string(),
            client_id: self.client_id(),
            hand,
            transform,
            velocity,
        }));
    }

    /// Send one encoded voice frame.
    pub fn send_voice_data(&self, audio: Vec<u8>, codec: VoiceCodec) {
        let (from_client_id, sequence_number) = {
            let mut core = self.inner.core();
            let seq = core.session.next_voice_sequence();
            (core.session.client_id.clone(), seq)
        };
        self.send(MessageBuilder::voice_data(VoiceData {
            from_client_id,
            audio,
            sequence_number,
            codec,
        }));
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Whether the session is open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Current client id; the server-assigned one once acknowledged.
    pub fn client_id(&self) -> String {
        self.inner.core().session.client_id.clone()
    }

    /// State, identity, and reconnection counters.
    pub fn stats(&self) -> ConnectionStats {
        let core = self.inner.core();
        ConnectionStats {
            state: self.inner.state(),
            client_id: core.session.client_id.clone(),
            room_id: core.session.room_id.clone(),
            reconnect_attempts: core.session.reconnect_attempts,
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("client_id", &self.client_id())
            .finish()
    }
}

impl Inner {
    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(from = %prev, to = %next, "connection state changed");
        }
    }

    async fn handshake(self: &Arc<Self>, epoch: u64) -> Result<(), ConnectError> {
        let (config, client_id) = {
            let core = self.core();
            let config = core
                .config
                .clone()
                .ok_or_else(|| ConnectError::InvalidConfig("no stored configuration".into()))?;
            (config, core.session.client_id.clone())
        };

        // Opening the transport and the hello round-trip share one deadline.
        let deadline = Instant::now() + config.handshake_timeout;
        debug!(endpoint = %config.endpoint, client_id = %client_id, "opening transport");
        let mut link = match timeout_at(deadline, self.connector.connect(&config.endpoint)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(endpoint = %config.endpoint, "transport did not open before the handshake deadline");
                return Err(ConnectError::HandshakeTimeout(config.handshake_timeout));
            }
        };

        let hello = MessageBuilder::client_hello(ClientHello {
            client_id,
            display_name: config.display_name.clone(),
            auth_token: config.auth_token.clone(),
            requested_room: config.room_id.clone(),
        });
        link.sender
            .send(Frame::from_message(&hello)?)
            .map_err(|_| TransportError::ConnectionClosed)?;

        let (ack, server_hello) =
            match timeout_at(deadline, await_server_hello(&mut link.events)).await {
                Ok(result) => result?,
                Err(_) => {
                    let _ = link.sender.send(Frame::Close(CloseReason::new(
                        CLOSE_PROTOCOL_ERROR,
                        "handshake timeout",
                    )));
                    return Err(ConnectError::HandshakeTimeout(config.handshake_timeout));
                }
            };

        if !server_hello.room_id.is_empty() && server_hello.room_id != config.room_id {
            let _ = link.sender.send(Frame::Close(CloseReason::new(
                CLOSE_PROTOCOL_ERROR,
                "room mismatch",
            )));
            return Err(ConnectError::RoomMismatch {
                requested: config.room_id,
                assigned: server_hello.room_id,
            });
        }

        self.on_open(epoch, link, &ack, &server_hello, &config)
    }

    fn on_open(
        self: &Arc<Self>,
        epoch: u64,
        link: Link,
        ack: &Message,
        server_hello: &ServerHello,
        config: &ClientConfig,
    ) -> Result<(), ConnectError> {
        let Link { sender, events } = link;
        {
            let mut core = self.core();
            if core.epoch != epoch {
                let _ = sender.send(Frame::Close(CloseReason::normal()));
                return Err(ConnectError::Cancelled);
            }
            if core.session.reassign(&server_hello.assigned_client_id) {
                info!(client_id = %core.session.client_id, "client id assigned by server");
            }
            core.session.reconnect_attempts = 0;
            core.cancel = None;
            core.outbound = Some(sender.clone());
            core.tasks.keepalive = Some(tokio::spawn(keepalive(sender, config.keepalive_interval)));
            self.set_state(ConnectionState::Open);
            info!(
                client_id = %core.session.client_id,
                room_id = %config.room_id,
                server_version = %server_hello.server_version,
                "connected"
            );
        }

        self.handlers.dispatch(ack);

        // Handlers may have disconnected.
        let mut core = self.core();
        if core.epoch == epoch {
            core.tasks.reader = Some(tokio::spawn(read_loop(Arc::downgrade(self), epoch, events)));
        }
        Ok(())
    }

    fn on_connect_failed(&self, epoch: u64, error: &ConnectError) {
        let mut core = self.core();
        if core.epoch != epoch {
            return;
        }
        core.cancel = None;
        core.outbound = None;
        core.tasks.abort_all();
        self.set_state(ConnectionState::Closed);
        warn!(error = %error, "connect failed");
    }

    fn handle_inbound(&self, message: Message) {
        if let Payload::ServerHello(hello) = &message.payload {
            if self.core().session.reassign(&hello.assigned_client_id) {
                info!(client_id = %hello.assigned_client_id, "client id reassigned by server");
            }
        }
        self.handlers.dispatch(&message);
    }

    fn on_link_closed(self: &Arc<Self>, epoch: u64, reason: CloseReason) {
        let mut core = self.core();
        if core.epoch != epoch {
            return;
        }
        core.outbound = None;
        if let Some(keepalive) = core.tasks.keepalive.take() {
            keepalive.abort();
        }
        // The caller is the reader itself.
        core.tasks.reader = None;
        self.set_state(ConnectionState::Closed);
        info!(code = reason.code, reason = %reason.reason, "connection closed by peer");
        self.retry_or_fail(&mut core, None);
    }

    fn retry_or_fail(self: &Arc<Self>, core: &mut Core, last_error: Option<&ConnectError>) {
        let max_attempts = core.config.as_ref().map_or(0, |c| c.max_reconnect_attempts);
        let attempts = core.session.reconnect_attempts;
        let fatal = last_error.is_some_and(|e| !e.is_retryable());
        if fatal || attempts >= max_attempts {
            self.set_state(ConnectionState::Failed);
            error!(attempts, max_attempts, fatal, "giving up on reconnection");
            return;
        }
        self.schedule_reconnect(core);
    }

    fn schedule_reconnect(self: &Arc<Self>, core: &mut Core) {
        core.session.reconnect_attempts += 1;
        let attempt = core.session.reconnect_attempts;
        let delay = core
            .config
            .as_ref()
            .map_or(Duration::ZERO, |c| c.reconnect_delay(attempt));
        core.epoch += 1;
        let epoch = core.epoch;
        self.set_state(ConnectionState::Reconnecting);
        info!(attempt, delay_ms = delay.as_millis() as u64, "scheduling reconnect");

        let manager = Arc::downgrade(self);
        core.tasks.reconnect = Some(tokio::spawn(async move {
            sleep(delay).await;
            if let Some(inner) = manager.upgrade() {
                inner.reconnect(epoch).await;
            }
        }));
    }

    async fn reconnect(self: &Arc<Self>, epoch: u64) {
        let attempt = {
            let core = self.core();
            if core.epoch != epoch {
                return;
            }
            self.set_state(ConnectionState::Connecting);
            core.session.reconnect_attempts
        };

        match self.handshake(epoch).await {
            Ok(()) => info!(attempt, "reconnected"),
            Err(e) => {
                let mut core = self.core();
                if core.epoch != epoch {
                    return;
                }
                warn!(attempt, error = %e, "reconnect attempt failed");
                self.set_state(ConnectionState::Closed);
                self.retry_or_fail(&mut core, Some(&e));
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let core = self.core.get_mut().unwrap_or_else(PoisonError::into_inner);
        core.tasks.abort_all();
        if let Some(sender) = core.outbound.take() {
            let _ = sender.send(Frame::Close(CloseReason::normal()));
        }
    }
}

async fn await_server_hello(
    events: &mut mpsc::UnboundedReceiver<TransportEvent>,
) -> Result<(Message, ServerHello), ConnectError> {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Frame(Frame::Close(reason)) | TransportEvent::Closed(reason) => {
                return Err(ConnectError::HandshakeFailed(format!(
                    "closed during handshake ({}): {}",
                    reason.code, reason.reason
                )));
            }
            TransportEvent::Frame(frame) => {
                let Some(bytes) = frame.payload() else {
                    continue;
                };
                match decode(bytes) {
                    Ok(message) => {
                        if let Payload::ServerHello(hello) = &message.payload {
                            let hello = hello.clone();
                            return Ok((message, hello));
                        }
                        debug!(message_type = %message.message_type(), "ignoring message before handshake");
                    }
                    Err(e) => warn!(error = %e, "dropping undecodable frame during handshake"),
                }
            }
            TransportEvent::Error(e) if e.is_fatal() => return Err(e.into()),
            TransportEvent::Error(e) => warn!(error = %e, "transport error during handshake"),
        }
    }
    Err(ConnectError::HandshakeFailed("link closed during handshake".into()))
}

async fn keepalive(sender: mpsc::UnboundedSender<Frame>, every: Duration) {
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let frame = match Frame::from_message(&MessageBuilder::ping()) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "could not encode keepalive ping");
                continue;
            }
        };
        if sender.send(frame).is_err() {
            break;
        }
        debug!("keepalive ping sent");
    }
}

async fn read_loop(
    manager: Weak<Inner>,
    epoch: u64,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    // Binary frames are a byte stream: one frame may hold several messages
    // and one message may span frames.
    let mut pending = FrameBuffer::new();
    let reason = loop {
        let Some(event) = events.recv().await else {
            break CloseReason::abnormal();
        };
        let Some(inner) = manager.upgrade() else {
            return;
        };
        match event {
            TransportEvent::Frame(Frame::Close(reason)) | TransportEvent::Closed(reason) => break reason,
            TransportEvent::Frame(Frame::Text(text)) => match decode(text.as_bytes()) {
                Ok(message) => inner.handle_inbound(message),
                Err(e) => warn!(error = %e, len = text.len(), "dropping undecodable text frame"),
            },
            TransportEvent::Frame(Frame::Binary(bytes)) => {
                pending.push(&bytes);
                loop {
                    match pending.next_message() {
                        Ok(Some(message)) => inner.handle_inbound(message),
                        Ok(None) => break,
                        Err(e) => warn!(error = %e, buffered = pending.len(), "dropping undecodable frame"),
                    }
                }
            }
            TransportEvent::Error(e) => warn!(error = %e, "transport error"),
        }
    };
    if let Some(inner) = manager.upgrade() {
        inner.on_link_closed(epoch, reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ConnectFuture, MemoryConnector, MemoryListener, ServerEnd};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(client_id: &str) -> ClientConfig {
        ClientConfig::builder("mem://hub")
            .room("lobby")
            .client_id(client_id)
            .display_name("Ada")
            .build()
    }

    /// Accept one link, read the hello, answer with a server hello.
    async fn serve_hello(
        listener: &mut MemoryListener,
        assigned: &str,
        room: Option<&str>,
    ) -> (ServerEnd, ClientHello) {
        let mut server = listener.accept().await.expect("link opened");
        let message = server
            .recv_message()
            .await
            .expect("hello sent")
            .expect("hello decodes");
        let Payload::ClientHello(hello) = message.payload else {
            panic!("expected a client hello first");
        };
        let ack = MessageBuilder::create(Payload::ServerHello(ServerHello {
            server_version: "1.0.0".into(),
            assigned_client_id: assigned.into(),
            room_id: room.map_or_else(|| hello.requested_room.clone(), str::to_string),
            initial_state: None,
        }));
        server.send_message(&ack).unwrap();
        (server, hello)
    }

    async fn open(
        manager: &ConnectionManager,
        listener: &mut MemoryListener,
        cfg: ClientConfig,
        assigned: &str,
    ) -> ServerEnd {
        let (result, (server, _)) =
            tokio::join!(manager.connect(cfg), serve_hello(listener, assigned, None));
        result.unwrap();
        server
    }

    async fn next_message(server: &mut ServerEnd) -> Message {
        server.recv_message().await.expect("message").expect("decodes")
    }

    #[tokio::test]
    async fn test_connect_adopts_assigned_client_id() {
        let (connector, mut listener) = MemoryConnector::pair();
        let manager = ConnectionManager::new(connector);
        let acks = Arc::new(AtomicUsize::new(0));
        let acks_in = Arc::clone(&acks);
        let _sub = manager.on(MessageType::ServerHello, move |_| {
            acks_in.fetch_add(1, Ordering::SeqCst);
        });

        let (result, (mut server, hello)) = tokio::join!(
            manager.connect(config("temp-123")),
            serve_hello(&mut listener, "srv-456", None)
        );
        result.unwrap();

        assert_eq!(hello.client_id, "temp-123");
        assert_eq!(hello.requested_room, "lobby");
        assert_eq!(hello.display_name, "Ada");
        assert_eq!(manager.client_id(), "srv-456");
        assert!(manager.is_connected());
        assert_eq!(acks.load(Ordering::SeqCst), 1);

        manager.send_chat_message("hi", ChatKind::Normal);
        match next_message(&mut server).await.payload {
            Payload::ChatMessage(chat) => {
                assert_eq!(chat.from_client_id, "srv-456");
                assert_eq!(chat.message, "hi");
            }
            other => panic!("unexpected payload {other:?}"),
        }

        manager.send_object_grab("cube", Hand::Right);
        match next_message(&mut server).await.payload {
            Payload::ObjectGrab(grab) => assert_eq!(grab.client_id, "srv-456"),
            other => panic!("unexpected payload {other:?}"),
        }

        manager.send_entity_spawn("e1", "avatar", Components::new());
        match next_message(&mut server).await.payload {
            Payload::EntitySpawn(spawn) => assert_eq!(spawn.owner_id, "srv-456"),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_position_updates_are_sequenced_per_entity() {
        let (connector, mut listener) = MemoryConnector::pair();
        let manager = ConnectionManager::new(connector);
        let mut server = open(&manager, &mut listener, config("c1"), "").await;

        for _ in 0..2 {
            manager.send_position_update("e1", Vec3::new(1.0, 0.0, 0.0), Quat::IDENTITY);
        }
        manager.send_position_update("e2", Vec3::ZERO, Quat::IDENTITY);

        let mut seen = Vec::new();
        for _ in 0..3 {
            if let Payload::PositionUpdate(update) = next_message(&mut server).await.payload {
                seen.push((update.entity_id, update.sequence_number));
            }
        }
        assert_eq!(
            seen,
            vec![("e1".to_string(), 0), ("e1".to_string(), 1), ("e2".to_string(), 0)]
        );
        // Empty assignment keeps the requested id.
        assert_eq!(manager.client_id(), "c1");

        // A despawned id starts a fresh sequence.
        manager.send_entity_despawn("e1");
        manager.send_position_update("e1", Vec3::ZERO, Quat::IDENTITY);
        assert_eq!(next_message(&mut server).await.message_type(), MessageType::EntityDespawn);
        match next_message(&mut server).await.payload {
            Payload::PositionUpdate(update) => assert_eq!(update.sequence_number, 0),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_timeout() {
        let (connector, mut listener) = MemoryConnector::pair();
        let manager = ConnectionManager::new(connector);
        let cfg = ClientConfig {
            handshake_timeout: Duration::from_secs(5),
            ..config("c1")
        };

        let (result, server) = tokio::join!(manager.connect(cfg), listener.accept());
        assert!(matches!(result, Err(ConnectError::HandshakeTimeout(d)) if d == Duration::from_secs(5)));
        assert_eq!(manager.state(), ConnectionState::Closed);

        let mut server = server.unwrap();
        let _hello = server.recv().await;
        match server.recv().await {
            Some(Frame::Close(reason)) => assert_eq!(reason.code, CLOSE_PROTOCOL_ERROR),
            other => panic!("expected close, got {other:?}"),
        }
    }

    struct StalledConnector;

    impl Connector for StalledConnector {
        fn connect(&self, _endpoint: &str) -> ConnectFuture<'_> {
            Box::pin(std::future::pending())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_open_counts_against_handshake_timeout() {
        let manager = ConnectionManager::new(StalledConnector);
        let cfg = ClientConfig {
            handshake_timeout: Duration::from_secs(5),
            ..config("c1")
        };

        let started = Instant::now();
        let result = manager.connect(cfg).await;
        assert!(matches!(result, Err(ConnectError::HandshakeTimeout(d)) if d == Duration::from_secs(5)));
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(manager.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_connect_leaves_manager_reusable() {
        let (connector, mut listener) = MemoryConnector::pair();
        let manager = ConnectionManager::new(connector.clone());

        let (abandoned, first_link) = tokio::join!(
            tokio::time::timeout(Duration::from_millis(100), manager.connect(config("c1"))),
            listener.accept()
        );
        assert!(abandoned.is_err());
        assert_eq!(manager.state(), ConnectionState::Closed);
        drop(first_link);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(manager.state(), ConnectionState::Closed);

        let (result, _server) = tokio::join!(
            manager.connect(config("c1")),
            serve_hello(&mut listener, "", None)
        );
        result.unwrap();
        assert!(manager.is_connected());
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_connect_joins_attempt() {
        let (connector, mut listener) = MemoryConnector::pair();
        let manager = ConnectionManager::new(connector.clone());

        let (first, second, _served) = tokio::join!(
            manager.connect(config("c1")),
            manager.connect(config("c2")),
            serve_hello(&mut listener, "", None)
        );
        first.unwrap();
        second.unwrap();
        assert_eq!(connector.attempts(), 1);
        assert_eq!(manager.client_id(), "c1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_connect_reports_failed_attempt() {
        let (connector, mut listener) = MemoryConnector::pair();
        let manager = ConnectionManager::new(connector.clone());
        let cfg = ClientConfig {
            handshake_timeout: Duration::from_secs(5),
            ..config("c1")
        };

        let (first, second, _link) = tokio::join!(
            manager.connect(cfg.clone()),
            manager.connect(cfg),
            listener.accept()
        );
        assert!(matches!(first, Err(ConnectError::HandshakeTimeout(_))));
        assert!(matches!(second, Err(ConnectError::HandshakeFailed(_))));
        assert_eq!(connector.attempts(), 1);
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_room_mismatch_rejected() {
        let (connector, mut listener) = MemoryConnector::pair();
        let manager = ConnectionManager::new(connector);
        let (result, _) = tokio::join!(
            manager.connect(config("c1")),
            serve_hello(&mut listener, "c1", Some("elsewhere"))
        );
        assert!(matches!(
            result,
            Err(ConnectError::RoomMismatch { ref assigned, .. }) if assigned == "elsewhere"
        ));
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_transport_failure_rejects_connect() {
        let (connector, _listener) = MemoryConnector::pair();
        connector.set_refusing(true);
        let manager = ConnectionManager::new(connector);
        let result = manager.connect(config("c1")).await;
        assert!(matches!(result, Err(ConnectError::Transport(TransportError::Refused(_)))));
        assert_eq!(manager.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_connect_is_noop_while_open() {
        let (connector, mut listener) = MemoryConnector::pair();
        let manager = ConnectionManager::new(connector.clone());
        let _server = open(&manager, &mut listener, config("c1"), "").await;

        manager.connect(config("c2")).await.unwrap();
        assert_eq!(connector.attempts(), 1);
        assert_eq!(manager.client_id(), "c1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_sends_normal_close_and_stays_closed() {
        let (connector, mut listener) = MemoryConnector::pair();
        let manager = ConnectionManager::new(connector.clone());
        let mut server = open(&manager, &mut listener, config("c1"), "").await;

        manager.disconnect();
        match server.recv().await {
            Some(Frame::Close(reason)) => assert_eq!(reason.code, 1000),
            other => panic!("expected close, got {other:?}"),
        }
        manager.disconnect();
        assert_eq!(manager.state(), ConnectionState::Closed);

        sleep(Duration::from_secs(120)).await;
        assert_eq!(connector.attempts(), 1);
        assert_eq!(manager.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_disconnect_cancels_pending_connect() {
        let (connector, mut listener) = MemoryConnector::pair();
        let manager = ConnectionManager::new(connector);
        let pending = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.connect(config("c1")).await })
        };
        let _server = listener.accept().await.unwrap();

        manager.disconnect();
        let result = pending.await.unwrap();
        assert!(matches!(result, Err(ConnectError::Cancelled)));
        assert_eq!(manager.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_send_before_connect_is_noop() {
        let (connector, _listener) = MemoryConnector::pair();
        let manager = ConnectionManager::new(connector);
        manager.send(MessageBuilder::ping());
        manager.send_chat_message("nobody hears this", ChatKind::Shout);
        let stats = manager.stats();
        assert_eq!(stats.state, ConnectionState::Idle);
        assert_eq!(stats.reconnect_attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_pings() {
        let (connector, mut listener) = MemoryConnector::pair();
        let manager = ConnectionManager::new(connector);
        let mut server = open(&manager, &mut listener, config("c1"), "").await;

        let started = Instant::now();
        let ping = next_message(&mut server).await;
        assert_eq!(ping.message_type(), MessageType::Ping);
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_bad_frame_and_panicking_handler_keep_session() {
        let (connector, mut listener) = MemoryConnector::pair();
        let manager = ConnectionManager::new(connector);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _bad = manager.on(MessageType::ChatMessage, |_| panic!("handler bug"));
        let _good = manager.on(MessageType::ChatMessage, move |msg| {
            let _ = tx.send(msg.clone());
        });
        let server = open(&manager, &mut listener, config("c1"), "").await;

        server
            .send(Frame::Binary(vec![0xB7, 0x01, 99, 0, 0, 0, 0, 0]))
            .unwrap();
        let chat = MessageBuilder::chat_message("c2", "still here", ChatKind::Normal);
        server.send_message(&chat).unwrap();

        assert_eq!(rx.recv().await, Some(chat));
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_binary_frames_are_reassembled() {
        let (connector, mut listener) = MemoryConnector::pair();
        let manager = ConnectionManager::new(connector);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = manager.on(MessageType::ChatMessage, move |msg| {
            let _ = tx.send(msg.clone());
        });
        let server = open(&manager, &mut listener, config("c1"), "").await;

        let first = MessageBuilder::chat_message("c2", "split across frames", ChatKind::Normal);
        let second = MessageBuilder::chat_message("c2", "packed", ChatKind::Normal);
        let third = MessageBuilder::chat_message("c2", "together", ChatKind::Normal);

        let bytes = crate::codec::encode(&first).unwrap();
        let (head, tail) = bytes.split_at(5);
        server.send(Frame::Binary(head.to_vec())).unwrap();
        server.send(Frame::Binary(tail.to_vec())).unwrap();

        let mut packed = crate::codec::encode(&second).unwrap();
        packed.extend(crate::codec::encode(&third).unwrap());
        server.send(Frame::Binary(packed)).unwrap();

        assert_eq!(rx.recv().await, Some(first));
        assert_eq!(rx.recv().await, Some(second));
        assert_eq!(rx.recv().await, Some(third));
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let (connector, _listener) = MemoryConnector::pair();
        let manager = ConnectionManager::new(connector);
        let sub = manager.on(MessageType::Ping, |_| {});
        assert_eq!(sub.message_type(), MessageType::Ping);
        assert_eq!(manager.handler_count(MessageType::Ping), 1);
        sub.unsubscribe();
        assert_eq!(manager.handler_count(MessageType::Ping), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_reuses_assigned_id() {
        let (connector, mut listener) = MemoryConnector::pair();
        let manager = ConnectionManager::new(connector);
        let server = open(&manager, &mut listener, config("temp-123"), "srv-456").await;

        drop(server);
        let (_server, hello) = serve_hello(&mut listener, "", None).await;
        assert_eq!(hello.client_id, "srv-456");

        let mut state = manager.watch_state();
        state
            .wait_for(|s| *s == ConnectionState::Open)
            .await
            .unwrap();
        assert_eq!(manager.stats().reconnect_attempts, 0);
        assert_eq!(manager.client_id(), "srv-456");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_gives_up_after_cap() {
        let (connector, mut listener) = MemoryConnector::pair();
        let manager = ConnectionManager::new(connector.clone());
        let cfg = ClientConfig {
            max_reconnect_attempts: 3,
            ..config("c1")
        };
        let server = open(&manager, &mut listener, cfg, "").await;

        connector.set_refusing(true);
        let started = Instant::now();
        drop(server);

        let mut state = manager.watch_state();
        state
            .wait_for(|s| *s == ConnectionState::Failed)
            .await
            .unwrap();
        assert_eq!(connector.attempts(), 1 + 3);
        assert_eq!(manager.stats().reconnect_attempts, 3);
        // 1 s + 2 s + 4 s of backoff.
        assert!(started.elapsed() >= Duration::from_secs(7));

        // Failed is terminal until the caller connects again.
        sleep(Duration::from_secs(600)).await;
        assert_eq!(connector.attempts(), 4);

        connector.set_refusing(false);
        let (result, _) = tokio::join!(
            manager.connect(config("c1")),
            serve_hello(&mut listener, "", None)
        );
        result.unwrap();
        assert!(manager.is_connected());
    }
}
