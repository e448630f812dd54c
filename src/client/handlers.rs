//! Typed handler registry.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::error;

use crate::codec::{Message, MessageType};

pub(crate) type Handler = Arc<dyn Fn(&Message) + Send + Sync>;

#[derive(Default)]
pub(crate) struct HandlerRegistry {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<MessageType, Vec<(u64, Handler)>>>,
}

impl HandlerRegistry {
    fn table(&self) -> MutexGuard<'_, HashMap<MessageType, Vec<(u64, Handler)>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(self: &Arc<Self>, message_type: MessageType, handler: Handler) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.table().entry(message_type).or_default().push((id, handler));
        Subscription {
            registry: Arc::downgrade(self),
            message_type,
            id,
        }
    }

    fn remove(&self, message_type: MessageType, id: u64) {
        let mut table = self.table();
        if let Some(list) = table.get_mut(&message_type) {
            list.retain(|(existing, _)| *existing != id);
            if list.is_empty() {
                table.remove(&message_type);
            }
        }
    }

    pub(crate) fn count(&self, message_type: MessageType) -> usize {
        self.table().get(&message_type).map_or(0, Vec::len)
    }

    /// Deliver `message` to every handler for its type, in registration order.
    ///
    /// The table lock is released before any handler runs, so handlers may
    /// register or unsubscribe. A panicking handler is logged and skipped.
    /// Returns the number of handlers that completed.
    pub(crate) fn dispatch(&self, message: &Message) -> usize {
        let message_type = message.message_type();
        let snapshot: Vec<Handler> = match self.table().get(&message_type) {
            Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(message))) {
                Ok(()) => delivered += 1,
                Err(_) => error!(
                    message_type = %message_type,
                    message_id = %message.message_id,
                    "message handler panicked"
                ),
            }
        }
        delivered
    }
}

/// Registration handle returned by `ConnectionManager::on`.
///
/// Dropping it keeps the handler registered; call [`Subscription::unsubscribe`]
/// to remove it.
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<HandlerRegistry>,
    message_type: MessageType,
    id: u64,
}

impl Subscription {
    /// Message type this handler receives.
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Remove the handler.
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.message_type, self.id);
        }
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table();
        f.debug_struct("HandlerRegistry")
            .field("types", &table.len())
            .finish()
    }
}
