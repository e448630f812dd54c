//! Glue between a [`SyncEngine`] and a [`ConnectionManager`].
//!
//! The engine is shared as [`SharedEngine`]: inbound handlers run on the
//! connection's reader task, the tick loop on its own task, and the renderer
//! wherever the application calls [`SyncEngine::apply_interpolation`]. The
//! lock is never held across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, trace};

use super::directory::DirectoryError;
use super::engine::SyncEngine;
use super::host::EntityHost;
use crate::client::{ConnectionManager, Subscription};
use crate::codec::{Components, MessageType};
use crate::core::{Transform, now_millis};

/// Engine shared between handlers, the tick loop and the renderer.
pub type SharedEngine<H> = Arc<Mutex<SyncEngine<H>>>;

/// Message types the engine consumes.
const SYNC_MESSAGE_TYPES: [MessageType; 5] = [
    MessageType::ServerHello,
    MessageType::EntitySpawn,
    MessageType::EntityUpdate,
    MessageType::EntityDespawn,
    MessageType::PositionUpdate,
];

/// Wrap an engine for sharing.
pub fn shared<H: EntityHost>(engine: SyncEngine<H>) -> SharedEngine<H> {
    Arc::new(Mutex::new(engine))
}

/// Lock the engine, recovering from a poisoned lock.
pub fn lock<H: EntityHost>(engine: &Mutex<SyncEngine<H>>) -> MutexGuard<'_, SyncEngine<H>> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Route sync messages from `connection` into `engine`.
///
/// Also adopts the connection's current client id. Dropping the returned
/// subscriptions does not detach; call [`Subscription::unsubscribe`].
pub fn attach<H>(engine: &SharedEngine<H>, connection: &ConnectionManager) -> Vec<Subscription>
where
    H: EntityHost + Send + 'static,
    H::Handle: Send,
{
    lock(engine).set_local_client_id(&connection.client_id());

    SYNC_MESSAGE_TYPES
        .iter()
        .map(|&message_type| {
            let engine = Arc::clone(engine);
            connection.on(message_type, move |message| {
                let outcome = lock(&engine).handle_message(message, now_millis());
                trace!(message_type = %message_type, ?outcome, "sync message handled");
            })
        })
        .collect()
}

/// Run the outbound tick at the engine's configured rate.
///
/// Each tick sends a position update for every owned entity that is due.
/// Ticks are skipped while the connection is not open so throttling state
/// is not consumed by sends that would be dropped.
pub fn spawn_tick_loop<H>(engine: SharedEngine<H>, connection: ConnectionManager) -> JoinHandle<()>
where
    H: EntityHost + Send + 'static,
    H::Handle: Send,
{
    let period = lock(&engine).config().tick_interval();
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if !connection.is_connected() {
                continue;
            }
            let updates = lock(&engine).tick(now_millis());
            for update in updates {
                connection.send_position_update(
                    &update.entity_id,
                    update.transform.position,
                    update.transform.rotation,
                );
            }
        }
    })
}

/// Spawn an owned entity locally and announce it.
pub fn spawn_networked<H: EntityHost>(
    engine: &SharedEngine<H>,
    connection: &ConnectionManager,
    entity_id: &str,
    template_id: &str,
    components: Components,
    transform: Transform,
) -> Result<(), DirectoryError> {
    let spawn = lock(engine).spawn_local(entity_id, template_id, components, transform)?;
    connection.send_entity_spawn(&spawn.entity_id, &spawn.template_id, spawn.components);
    Ok(())
}

/// Despawn an owned entity locally and announce it.
///
/// Returns `false` if the entity is unknown or not owned by this client.
pub fn despawn_networked<H: EntityHost>(
    engine: &SharedEngine<H>,
    connection: &ConnectionManager,
    entity_id: &str,
) -> bool {
    let Some(despawn) = lock(engine).despawn_local(entity_id, now_millis()) else {
        return false;
    };
    connection.send_entity_despawn(&despawn.entity_id);
    debug!(entity_id = %entity_id, "despawn announced");
    true
}
