//! Sync engine
//!
//! Mirrors networked entities into a local [`EntityHost`]. Inbound messages
//! create, update and destroy remote entities and feed their interpolation
//! buffers. The outbound tick samples entities this client owns and reports
//! which transforms are due.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::config::SyncConfig;
use super::directory::{DirectoryError, EntityDirectory};
use super::host::EntityHost;
use super::interpolation::InterpolationBuffer;
use crate::codec::{
    Components, EntityDespawn, EntitySpawn, EntityUpdate, Message, Payload, PositionUpdate,
    ServerHello,
};
use crate::core::Transform;

/// Result of handling one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A new entity was created.
    Spawned,
    /// Components were applied to a known entity.
    Updated,
    /// A known entity was destroyed.
    Despawned,
    /// A remote transform was queued for interpolation.
    Buffered,
    /// A server hello was applied.
    Snapshot {
        /// Snapshot entities actually created.
        spawned: usize,
    },
    /// Spawn for an id that is already registered.
    Duplicate,
    /// Spawn for an id despawned within the grace period.
    Tombstoned,
    /// The message names an entity we don't know.
    UnknownEntity,
    /// Position update for an entity this client owns.
    OwnedLocally,
    /// The host returned a handle that is already bound.
    Rejected,
    /// Not a sync message.
    Unhandled,
}

impl SyncOutcome {
    /// Whether the message changed local state.
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            SyncOutcome::Spawned
                | SyncOutcome::Updated
                | SyncOutcome::Despawned
                | SyncOutcome::Buffered
                | SyncOutcome::Snapshot { .. }
        )
    }
}

/// A transform due to be sent for an owned entity.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundUpdate {
    /// Network id.
    pub entity_id: String,
    /// Sampled transform.
    pub transform: Transform,
}

/// Entity synchronization engine
///
/// Owns the [`EntityDirectory`] and one [`InterpolationBuffer`] per remote
/// entity. Despawned ids are tombstoned for
/// [`SyncConfig::despawn_grace_ms`] so a spawn that arrives late cannot
/// resurrect them.
///
/// The engine is synchronous and clock-agnostic: callers pass `now_ms`.
pub struct SyncEngine<H: EntityHost> {
    host: H,
    directory: EntityDirectory<H::Handle>,
    buffers: HashMap<String, InterpolationBuffer>,
    /// Despawned id -> time (ms) its tombstone expires.
    tombstones: HashMap<String, u64>,
    local_client_id: String,
    config: SyncConfig,
}

impl<H: EntityHost> SyncEngine<H> {
    /// Create an engine with the default configuration.
    pub fn new(host: H, local_client_id: impl Into<String>) -> Self {
        Self::with_config(host, local_client_id, SyncConfig::default())
    }

    /// Create an engine with an explicit configuration.
    pub fn with_config(host: H, local_client_id: impl Into<String>, config: SyncConfig) -> Self {
        Self {
            host,
            directory: EntityDirectory::new(config.sync_interval_ms),
            buffers: HashMap::new(),
            tombstones: HashMap::new(),
            local_client_id: local_client_id.into(),
            config,
        }
    }

    /// The local world.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable access to the local world.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// The entity directory.
    pub fn directory(&self) -> &EntityDirectory<H::Handle> {
        &self.directory
    }

    /// Engine configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Client id used for ownership decisions.
    pub fn local_client_id(&self) -> &str {
        &self.local_client_id
    }

    /// Replace the local client id. Empty ids are ignored.
    ///
    /// Ownership of already registered entities is not re-evaluated.
    pub fn set_local_client_id(&mut self, client_id: &str) {
        if client_id.is_empty() || client_id == self.local_client_id {
            return;
        }
        debug!(from = %self.local_client_id, to = %client_id, "local client id changed");
        self.local_client_id = client_id.to_string();
    }

    /// Override how often transforms are sent for one entity.
    ///
    /// Returns `false` if the entity is not registered.
    pub fn set_sync_interval(&mut self, entity_id: &str, interval: Duration) -> bool {
        self.directory
            .set_sync_interval(entity_id, interval.as_millis() as u64)
    }

    /// Handle one inbound message.
    pub fn handle_message(&mut self, message: &Message, now_ms: u64) -> SyncOutcome {
        self.expire_tombstones(now_ms);
        match &message.payload {
            Payload::EntitySpawn(spawn) => self.apply_spawn(spawn, None),
            Payload::EntityUpdate(update) => self.apply_update(update),
            Payload::EntityDespawn(despawn) => self.apply_despawn(&despawn.entity_id, now_ms),
            Payload::PositionUpdate(update) => self.apply_position(update),
            Payload::ServerHello(hello) => self.apply_server_hello(hello),
            _ => SyncOutcome::Unhandled,
        }
    }

    /// Transforms due for owned entities at `now_ms`.
    ///
    /// An entity is due when `now_ms - last_sync_time >= sync_interval_ms`.
    /// Emitting stamps its `last_sync_time`.
    pub fn tick(&mut self, now_ms: u64) -> Vec<OutboundUpdate> {
        let mut updates = Vec::new();
        for record in self.directory.owned_mut() {
            if now_ms.saturating_sub(record.last_sync_time) < record.sync_interval_ms {
                continue;
            }
            let Some(transform) = self.host.transform(record.local_handle) else {
                continue;
            };
            record.last_sync_time = now_ms;
            updates.push(OutboundUpdate {
                entity_id: record.network_id.clone(),
                transform,
            });
        }
        updates
    }

    /// Interpolated transform of a remote entity at `render_time`.
    pub fn interpolated_transform(&self, entity_id: &str, render_time: u64) -> Option<Transform> {
        self.buffers.get(entity_id)?.sample_at(render_time)
    }

    /// Write interpolated transforms for every remote entity into the host.
    ///
    /// Samples at `now_ms - render_delay_ms`. Returns how many entities moved.
    pub fn apply_interpolation(&mut self, now_ms: u64) -> usize {
        let render_time = now_ms.saturating_sub(self.config.render_delay_ms);
        let mut applied = 0;
        for record in self.directory.iter().filter(|r| !r.is_owner) {
            let Some(transform) = self
                .buffers
                .get(&record.network_id)
                .and_then(|b| b.sample_at(render_time))
            else {
                continue;
            };
            self.host.set_transform(record.local_handle, transform);
            applied += 1;
        }
        applied
    }

    /// Create an entity owned by this client.
    ///
    /// Returns the spawn payload to broadcast. Clears any tombstone on the id.
    pub fn spawn_local(
        &mut self,
        entity_id: impl Into<String>,
        template_id: impl Into<String>,
        components: Components,
        transform: Transform,
    ) -> Result<EntitySpawn, DirectoryError> {
        let entity_id = entity_id.into();
        if self.directory.contains(&entity_id) {
            return Err(DirectoryError::DuplicateNetworkId(entity_id));
        }

        let spawn = EntitySpawn {
            entity_id,
            template_id: template_id.into(),
            owner_id: self.local_client_id.clone(),
            components,
        };
        let handle = self.host.create_entity(&spawn);
        if let Err(error) = self.directory.register(spawn.entity_id.clone(), handle, true) {
            self.host.destroy_entity(handle);
            return Err(error);
        }
        self.tombstones.remove(&spawn.entity_id);
        self.host.apply_components(handle, &spawn.components);
        self.host.set_transform(handle, transform);

        debug!(entity_id = %spawn.entity_id, template = %spawn.template_id, "local entity spawned");
        Ok(spawn)
    }

    /// Destroy an entity owned by this client.
    ///
    /// Returns the despawn payload to broadcast, or `None` if the entity is
    /// unknown or owned by someone else.
    pub fn despawn_local(&mut self, entity_id: &str, now_ms: u64) -> Option<EntityDespawn> {
        match self.directory.record(entity_id) {
            Some(record) if record.is_owner => {}
            Some(_) => {
                warn!(entity_id = %entity_id, "refusing to despawn an entity owned by another client");
                return None;
            }
            None => return None,
        }
        self.apply_despawn(entity_id, now_ms);
        Some(EntityDespawn {
            entity_id: entity_id.to_string(),
        })
    }

    /// Whether `entity_id` is tombstoned at `now_ms`.
    pub fn is_tombstoned(&self, entity_id: &str, now_ms: u64) -> bool {
        self.tombstones
            .get(entity_id)
            .is_some_and(|&expires| expires > now_ms)
    }

    fn expire_tombstones(&mut self, now_ms: u64) {
        self.tombstones.retain(|_, expires| *expires > now_ms);
    }

    fn apply_spawn(&mut self, spawn: &EntitySpawn, transform: Option<Transform>) -> SyncOutcome {
        if self.directory.contains(&spawn.entity_id) {
            debug!(entity_id = %spawn.entity_id, "spawn for known entity ignored");
            return SyncOutcome::Duplicate;
        }
        if self.tombstones.contains_key(&spawn.entity_id) {
            debug!(entity_id = %spawn.entity_id, "spawn for recently despawned entity ignored");
            return SyncOutcome::Tombstoned;
        }

        let is_owner = !self.local_client_id.is_empty() && spawn.owner_id == self.local_client_id;
        let handle = self.host.create_entity(spawn);
        if let Err(error) = self
            .directory
            .register(spawn.entity_id.clone(), handle, is_owner)
        {
            warn!(entity_id = %spawn.entity_id, %error, "host handle collision, spawn dropped");
            self.host.destroy_entity(handle);
            return SyncOutcome::Rejected;
        }

        self.host.apply_components(handle, &spawn.components);
        if let Some(transform) = transform {
            self.host.set_transform(handle, transform);
        }
        debug!(
            entity_id = %spawn.entity_id,
            owner = %spawn.owner_id,
            is_owner,
            "entity spawned"
        );
        SyncOutcome::Spawned
    }

    fn apply_update(&mut self, update: &EntityUpdate) -> SyncOutcome {
        let Some(handle) = self.directory.resolve_by_network_id(&update.entity_id) else {
            debug!(entity_id = %update.entity_id, "update for unknown entity ignored");
            return SyncOutcome::UnknownEntity;
        };
        self.host.apply_components(handle, &update.components);
        SyncOutcome::Updated
    }

    fn apply_despawn(&mut self, entity_id: &str, now_ms: u64) -> SyncOutcome {
        // Tombstone even unknown ids: the despawn may have overtaken its spawn.
        self.tombstones.insert(
            entity_id.to_string(),
            now_ms.saturating_add(self.config.despawn_grace_ms),
        );
        let Some(record) = self.directory.remove(entity_id) else {
            debug!(entity_id = %entity_id, "despawn for unknown entity tombstoned");
            return SyncOutcome::UnknownEntity;
        };
        self.host.destroy_entity(record.local_handle);
        self.buffers.remove(entity_id);
        debug!(entity_id = %entity_id, "entity despawned");
        SyncOutcome::Despawned
    }

    fn apply_position(&mut self, update: &PositionUpdate) -> SyncOutcome {
        let Some(record) = self.directory.record(&update.entity_id) else {
            return SyncOutcome::UnknownEntity;
        };
        if record.is_owner {
            return SyncOutcome::OwnedLocally;
        }
        let capacity = self.config.buffer_capacity;
        self.buffers
            .entry(update.entity_id.clone())
            .or_insert_with(|| InterpolationBuffer::new(capacity))
            .push(update.timestamp, update.transform());
        SyncOutcome::Buffered
    }

    fn apply_server_hello(&mut self, hello: &ServerHello) -> SyncOutcome {
        self.set_local_client_id(&hello.assigned_client_id);
        let Some(state) = &hello.initial_state else {
            return SyncOutcome::Snapshot { spawned: 0 };
        };

        let mut spawned = 0;
        for entity in &state.entities {
            let spawn = EntitySpawn {
                entity_id: entity.id.clone(),
                template_id: entity.template_id.clone(),
                owner_id: entity.owner_id.clone(),
                components: entity.components.clone(),
            };
            let transform = Transform::new(entity.position, entity.rotation);
            if self.apply_spawn(&spawn, Some(transform)) == SyncOutcome::Spawned {
                spawned += 1;
            }
        }
        info!(spawned, total = state.entities.len(), "world snapshot applied");
        SyncOutcome::Snapshot { spawned }
    }
}

impl<H: EntityHost + std::fmt::Debug> std::fmt::Debug for SyncEngine<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("host", &self.host)
            .field("entities", &self.directory.len())
            .field("tombstones", &self.tombstones.len())
            .field("local_client_id", &self.local_client_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ChatKind, ChatMessage, EntitySnapshot, WorldState};
    use crate::core::{Quat, Vec3};
    use crate::sync::MemoryWorld;

    fn engine(local: &str) -> SyncEngine<MemoryWorld> {
        SyncEngine::new(MemoryWorld::new(), local)
    }

    fn msg(payload: Payload) -> Message {
        Message::new("m", 0, payload)
    }

    fn spawn(id: &str, owner: &str) -> Message {
        let mut components = Components::new();
        components.insert("color".into(), "red".into());
        msg(Payload::EntitySpawn(EntitySpawn {
            entity_id: id.into(),
            template_id: "ball".into(),
            owner_id: owner.into(),
            components,
        }))
    }

    fn despawn(id: &str) -> Message {
        msg(Payload::EntityDespawn(EntityDespawn {
            entity_id: id.into(),
        }))
    }

    fn position(id: &str, x: f32, timestamp: u64) -> Message {
        msg(Payload::PositionUpdate(PositionUpdate {
            entity_id: id.into(),
            position: Vec3::new(x, 0.0, 0.0),
            rotation: Quat::IDENTITY,
            sequence_number: 0,
            timestamp,
        }))
    }

    fn at(x: f32) -> Transform {
        Transform::new(Vec3::new(x, 0.0, 0.0), Quat::IDENTITY)
    }

    #[test]
    fn test_spawn_is_idempotent() {
        let mut engine = engine("alice");
        assert_eq!(engine.handle_message(&spawn("e1", "bob"), 0), SyncOutcome::Spawned);
        assert_eq!(engine.handle_message(&spawn("e1", "bob"), 0), SyncOutcome::Duplicate);

        assert_eq!(engine.host().len(), 1);
        assert_eq!(engine.directory().len(), 1);
        let handle = engine.directory().resolve_by_network_id("e1").unwrap();
        assert_eq!(engine.host().get(handle).unwrap().components["color"], "red");
    }

    #[test]
    fn test_ownership_not_overwritten() {
        let mut engine = engine("alice");
        engine.handle_message(&spawn("mine", "alice"), 0);
        engine.handle_message(&spawn("theirs", "bob"), 0);
        assert!(engine.directory().record("mine").unwrap().is_owner);
        assert!(!engine.directory().record("theirs").unwrap().is_owner);

        let handle = engine.directory().resolve_by_network_id("mine").unwrap();
        engine.host_mut().set_transform(handle, at(7.0));

        assert_eq!(
            engine.handle_message(&position("mine", 99.0, 10), 10),
            SyncOutcome::OwnedLocally
        );
        assert_eq!(engine.host().transform(handle), Some(at(7.0)));
        assert!(engine.interpolated_transform("mine", 10).is_none());

        // A second spawn claiming another owner changes nothing.
        engine.handle_message(&spawn("mine", "bob"), 20);
        assert!(engine.directory().record("mine").unwrap().is_owner);
    }

    #[test]
    fn test_unknown_entity_messages() {
        let mut engine = engine("alice");
        let update = msg(Payload::EntityUpdate(EntityUpdate {
            entity_id: "ghost".into(),
            components: Components::new(),
        }));
        assert_eq!(engine.handle_message(&update, 0), SyncOutcome::UnknownEntity);
        assert_eq!(engine.handle_message(&despawn("ghost"), 0), SyncOutcome::UnknownEntity);
        assert_eq!(
            engine.handle_message(&position("ghost", 1.0, 0), 0),
            SyncOutcome::UnknownEntity
        );
        assert!(engine.is_tombstoned("ghost", 0));
        assert!(engine.host().is_empty());
    }

    #[test]
    fn test_despawn_before_spawn_blocks_late_spawn() {
        let mut engine = engine("alice");
        assert_eq!(
            engine.handle_message(&despawn("e1"), 1_000),
            SyncOutcome::UnknownEntity
        );
        assert_eq!(
            engine.handle_message(&spawn("e1", "bob"), 1_050),
            SyncOutcome::Tombstoned
        );
        assert!(engine.host().is_empty());
        assert!(engine.directory().is_empty());

        let later = 1_000 + engine.config().despawn_grace_ms;
        assert_eq!(engine.handle_message(&spawn("e1", "bob"), later), SyncOutcome::Spawned);
    }

    /// Host that hands out the same handle every time.
    #[derive(Debug, Default)]
    struct StuckHost {
        created: usize,
        destroyed: usize,
    }

    impl EntityHost for StuckHost {
        type Handle = u64;

        fn create_entity(&mut self, _spawn: &EntitySpawn) -> u64 {
            self.created += 1;
            7
        }

        fn destroy_entity(&mut self, _handle: u64) {
            self.destroyed += 1;
        }

        fn apply_components(&mut self, _handle: u64, _components: &Components) {}

        fn transform(&self, _handle: u64) -> Option<Transform> {
            None
        }

        fn set_transform(&mut self, _handle: u64, _transform: Transform) {}
    }

    #[test]
    fn test_handle_collision_destroys_new_entity() {
        let mut engine = SyncEngine::new(StuckHost::default(), "alice");
        assert_eq!(engine.handle_message(&spawn("a", "bob"), 0), SyncOutcome::Spawned);
        assert_eq!(engine.handle_message(&spawn("b", "bob"), 0), SyncOutcome::Rejected);
        assert_eq!(engine.host().created, 2);
        assert_eq!(engine.host().destroyed, 1);
        assert!(!engine.directory().contains("b"));

        assert!(matches!(
            engine.spawn_local("c", "ball", Components::new(), at(0.0)),
            Err(DirectoryError::DuplicateHandle { .. })
        ));
        assert_eq!(engine.host().created, 3);
        assert_eq!(engine.host().destroyed, 2);
        assert_eq!(engine.directory().len(), 1);
    }

    #[test]
    fn test_update_merges_components() {
        let mut engine = engine("alice");
        engine.handle_message(&spawn("e1", "bob"), 0);

        let mut components = Components::new();
        components.insert("color".into(), "blue".into());
        let update = msg(Payload::EntityUpdate(EntityUpdate {
            entity_id: "e1".into(),
            components,
        }));
        assert_eq!(engine.handle_message(&update, 0), SyncOutcome::Updated);

        let handle = engine.directory().resolve_by_network_id("e1").unwrap();
        assert_eq!(engine.host().get(handle).unwrap().components["color"], "blue");
    }

    #[test]
    fn test_late_spawn_after_despawn_is_ignored() {
        let mut engine = engine("alice");
        engine.handle_message(&spawn("e1", "bob"), 1_000);
        assert_eq!(engine.handle_message(&despawn("e1"), 1_100), SyncOutcome::Despawned);
        assert_eq!(
            engine.handle_message(&spawn("e1", "bob"), 1_200),
            SyncOutcome::Tombstoned
        );

        assert!(engine.host().is_empty());
        assert!(engine.directory().is_empty());
        assert!(engine.is_tombstoned("e1", 1_200));

        // After the grace period the id can be reused.
        let later = 1_100 + engine.config().despawn_grace_ms;
        assert_eq!(engine.handle_message(&spawn("e1", "bob"), later), SyncOutcome::Spawned);
    }

    #[test]
    fn test_remote_positions_are_interpolated() {
        let mut engine = engine("alice");
        engine.handle_message(&spawn("e1", "bob"), 0);
        assert_eq!(engine.handle_message(&position("e1", 0.0, 0), 0), SyncOutcome::Buffered);
        assert_eq!(engine.handle_message(&position("e1", 10.0, 100), 0), SyncOutcome::Buffered);

        assert_eq!(engine.interpolated_transform("e1", 50), Some(at(5.0)));
        assert_eq!(engine.interpolated_transform("e1", 150), Some(at(10.0)));

        // Render delay of 100ms: now=150 samples t=50.
        assert_eq!(engine.apply_interpolation(150), 1);
        let handle = engine.directory().resolve_by_network_id("e1").unwrap();
        assert_eq!(engine.host().transform(handle), Some(at(5.0)));
    }

    #[test]
    fn test_buffer_capacity_from_config() {
        let config = SyncConfig::builder().buffer_capacity(4).build();
        let mut engine = SyncEngine::with_config(MemoryWorld::new(), "alice", config);
        engine.handle_message(&spawn("e1", "bob"), 0);
        for i in 0..10u64 {
            engine.handle_message(&position("e1", i as f32, i * 10), 0);
        }
        assert_eq!(engine.buffers["e1"].len(), 4);
    }

    #[test]
    fn test_server_hello_snapshot() {
        let mut engine = engine("temp-123");
        let entity = |id: &str, owner: &str, x: f32| EntitySnapshot {
            id: id.into(),
            template_id: "crate".into(),
            owner_id: owner.into(),
            position: Vec3::new(x, 1.0, 0.0),
            rotation: Quat::IDENTITY,
            components: Components::new(),
        };
        let hello = msg(Payload::ServerHello(ServerHello {
            server_version: "1.0.0".into(),
            assigned_client_id: "srv-456".into(),
            room_id: "lobby".into(),
            initial_state: Some(WorldState {
                entities: vec![entity("a", "srv-456", 1.0), entity("b", "bob", 2.0)],
                players: Vec::new(),
                last_update: 0,
            }),
        }));

        assert_eq!(
            engine.handle_message(&hello, 0),
            SyncOutcome::Snapshot { spawned: 2 }
        );
        assert_eq!(engine.local_client_id(), "srv-456");
        assert!(engine.directory().record("a").unwrap().is_owner);
        assert!(!engine.directory().record("b").unwrap().is_owner);

        let b = engine.directory().resolve_by_network_id("b").unwrap();
        assert_eq!(
            engine.host().transform(b).unwrap().position,
            Vec3::new(2.0, 1.0, 0.0)
        );

        // Replaying the snapshot is idempotent.
        assert_eq!(
            engine.handle_message(&hello, 0),
            SyncOutcome::Snapshot { spawned: 0 }
        );
        assert_eq!(engine.host().len(), 2);
    }

    #[test]
    fn test_tick_throttles_owned_entities() {
        let config = SyncConfig::builder()
            .sync_interval(std::time::Duration::from_millis(100))
            .build();
        let mut engine = SyncEngine::with_config(MemoryWorld::new(), "alice", config);
        engine
            .spawn_local("mine", "ball", Components::new(), at(1.0))
            .unwrap();
        engine.handle_message(&spawn("theirs", "bob"), 0);

        let first = engine.tick(1_000);
        assert_eq!(
            first,
            vec![OutboundUpdate {
                entity_id: "mine".into(),
                transform: at(1.0),
            }]
        );
        assert!(engine.tick(1_050).is_empty());
        assert_eq!(engine.tick(1_100).len(), 1);
        assert_eq!(engine.directory().record("mine").unwrap().last_sync_time, 1_100);

        // A per-entity rate overrides the configured one.
        assert!(engine.set_sync_interval("mine", std::time::Duration::from_millis(500)));
        assert!(engine.tick(1_400).is_empty());
        assert_eq!(engine.tick(1_600).len(), 1);
        assert!(!engine.set_sync_interval("ghost", std::time::Duration::from_millis(500)));
    }

    #[test]
    fn test_local_lifecycle() {
        let mut engine = engine("alice");
        let spawn_payload = engine
            .spawn_local("box", "crate", Components::new(), at(3.0))
            .unwrap();
        assert_eq!(spawn_payload.owner_id, "alice");
        assert!(matches!(
            engine.spawn_local("box", "crate", Components::new(), at(0.0)),
            Err(DirectoryError::DuplicateNetworkId(_))
        ));

        engine.handle_message(&spawn("theirs", "bob"), 0);
        assert!(engine.despawn_local("theirs", 0).is_none());
        assert!(engine.directory().contains("theirs"));

        let despawn = engine.despawn_local("box", 0).unwrap();
        assert_eq!(despawn.entity_id, "box");
        assert!(!engine.directory().contains("box"));
        assert_eq!(engine.host().len(), 1);

        // Echo of our own spawn is suppressed, a deliberate respawn is not.
        assert_eq!(engine.handle_message(&spawn("box", "alice"), 10), SyncOutcome::Tombstoned);
        assert!(engine.spawn_local("box", "crate", Components::new(), at(0.0)).is_ok());
    }

    #[test]
    fn test_unrelated_messages_unhandled() {
        let mut engine = engine("alice");
        let chat = msg(Payload::ChatMessage(ChatMessage {
            from_client_id: "bob".into(),
            message: "hi".into(),
            timestamp: 0,
            kind: ChatKind::default(),
        }));
        let outcome = engine.handle_message(&chat, 0);
        assert_eq!(outcome, SyncOutcome::Unhandled);
        assert!(!outcome.is_applied());
        assert!(engine.handle_message(&Message::new("p", 0, Payload::Ping), 0) == SyncOutcome::Unhandled);
    }
}
