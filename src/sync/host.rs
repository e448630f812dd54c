//! Local world abstraction.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::codec::{Components, EntitySpawn};
use crate::core::Transform;

/// The local world the sync engine mirrors networked entities into.
///
/// Implement this for your scene graph or ECS. The engine only ever talks to
/// the world through these calls; it never holds references into it.
///
/// # Example
///
/// ```ignore
/// impl EntityHost for Scene {
///     type Handle = NodeId;
///
///     fn create_entity(&mut self, spawn: &EntitySpawn) -> NodeId {
///         self.instantiate(&spawn.template_id)
///     }
///
///     fn destroy_entity(&mut self, handle: NodeId) {
///         self.remove(handle);
///     }
///
///     fn apply_components(&mut self, handle: NodeId, components: &Components) {
///         self.node_mut(handle).merge(components);
///     }
///
///     fn transform(&self, handle: NodeId) -> Option<Transform> {
///         self.node(handle).map(|n| n.transform)
///     }
///
///     fn set_transform(&mut self, handle: NodeId, transform: Transform) {
///         self.node_mut(handle).transform = transform;
///     }
/// }
/// ```
pub trait EntityHost {
    /// Opaque local entity handle.
    type Handle: Copy + Eq + Hash + Debug;

    /// Instantiate an entity for `spawn` and return its handle.
    fn create_entity(&mut self, spawn: &EntitySpawn) -> Self::Handle;

    /// Destroy a previously created entity.
    fn destroy_entity(&mut self, handle: Self::Handle);

    /// Merge component values into the entity.
    fn apply_components(&mut self, handle: Self::Handle, components: &Components);

    /// Current transform, or `None` if the entity is gone.
    fn transform(&self, handle: Self::Handle) -> Option<Transform>;

    /// Overwrite the entity's transform.
    fn set_transform(&mut self, handle: Self::Handle, transform: Transform);
}

/// An entity stored by [`MemoryWorld`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldEntity {
    /// Template it was spawned from.
    pub template_id: String,
    /// Owning client.
    pub owner_id: String,
    /// Merged component values.
    pub components: Components,
    /// Current transform.
    pub transform: Transform,
}

/// [`EntityHost`] backed by a hash map, for headless clients and bots.
#[derive(Debug, Default)]
pub struct MemoryWorld {
    entities: HashMap<u64, WorldEntity>,
    next_handle: u64,
}

impl MemoryWorld {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entity by handle.
    pub fn get(&self, handle: u64) -> Option<&WorldEntity> {
        self.entities.get(&handle)
    }

    /// Mutable entity by handle.
    pub fn get_mut(&mut self, handle: u64) -> Option<&mut WorldEntity> {
        self.entities.get_mut(&handle)
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the world is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl EntityHost for MemoryWorld {
    type Handle = u64;

    fn create_entity(&mut self, spawn: &EntitySpawn) -> u64 {
        self.next_handle += 1;
        let handle = self.next_handle;
        self.entities.insert(
            handle,
            WorldEntity {
                template_id: spawn.template_id.clone(),
                owner_id: spawn.owner_id.clone(),
                ..WorldEntity::default()
            },
        );
        handle
    }

    fn destroy_entity(&mut self, handle: u64) {
        self.entities.remove(&handle);
    }

    fn apply_components(&mut self, handle: u64, components: &Components) {
        if let Some(entity) = self.entities.get_mut(&handle) {
            entity
                .components
                .extend(components.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }

    fn transform(&self, handle: u64) -> Option<Transform> {
        self.entities.get(&handle).map(|e| e.transform)
    }

    fn set_transform(&mut self, handle: u64, transform: Transform) {
        if let Some(entity) = self.entities.get_mut(&handle) {
            entity.transform = transform;
        }
    }
}
