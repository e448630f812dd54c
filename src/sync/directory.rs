//! Bidirectional network id ↔ local handle directory.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use thiserror::Error;

use crate::core::constants::DEFAULT_SYNC_INTERVAL_MS;

/// Errors from directory mutations. A rejected call leaves both maps untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The network id is already registered.
    #[error("network id `{0}` is already registered")]
    DuplicateNetworkId(String),

    /// The local handle is already bound to another network id.
    #[error("local handle {handle} is already bound to `{network_id}`")]
    DuplicateHandle {
        /// Debug rendering of the handle.
        handle: String,
        /// Network id currently bound to it.
        network_id: String,
    },
}

/// Per-entity bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEntityRecord<H> {
    /// Id shared by every participant.
    pub network_id: String,
    /// Handle in the local world.
    pub local_handle: H,
    /// Whether this client is authoritative for the entity's transform.
    pub is_owner: bool,
    /// Last time (ms) a transform was sent for it.
    pub last_sync_time: u64,
    /// Minimum time (ms) between transform sends.
    pub sync_interval_ms: u64,
}

/// Directory of networked entities.
///
/// The two indexes are always mutually consistent: every record is reachable
/// through both its network id and its local handle.
#[derive(Debug, Clone)]
pub struct EntityDirectory<H> {
    records: HashMap<String, NetworkEntityRecord<H>>,
    by_handle: HashMap<H, String>,
    sync_interval_ms: u64,
}

impl<H: Copy + Eq + Hash + Debug> Default for EntityDirectory<H> {
    fn default() -> Self {
        Self::new(DEFAULT_SYNC_INTERVAL_MS)
    }
}

impl<H: Copy + Eq + Hash + Debug> EntityDirectory<H> {
    /// Create a directory whose records default to `sync_interval_ms`.
    pub fn new(sync_interval_ms: u64) -> Self {
        Self {
            records: HashMap::new(),
            by_handle: HashMap::new(),
            sync_interval_ms,
        }
    }

    /// Bind `network_id` to `handle`.
    pub fn register(
        &mut self,
        network_id: impl Into<String>,
        handle: H,
        is_owner: bool,
    ) -> Result<&NetworkEntityRecord<H>, DirectoryError> {
        let network_id = network_id.into();
        if self.records.contains_key(&network_id) {
            return Err(DirectoryError::DuplicateNetworkId(network_id));
        }
        if let Some(existing) = self.by_handle.get(&handle) {
            return Err(DirectoryError::DuplicateHandle {
                handle: format!("{handle:?}"),
                network_id: existing.clone(),
            });
        }

        self.by_handle.insert(handle, network_id.clone());
        let record = NetworkEntityRecord {
            network_id: network_id.clone(),
            local_handle: handle,
            is_owner,
            last_sync_time: 0,
            sync_interval_ms: self.sync_interval_ms,
        };
        Ok(&*self.records.entry(network_id).or_insert(record))
    }

    /// Local handle for a network id.
    pub fn resolve_by_network_id(&self, network_id: &str) -> Option<H> {
        self.records.get(network_id).map(|r| r.local_handle)
    }

    /// Network id for a local handle.
    pub fn resolve_by_local_handle(&self, handle: H) -> Option<&str> {
        self.by_handle.get(&handle).map(String::as_str)
    }

    /// Record for a network id.
    pub fn record(&self, network_id: &str) -> Option<&NetworkEntityRecord<H>> {
        self.records.get(network_id)
    }

    /// Change how often a transform is sent for `network_id`.
    ///
    /// Returns `false` if the id is not registered.
    pub fn set_sync_interval(&mut self, network_id: &str, interval_ms: u64) -> bool {
        let Some(record) = self.records.get_mut(network_id) else {
            return false;
        };
        record.sync_interval_ms = interval_ms;
        true
    }

    /// Whether `network_id` is registered.
    pub fn contains(&self, network_id: &str) -> bool {
        self.records.contains_key(network_id)
    }

    /// Remove by network id.
    pub fn remove(&mut self, network_id: &str) -> Option<NetworkEntityRecord<H>> {
        let record = self.records.remove(network_id)?;
        self.by_handle.remove(&record.local_handle);
        Some(record)
    }

    /// Remove by local handle.
    pub fn remove_by_local_handle(&mut self, handle: H) -> Option<NetworkEntityRecord<H>> {
        let network_id = self.by_handle.remove(&handle)?;
        self.records.remove(&network_id)
    }

    /// All records.
    pub fn iter(&self) -> impl Iterator<Item = &NetworkEntityRecord<H>> {
        self.records.values()
    }

    /// Records this client owns.
    pub fn owned(&self) -> impl Iterator<Item = &NetworkEntityRecord<H>> {
        self.records.values().filter(|r| r.is_owner)
    }

    /// Mutable records this client owns. Ids and handles must stay put.
    pub(crate) fn owned_mut(&mut self) -> impl Iterator<Item = &mut NetworkEntityRecord<H>> {
        self.records.values_mut().filter(|r| r.is_owner)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
        self.by_handle.clear();
    }
}
