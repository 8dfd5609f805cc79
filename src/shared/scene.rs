//! Interface to the scene graph that owns replicated entities.
//!
//! The session holds only [`Entity`] handles and never controls their lifetime.

use alloc::{borrow::Cow, string::String, vec::Vec};
use core::time::Duration;

use bevy::prelude::*;
use thiserror::Error;

use super::{
    net_id::NetId,
    peer_id::PeerId,
    replication_config::{PropertyPath, PropertyValue, ReplicationConfig},
    sync_tick::SyncTick,
};

/// Scene graph that owns entities, spawners and sync components.
pub trait SceneTree {
    /// Returns `true` if the entity is alive.
    fn contains(&self, entity: Entity) -> bool;

    /// Returns the name of the entity which is unique among its siblings.
    fn name(&self, entity: Entity) -> Option<&str>;

    /// Renames an entity that is not attached yet.
    fn set_name(&mut self, entity: Entity, name: &str);

    /// Returns a child of `parent` with the given name.
    fn find_child(&self, parent: Entity, name: &str) -> Option<Entity>;

    /// Attaches `child` to `parent`.
    ///
    /// Attaching starts replication of all sync components inside the attached subtree.
    /// Returns these sync components in the order they started, so the session can
    /// process them before anything else observes the new entity.
    fn add_child(&mut self, parent: Entity, child: Entity) -> Vec<Entity>;

    /// Detaches an entity from its parent, if any.
    fn detach(&mut self, entity: Entity);

    /// Requests destruction of the entity.
    ///
    /// Returns `false` if the entity doesn't exist.
    ///
    /// The scene should call [`ReplicationSession::notify_destroyed`](crate::session::ReplicationSession::notify_destroyed)
    /// once the entity is actually destroyed.
    fn queue_free(&mut self, entity: Entity) -> bool;

    /// Reads property values of an entity in the order of `properties`.
    fn get_state(
        &self,
        entity: Entity,
        properties: &[PropertyPath],
    ) -> Result<Vec<PropertyValue>, StateError>;

    /// Writes property values to an entity.
    fn set_state(
        &mut self,
        entity: Entity,
        properties: &[PropertyPath],
        values: Vec<PropertyValue>,
    ) -> Result<(), StateError>;

    /// Returns the spawner component with the given handle.
    fn spawner(&self, spawner: Entity) -> Option<&dyn Spawner>;

    /// Creates a new detached entity for a remote spawn.
    ///
    /// Returns [`None`] if the spawner refuses the request.
    fn instantiate(&mut self, spawner: Entity, request: SpawnRequest) -> Option<Entity>;

    /// Returns the sync component with the given handle.
    fn synchronizer(&self, sync: Entity) -> Option<&dyn Synchronizer>;

    /// Same as [`Self::synchronizer`], but mutable.
    fn synchronizer_mut(&mut self, sync: Entity) -> Option<&mut dyn Synchronizer>;

    /// Called after a remotely spawned entity was attached.
    fn on_spawned(&mut self, _spawner: Entity, _entity: Entity) {}

    /// Called after a remotely spawned entity was detached for destruction.
    fn on_despawned(&mut self, _spawner: Entity, _entity: Entity) {}
}

/// Component that spawns entities which should also exist on other peers.
pub trait Spawner {
    /// Peer that decides which entities exist.
    fn authority(&self) -> PeerId;

    /// Returns the index of the spawnable scene the entity was instantiated from.
    ///
    /// Entities without a scene are spawned with [`Self::spawn_argument`].
    fn find_spawnable_scene(&self, entity: Entity) -> Option<u8>;

    /// Returns the custom argument the entity was spawned with.
    fn spawn_argument(&self, entity: Entity) -> PropertyValue;

    /// Returns the entity under which spawned entities are attached.
    fn spawn_parent(&self) -> Option<Entity>;
}

/// Component that synchronizes properties of its root entity.
///
/// Multiple sync components can be attached to the same root.
pub trait Synchronizer {
    /// Peer that decides property values.
    fn authority(&self) -> PeerId;

    /// Entity whose properties are replicated.
    fn root(&self) -> Entity;

    /// Checks visibility for a specific peer or, if `peer` is [`None`], for every peer.
    ///
    /// See also [`PeerVisibility`](super::visibility::PeerVisibility).
    fn is_visible_to(&self, peer: Option<PeerId>) -> bool;

    fn net_id(&self) -> NetId;

    fn set_net_id(&mut self, net_id: NetId);

    fn replication_config(&self) -> Option<&ReplicationConfig>;

    /// Returns `true` if the state should be emitted at `now`.
    ///
    /// See also [`SyncTimer`](super::sync_tick::SyncTimer).
    fn update_outbound_sync_time(&mut self, now: Duration) -> bool;

    /// Returns `true` if a state with this tick is newer than the last applied one.
    fn update_inbound_sync_time(&mut self, tick: SyncTick) -> bool;

    /// Forgets send and receive times.
    fn reset(&mut self);
}

/// How a remote spawn should be instantiated.
#[derive(Clone, Debug, PartialEq)]
pub enum SpawnRequest {
    /// Instantiate a spawnable scene by index.
    Scene(u8),
    /// Instantiate from a custom argument.
    Custom(PropertyValue),
}

/// Error returned by [`SceneTree::get_state`] and [`SceneTree::set_state`].
#[derive(Error, Debug)]
pub enum StateError {
    #[error("{0} doesn't exist")]
    MissingEntity(Entity),
    #[error("{entity} has no property `{path}`")]
    UnknownProperty { entity: Entity, path: PropertyPath },
    #[error("expected {expected} values, but got {actual}")]
    CountMismatch { expected: usize, actual: usize },
    #[error("{0}")]
    Custom(String),
}

/// Characters that can't be used in entity names because they have a meaning in paths.
///
/// `@` is allowed since scenes use it for auto-generated names.
pub const INVALID_NAME_CHARS: &[char] = &['.', ':', '/', '"', '%'];

/// Replaces characters that can't be used in entity names with `_`.
pub fn sanitize_name(name: &str) -> Cow<'_, str> {
    if name.contains(INVALID_NAME_CHARS) {
        Cow::Owned(name.replace(INVALID_NAME_CHARS, "_"))
    } else {
        Cow::Borrowed(name)
    }
}

/// Returns `true` if the name is non-empty and doesn't need sanitization.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(INVALID_NAME_CHARS)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn names() {
        assert!(is_valid_name("Player"));
        assert!(is_valid_name("@Player@2"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("../Player"));
        assert!(!is_valid_name("Level/Player"));
        assert!(!is_valid_name("Player:position"));
        assert_eq!(sanitize_name("../a%b"), "___a_b");
        assert!(matches!(sanitize_name("Player"), Cow::Borrowed(_)));
    }
}
