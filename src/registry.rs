use alloc::vec::Vec;

use bevy::ecs::entity::hash_map::EntityHashMap;
use bevy::prelude::*;
use log::trace;

use crate::shared::{net_id::NetId, peer_id::PeerId};

/// Every entity that participates in replication.
///
/// Entries are created lazily on the first reference and removed when the
/// scene reports the entity as destroyed.
#[derive(Default, Debug)]
pub struct EntityRegistry {
    entities: EntityHashMap<TrackedEntity>,
}

impl EntityRegistry {
    /// Returns the entry for the entity, creating it if needed.
    pub fn track(&mut self, entity: Entity) -> &mut TrackedEntity {
        self.entities.entry(entity).or_insert_with(|| {
            trace!("tracking {entity}");
            Default::default()
        })
    }

    /// Removes the entry and returns it.
    ///
    /// Does nothing if the entity is not tracked.
    pub fn untrack(&mut self, entity: Entity) -> Option<TrackedEntity> {
        let tracked = self.entities.remove(&entity);
        if tracked.is_some() {
            trace!("untracking {entity}");
        }
        tracked
    }

    pub fn get(&self, entity: Entity) -> Option<&TrackedEntity> {
        self.entities.get(&entity)
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut TrackedEntity> {
        self.entities.get_mut(&entity)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains_key(&entity)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, &TrackedEntity)> {
        self.entities.iter().map(|(&entity, tracked)| (entity, tracked))
    }

    /// Forgets network identity of all entries while keeping them tracked.
    ///
    /// Handles stay valid, so entities can be registered again in a new session.
    pub(crate) fn clear_ids(&mut self) {
        for tracked in self.entities.values_mut() {
            tracked.net_id = NetId::NONE;
            tracked.remote_peer = None;
        }
    }
}

/// Replication state of a single entity.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct TrackedEntity {
    /// Spawner that owns the entity's existence on other peers.
    pub spawner: Option<Entity>,

    /// Sync components attached to the entity in the order they started replication.
    pub synchronizers: Vec<Entity>,

    /// Assigned by the spawn authority or received in a spawn packet.
    pub net_id: NetId,

    /// Peer that spawned the entity to us, [`None`] if the entity is locally owned.
    pub remote_peer: Option<PeerId>,
}

impl TrackedEntity {
    pub(crate) fn add_synchronizer(&mut self, sync: Entity) {
        if !self.synchronizers.contains(&sync) {
            self.synchronizers.push(sync);
        }
    }

    pub(crate) fn remove_synchronizer(&mut self, sync: Entity) {
        self.synchronizers.retain(|&entity| entity != sync);
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    const ENTITY: Entity = Entity::from_raw(0);

    #[test]
    fn lazy_tracking() {
        let mut registry = EntityRegistry::default();
        assert!(!registry.contains(ENTITY));

        registry.track(ENTITY).net_id = NetId::new(1);
        assert_eq!(registry.track(ENTITY).net_id, NetId::new(1));
        assert_eq!(registry.len(), 1);

        let tracked = registry.untrack(ENTITY).unwrap();
        assert_eq!(tracked.net_id, NetId::new(1));
        assert!(registry.untrack(ENTITY).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn clear_ids() {
        let mut registry = EntityRegistry::default();
        let tracked = registry.track(ENTITY);
        tracked.net_id = NetId::new(3);
        tracked.remote_peer = Some(PeerId::SERVER);
        tracked.spawner = Some(Entity::PLACEHOLDER);

        registry.clear_ids();

        let tracked = registry.get(ENTITY).unwrap();
        assert_eq!(tracked.net_id, NetId::NONE);
        assert_eq!(tracked.remote_peer, None);
        assert_eq!(tracked.spawner, Some(Entity::PLACEHOLDER));
    }

    #[test]
    fn synchronizers_order() {
        let mut tracked = TrackedEntity::default();
        tracked.add_synchronizer(Entity::from_raw(2));
        tracked.add_synchronizer(Entity::from_raw(1));
        tracked.add_synchronizer(Entity::from_raw(2));
        assert_eq!(
            tracked.synchronizers,
            [Entity::from_raw(2), Entity::from_raw(1)]
        );

        tracked.remove_synchronizer(Entity::from_raw(2));
        assert_eq!(tracked.synchronizers, [Entity::from_raw(1)]);
    }
}
