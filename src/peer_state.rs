use bevy::{
    ecs::entity::hash_set::EntityHashSet, platform::collections::HashMap, prelude::*,
};

use crate::shared::{net_id::NetId, sync_tick::SyncTick};

/// Replication bookkeeping for a single connected peer.
///
/// Created on connect and dropped on disconnect.
#[derive(Default, Debug)]
pub struct PeerState {
    /// Entities that were announced to this peer with a spawn packet.
    pub(crate) spawn_entities: EntityHashSet,

    /// Sync components whose state is sent to this peer.
    pub(crate) sync_entities: EntityHashSet,

    /// Entities this peer spawned to us, keyed by their IDs on the peer.
    pub(crate) received_entities: HashMap<NetId, Entity>,

    /// Sync components of the received entities, keyed by their IDs on the peer.
    pub(crate) received_synchronizers: HashMap<NetId, Entity>,

    /// Tick of the last sync pass for this peer.
    pub(crate) last_sent_tick: SyncTick,
}

impl PeerState {
    /// Returns `true` if the peer was told that the entity exists.
    pub fn is_spawned(&self, entity: Entity) -> bool {
        self.spawn_entities.contains(&entity)
    }

    /// Returns `true` if state of the sync component is sent to the peer.
    pub fn is_synced(&self, sync: Entity) -> bool {
        self.sync_entities.contains(&sync)
    }

    /// Returns the local entity spawned by the peer with the given ID.
    pub fn received_entity(&self, net_id: NetId) -> Option<Entity> {
        self.received_entities.get(&net_id).copied()
    }

    /// Returns the local sync component that the peer addresses with the given ID.
    pub fn received_synchronizer(&self, net_id: NetId) -> Option<Entity> {
        self.received_synchronizers.get(&net_id).copied()
    }

    pub fn spawn_entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.spawn_entities.iter().copied()
    }

    pub fn sync_entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.sync_entities.iter().copied()
    }

    pub fn last_sent_tick(&self) -> SyncTick {
        self.last_sent_tick
    }

    /// Advances the tick for the next sync pass and returns it.
    pub(crate) fn next_tick(&mut self) -> SyncTick {
        self.last_sent_tick += 1;
        self.last_sent_tick
    }

    /// Inserts or removes an entity from the announced set.
    ///
    /// Returns `true` if membership changed.
    pub(crate) fn set_spawned(&mut self, entity: Entity, spawned: bool) -> bool {
        if spawned {
            self.spawn_entities.insert(entity)
        } else {
            self.spawn_entities.remove(&entity)
        }
    }

    /// Inserts or removes a sync component from the synced set.
    ///
    /// Returns `true` if membership changed.
    pub(crate) fn set_synced(&mut self, sync: Entity, synced: bool) -> bool {
        if synced {
            self.sync_entities.insert(sync)
        } else {
            self.sync_entities.remove(&sync)
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn tick_wrapping() {
        let mut peer = PeerState {
            last_sent_tick: SyncTick::new(u16::MAX),
            ..Default::default()
        };
        assert_eq!(peer.next_tick(), SyncTick::new(0));
        assert_eq!(peer.next_tick(), SyncTick::new(1));
        assert_eq!(peer.last_sent_tick(), SyncTick::new(1));
    }

    #[test]
    fn membership() {
        let entity = Entity::from_raw(0);
        let mut peer = PeerState::default();
        assert!(peer.set_spawned(entity, true));
        assert!(!peer.set_spawned(entity, true));
        assert!(peer.is_spawned(entity));
        assert!(peer.set_spawned(entity, false));
        assert!(!peer.set_spawned(entity, false));

        assert!(peer.set_synced(entity, true));
        assert!(peer.is_synced(entity));
    }
}
