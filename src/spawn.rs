//! Spawn and despawn announcements driven by visibility.

pub mod spawn_message;

use alloc::{collections::VecDeque, vec::Vec};

use bevy::prelude::*;
use log::{debug, error, trace};

use crate::{
    session::{ReplicationSession, send_packet},
    shared::{
        backend::transport::ReplicationChannel,
        ctx::ReplicationCtx,
        error::ReplicationError,
        net_id::NetId,
        peer_id::PeerId,
        replication_config::{PropertyPath, PropertyValue},
        scene::SpawnRequest,
        state_codec::CodecError,
    },
};
use spawn_message::{DespawnMessage, SpawnMessage, SpawnSource};

/// Remote spawn that is being attached to the scene.
///
/// Sync components of the attached entity consume their IDs and spawn state from it.
struct PendingSpawn<'a> {
    entity: Entity,
    remote_peer: PeerId,
    state: &'a [u8],
    sync_ids: VecDeque<NetId>,
}

impl ReplicationSession {
    /// Registers an entity spawned by a spawner.
    ///
    /// If the local peer is the spawn authority, assigns the entity an ID and announces
    /// it to all peers it's visible to.
    pub fn on_spawn(
        &mut self,
        ctx: &mut ReplicationCtx,
        entity: Entity,
        spawner: Entity,
    ) -> Result<(), ReplicationError> {
        if !ctx.scene.contains(entity) {
            return Err(ReplicationError::InvalidEntity(entity));
        }
        let authority = ctx
            .scene
            .spawner(spawner)
            .ok_or(ReplicationError::InvalidSpawner(spawner))?
            .authority();

        let tracked = self.registry.track(entity);
        match tracked.spawner {
            Some(existing) if existing != spawner => {
                return Err(ReplicationError::AlreadySpawned {
                    entity,
                    spawner: existing,
                });
            }
            _ => tracked.spawner = Some(spawner),
        }
        self.spawned.insert(entity);

        if ctx.transport.is_active() && ctx.is_local(authority) {
            if tracked.net_id.is_none() {
                tracked.net_id = self.allocator.allocate();
            }
            debug!("registering {entity} with ID {}", tracked.net_id);
            self.update_spawn_visibility(ctx, None, entity)?;
        }

        Ok(())
    }

    /// Unregisters an entity from its spawner.
    ///
    /// Every peer that was told about the entity receives a despawn, regardless of
    /// the current visibility.
    pub fn on_despawn(
        &mut self,
        ctx: &mut ReplicationCtx,
        entity: Entity,
        spawner: Entity,
    ) -> Result<(), ReplicationError> {
        let tracked = self
            .registry
            .get_mut(entity)
            .ok_or(ReplicationError::NotTracked(entity))?;
        if tracked.spawner != Some(spawner) {
            return Err(ReplicationError::NotSpawnedBy { entity, spawner });
        }
        tracked.spawner = None;
        let net_id = tracked.net_id;

        DespawnMessage { net_id }.write(&mut self.packet);
        for (&peer, state) in &mut self.peers {
            if state.set_spawned(entity, false) {
                debug!("despawning {entity} for {peer}");
                send_packet(ctx.transport, peer, ReplicationChannel::Spawns, &self.packet);
            }
        }
        self.spawned.remove(&entity);

        Ok(())
    }

    /// Registers a sync component that started replicating properties of `entity`.
    pub fn on_replication_start(
        &mut self,
        ctx: &mut ReplicationCtx,
        entity: Entity,
        sync: Entity,
    ) -> Result<(), ReplicationError> {
        self.start_replication(ctx, entity, sync, None)
    }

    /// Unregisters a sync component.
    pub fn on_replication_stop(
        &mut self,
        entity: Entity,
        sync: Entity,
    ) -> Result<(), ReplicationError> {
        let tracked = self
            .registry
            .get_mut(entity)
            .ok_or(ReplicationError::NotTracked(entity))?;
        tracked.remove_synchronizer(sync);
        self.synchronizers.remove(&sync);
        for state in self.peers.values_mut() {
            state.sync_entities.remove(&sync);
            state
                .received_synchronizers
                .retain(|_, &mut received| received != sync);
        }

        Ok(())
    }

    /// Re-evaluates visibility after it changed on a sync component.
    ///
    /// `peer` is the peer whose visibility changed or [`None`] if it changed for everyone.
    pub fn on_visibility_changed(
        &mut self,
        ctx: &mut ReplicationCtx,
        sync: Entity,
        peer: Option<PeerId>,
    ) -> Result<(), ReplicationError> {
        let root = ctx
            .scene
            .synchronizer(sync)
            .ok_or(ReplicationError::InvalidSynchronizer(sync))?
            .root();
        if self.spawned.contains(&root) && self.is_spawn_authority(ctx, root) {
            self.update_spawn_visibility(ctx, peer, root)?;
        }

        self.update_sync_visibility(ctx, peer, sync)
    }

    /// Spawns or despawns the entity on peers according to its visibility.
    ///
    /// Visibility is combined with OR across all locally authoritative sync components
    /// of the entity. An entity without such components is visible to everyone.
    ///
    /// With a specific `peer`, only that peer is updated. Otherwise all peers are updated.
    pub fn update_spawn_visibility(
        &mut self,
        ctx: &mut ReplicationCtx,
        peer: Option<PeerId>,
        entity: Entity,
    ) -> Result<(), ReplicationError> {
        let spawner = self
            .registry
            .get(entity)
            .ok_or(ReplicationError::NotTracked(entity))?
            .spawner
            .ok_or(ReplicationError::NotSpawnAuthority(entity))?;
        if !self.is_spawn_authority(ctx, entity) {
            return Err(ReplicationError::NotSpawnAuthority(entity));
        }

        let visible = self.is_spawn_visible(ctx, entity, peer);
        let mut to_spawn = Vec::new();
        let mut to_despawn = Vec::new();
        match peer {
            Some(peer) => {
                let state = self
                    .peers
                    .get(&peer)
                    .ok_or(ReplicationError::UnknownPeer(peer))?;
                if visible != state.is_spawned(entity) {
                    if visible {
                        to_spawn.push(peer);
                    } else {
                        to_despawn.push(peer);
                    }
                }
            }
            None if visible => {
                to_spawn.extend(
                    self.peers
                        .iter()
                        .filter(|(_, state)| !state.is_spawned(entity))
                        .map(|(&peer, _)| peer),
                );
            }
            None => {
                let peers: Vec<_> = self.peers.keys().copied().collect();
                for peer in peers {
                    self.update_spawn_visibility(ctx, Some(peer), entity)?;
                }
            }
        }

        if !to_spawn.is_empty() {
            self.write_spawn_packet(ctx, entity, spawner)?;
            for peer in to_spawn {
                let Some(state) = self.peers.get_mut(&peer) else {
                    continue;
                };
                debug!("spawning {entity} for {peer}");
                ctx.path_cache.send_and_confirm(spawner, peer);
                send_packet(ctx.transport, peer, ReplicationChannel::Spawns, &self.packet);
                state.set_spawned(entity, true);
            }
        }

        if !to_despawn.is_empty() {
            let net_id = self
                .registry
                .get(entity)
                .map(|tracked| tracked.net_id)
                .unwrap_or_default();
            DespawnMessage { net_id }.write(&mut self.packet);
            for peer in to_despawn {
                let Some(state) = self.peers.get_mut(&peer) else {
                    continue;
                };
                debug!("despawning {entity} for {peer}");
                state.set_spawned(entity, false);
                send_packet(ctx.transport, peer, ReplicationChannel::Spawns, &self.packet);
            }
        }

        Ok(())
    }

    /// Starts or stops sending sync updates of a sync component to peers.
    ///
    /// Does nothing if the transport is inactive or the local peer is not the sync authority.
    pub fn update_sync_visibility(
        &mut self,
        ctx: &mut ReplicationCtx,
        peer: Option<PeerId>,
        sync: Entity,
    ) -> Result<(), ReplicationError> {
        if !ctx.transport.is_active() {
            return Ok(());
        }
        let local = ctx.transport.unique_id();
        let sync_component = ctx
            .scene
            .synchronizer(sync)
            .ok_or(ReplicationError::InvalidSynchronizer(sync))?;
        if sync_component.authority() != local {
            return Ok(());
        }

        let visible = sync_component.is_visible_to(peer);
        match peer {
            Some(peer) => {
                let state = self
                    .peers
                    .get_mut(&peer)
                    .ok_or(ReplicationError::UnknownPeer(peer))?;
                if state.set_synced(sync, visible) {
                    trace!("changing sync of {sync} for {peer} to `{visible}`");
                }
            }
            None => {
                for (&peer, state) in &mut self.peers {
                    let visible = visible || sync_component.is_visible_to(Some(peer));
                    if state.set_synced(sync, visible) {
                        trace!("changing sync of {sync} for {peer} to `{visible}`");
                    }
                }
            }
        }

        Ok(())
    }

    /// Handles a spawn packet from a remote spawn authority.
    ///
    /// All checks happen before instantiation, so a rejected packet leaves no partial state.
    pub(crate) fn on_spawn_receive(
        &mut self,
        ctx: &mut ReplicationCtx,
        from: PeerId,
        packet: &[u8],
    ) -> Result<(), ReplicationError> {
        let message = SpawnMessage::read(packet)?;

        let spawner = ctx
            .path_cache
            .resolve(from, message.spawner_path_id)
            .ok_or(ReplicationError::UnknownSpawner {
                peer: from,
                path_id: message.spawner_path_id,
            })?;
        let spawner_component =
            ctx.scene
                .spawner(spawner)
                .ok_or(ReplicationError::UnknownSpawner {
                    peer: from,
                    path_id: message.spawner_path_id,
                })?;
        if spawner_component.authority() != from {
            return Err(ReplicationError::Unauthorized {
                peer: from,
                target: spawner,
            });
        }
        let parent = spawner_component
            .spawn_parent()
            .ok_or(ReplicationError::MissingSpawnParent(spawner))?;
        if ctx.scene.find_child(parent, message.name).is_some() {
            return Err(ReplicationError::NameTaken {
                parent,
                name: message.name.into(),
            });
        }

        let request = match message.source {
            SpawnSource::Scene(id) => SpawnRequest::Scene(id),
            SpawnSource::Custom(arg) => SpawnRequest::Custom(decode_argument(ctx, arg)?),
        };

        let state = self
            .peers
            .get(&from)
            .ok_or(ReplicationError::UnknownPeer(from))?;
        if state.received_entities.contains_key(&message.net_id) {
            return Err(ReplicationError::NetIdInUse {
                peer: from,
                net_id: message.net_id,
            });
        }

        let entity = ctx
            .scene
            .instantiate(spawner, request)
            .ok_or(ReplicationError::InstantiationRefused {
                peer: from,
                spawner,
            })?;
        ctx.scene.set_name(entity, message.name);

        debug!(
            "received {entity} with ID {} from {from}",
            message.net_id
        );
        let tracked = self.registry.track(entity);
        tracked.spawner = Some(spawner);
        tracked.net_id = message.net_id;
        tracked.remote_peer = Some(from);
        if let Some(state) = self.peers.get_mut(&from) {
            state.received_entities.insert(message.net_id, entity);
        }

        let mut pending = PendingSpawn {
            entity,
            remote_peer: from,
            state: message.state,
            sync_ids: message.sync_ids.into(),
        };

        let started = ctx.scene.add_child(parent, entity);
        let mut result = Ok(());
        for sync in started {
            let Some(root) = ctx.scene.synchronizer(sync).map(|sync| sync.root()) else {
                error!("started sync component {sync} is missing in the scene");
                continue;
            };
            if let Err(e) = self.start_replication(ctx, root, sync, Some(&mut pending)) {
                error!("unable to start replication of {sync} for {entity}: {e}");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        ctx.scene.on_spawned(spawner, entity);

        if !pending.sync_ids.is_empty() {
            return Err(ReplicationError::UnconsumedSyncIds {
                spawn_entity: entity,
                count: pending.sync_ids.len(),
            });
        }

        result
    }

    /// Handles a despawn packet from a remote spawn authority.
    pub(crate) fn on_despawn_receive(
        &mut self,
        ctx: &mut ReplicationCtx,
        from: PeerId,
        packet: &[u8],
    ) -> Result<(), ReplicationError> {
        let DespawnMessage { net_id } = DespawnMessage::read(packet)?;

        let state = self
            .peers
            .get_mut(&from)
            .ok_or(ReplicationError::UnknownPeer(from))?;
        let entity = state
            .received_entity(net_id)
            .ok_or(ReplicationError::UnknownRemoteEntity { peer: from, net_id })?;

        let spawner = self
            .registry
            .get(entity)
            .and_then(|tracked| tracked.spawner)
            .ok_or(ReplicationError::NotTracked(entity))?;
        let authority = ctx
            .scene
            .spawner(spawner)
            .ok_or(ReplicationError::InvalidSpawner(spawner))?
            .authority();
        if authority != from {
            return Err(ReplicationError::Unauthorized {
                peer: from,
                target: spawner,
            });
        }

        debug!("received despawn for {entity} with ID {net_id} from {from}");
        state.received_entities.remove(&net_id);
        ctx.scene.detach(entity);
        if !ctx.scene.queue_free(entity) {
            error!("received entity {entity} is already destroyed");
        }
        ctx.scene.on_despawned(spawner, entity);

        Ok(())
    }

    fn start_replication(
        &mut self,
        ctx: &mut ReplicationCtx,
        entity: Entity,
        sync: Entity,
        pending: Option<&mut PendingSpawn>,
    ) -> Result<(), ReplicationError> {
        if !ctx.scene.contains(entity) {
            return Err(ReplicationError::InvalidEntity(entity));
        }
        let authority = ctx
            .scene
            .synchronizer(sync)
            .ok_or(ReplicationError::InvalidSynchronizer(sync))?
            .authority();

        trace!("starting replication of {sync} for {entity}");
        self.registry.track(entity).add_synchronizer(sync);
        self.synchronizers.insert(sync);
        self.update_sync_visibility(ctx, None, sync)?;

        if let Some(pending) = pending {
            if pending.entity == entity && pending.remote_peer == authority {
                self.apply_pending(ctx, entity, sync, pending)?;
            }
        }

        Ok(())
    }

    /// Consumes the next sync ID and the spawn state slice of `sync`.
    fn apply_pending(
        &mut self,
        ctx: &mut ReplicationCtx,
        entity: Entity,
        sync: Entity,
        pending: &mut PendingSpawn,
    ) -> Result<(), ReplicationError> {
        let net_id =
            pending
                .sync_ids
                .pop_front()
                .ok_or(ReplicationError::MissingPendingSyncId {
                    spawn_entity: entity,
                    sync,
                })?;
        self.peers
            .get_mut(&pending.remote_peer)
            .ok_or(ReplicationError::UnknownPeer(pending.remote_peer))?
            .received_synchronizers
            .insert(net_id, sync);

        if pending.state.is_empty() {
            return Ok(());
        }

        let properties: Vec<PropertyPath> = ctx
            .scene
            .synchronizer(sync)
            .and_then(|sync| sync.replication_config())
            .ok_or(ReplicationError::MissingConfig(sync))?
            .spawn_properties()
            .cloned()
            .collect();
        let (values, consumed) = ctx.codec.decode(pending.state, properties.len())?;
        if consumed > 0 {
            let state = pending.state;
            pending.state = &state[consumed..];
            ctx.scene.set_state(entity, &properties, values)?;
        }

        Ok(())
    }

    /// Returns `true` if any locally authoritative sync component of the entity is visible.
    fn is_spawn_visible(&self, ctx: &ReplicationCtx, entity: Entity, peer: Option<PeerId>) -> bool {
        let Some(tracked) = self.registry.get(entity) else {
            return true;
        };

        let mut visible = true;
        for &sync in &tracked.synchronizers {
            let Some(sync_component) = ctx.scene.synchronizer(sync) else {
                error!("sync component {sync} of {entity} is missing in the scene");
                continue;
            };
            if !ctx.is_local(sync_component.authority()) {
                continue;
            }
            if sync_component.is_visible_to(peer) {
                return true;
            }
            visible = false;
        }

        visible
    }

    /// Serializes the spawn packet for the entity into the packet buffer.
    ///
    /// Assigns IDs to locally authoritative sync components that don't have one.
    fn write_spawn_packet(
        &mut self,
        ctx: &mut ReplicationCtx,
        entity: Entity,
        spawner: Entity,
    ) -> Result<(), ReplicationError> {
        let tracked = self
            .registry
            .get(entity)
            .ok_or(ReplicationError::NotTracked(entity))?;
        let net_id = tracked.net_id;
        if net_id.is_none() {
            return Err(ReplicationError::MissingNetId(entity));
        }

        let local = ctx.transport.unique_id();
        let mut properties = Vec::new();
        let mut sync_ids = Vec::new();
        for &sync in &tracked.synchronizers {
            let Some(sync_component) = ctx.scene.synchronizer_mut(sync) else {
                error!("sync component {sync} of {entity} is missing in the scene");
                continue;
            };
            if sync_component.authority() != local {
                continue;
            }
            let config = sync_component
                .replication_config()
                .ok_or(ReplicationError::MissingConfig(sync))?;
            properties.extend(config.spawn_properties().cloned());

            if sync_component.net_id().is_none() {
                sync_component.set_net_id(self.allocator.allocate());
            }
            sync_ids.push(sync_component.net_id());
        }

        self.state.clear();
        if !properties.is_empty() {
            let values = ctx.scene.get_state(entity, &properties)?;
            ctx.codec.encode(&values, &mut self.state)?;
        }

        let spawner_component = ctx
            .scene
            .spawner(spawner)
            .ok_or(ReplicationError::InvalidSpawner(spawner))?;
        let mut argument = Vec::new();
        let source = match spawner_component.find_spawnable_scene(entity) {
            Some(id) => SpawnSource::Scene(id),
            None => {
                let value = spawner_component.spawn_argument(entity);
                ctx.codec.encode(&[value], &mut argument)?;
                SpawnSource::Custom(&argument)
            }
        };

        let spawner_path_id = ctx.path_cache.make_local_id(spawner);
        let name = ctx
            .scene
            .name(entity)
            .ok_or(ReplicationError::InvalidEntity(entity))?;

        SpawnMessage {
            source,
            spawner_path_id,
            net_id,
            sync_ids,
            name,
            state: &self.state,
        }
        .write(&mut self.packet);

        Ok(())
    }
}

fn decode_argument(ctx: &ReplicationCtx, arg: &[u8]) -> Result<PropertyValue, ReplicationError> {
    let (mut values, _) = ctx.codec.decode(arg, 1)?;
    let value = values.pop().ok_or(CodecError::CountMismatch {
        expected: 1,
        actual: 0,
    })?;

    Ok(value)
}
