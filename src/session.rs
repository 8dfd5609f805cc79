//! Replication state owned by a single network session.

use alloc::{collections::BTreeMap, vec::Vec};

use bevy::{ecs::entity::hash_set::EntityHashSet, prelude::*};
use log::{debug, error, trace, warn};

use crate::{
    peer_state::PeerState,
    registry::{EntityRegistry, TrackedEntity},
    shared::{
        backend::transport::{ReplicationChannel, Transport},
        command::NetworkCommand,
        ctx::ReplicationCtx,
        error::{ErrorKind, ReplicationError},
        net_id::NetIdAllocator,
        peer_id::PeerId,
        scene::SceneTree,
    },
};

/// Settings for [`ReplicationSession`].
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    /// Maximum size of a single sync packet in bytes.
    ///
    /// Sync states are packed into packets up to this size. A state that doesn't fit
    /// into an empty packet is not sent.
    pub max_sync_packet_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sync_packet_size: 1350,
        }
    }
}

/// Decides which entities exist on each connected peer and keeps their state in sync.
///
/// The session reacts to notifications from the scene and the transport:
///
/// - Lifecycle: [`Self::on_spawn`], [`Self::on_despawn`], [`Self::on_replication_start`],
///   [`Self::on_replication_stop`], [`Self::on_visibility_changed`] and [`Self::notify_destroyed`].
/// - Connection: [`Self::on_peer_connected`], [`Self::on_peer_disconnected`] and [`Self::reset`].
/// - Network: [`Self::receive`] for every packet and [`Self::process`] once per network tick.
///
/// All collaborators are passed with [`ReplicationCtx`].
#[derive(Resource, Debug)]
pub struct ReplicationSession {
    pub(crate) config: SessionConfig,
    pub(crate) registry: EntityRegistry,
    pub(crate) peers: BTreeMap<PeerId, PeerState>,

    /// Entities registered with a spawner.
    pub(crate) spawned: EntityHashSet,

    /// Sync components that started replication.
    pub(crate) synchronizers: EntityHashSet,

    pub(crate) allocator: NetIdAllocator,

    /// Reusable buffer for the packet that is currently assembled.
    pub(crate) packet: Vec<u8>,

    /// Reusable buffer for encoded property values.
    pub(crate) state: Vec<u8>,
}

impl Default for ReplicationSession {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

impl ReplicationSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            registry: Default::default(),
            peers: Default::default(),
            spawned: Default::default(),
            synchronizers: Default::default(),
            allocator: Default::default(),
            packet: Default::default(),
            state: Default::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn tracked(&self, entity: Entity) -> Option<&TrackedEntity> {
        self.registry.get(entity)
    }

    pub fn peer(&self, peer: PeerId) -> Option<&PeerState> {
        self.peers.get(&peer)
    }

    /// Returns connected peers in ascending order.
    pub fn peers(&self) -> impl Iterator<Item = (PeerId, &PeerState)> {
        self.peers.iter().map(|(&peer, state)| (peer, state))
    }

    /// Returns `true` if the entity is registered with a spawner.
    pub fn is_spawned(&self, entity: Entity) -> bool {
        self.spawned.contains(&entity)
    }

    /// Returns `true` if the sync component started replication.
    pub fn is_replicating(&self, sync: Entity) -> bool {
        self.synchronizers.contains(&sync)
    }

    /// Purges all references to a destroyed entity or component.
    ///
    /// Should be called by the scene once the handle becomes invalid.
    /// Unknown handles are ignored.
    pub fn notify_destroyed(&mut self, entity: Entity) {
        self.spawned.remove(&entity);
        if self.synchronizers.remove(&entity) {
            for peer in self.peers.values_mut() {
                peer.sync_entities.remove(&entity);
                peer.received_synchronizers.retain(|_, &mut sync| sync != entity);
            }
        }

        let Some(tracked) = self.registry.untrack(entity) else {
            return;
        };

        if let Some(remote_peer) = tracked.remote_peer {
            if let Some(peer) = self.peers.get_mut(&remote_peer) {
                if peer.received_entities.get(&tracked.net_id) == Some(&entity) {
                    peer.received_entities.remove(&tracked.net_id);
                }
            }
        }

        if !tracked.net_id.is_none() || tracked.remote_peer.is_none() {
            for peer in self.peers.values_mut() {
                peer.spawn_entities.remove(&entity);
            }
        }
    }

    /// Resets the session after the transport was reset.
    ///
    /// Requests destruction of all entities received from remote peers and forgets
    /// all peers. Tracked entities stay registered, but lose their network IDs.
    pub fn reset(&mut self, ctx: &mut ReplicationCtx) {
        debug!("resetting session with {} peers", self.peers.len());
        for peer in self.peers.values() {
            free_remotes(ctx.scene, &self.registry, peer);
        }
        self.peers.clear();
        self.registry.clear_ids();

        for &sync in &self.synchronizers {
            match ctx.scene.synchronizer_mut(sync) {
                Some(sync) => sync.reset(),
                None => error!("sync component {sync} is active, but missing in the scene"),
            }
        }

        self.allocator.reset();
    }

    /// Registers a new peer and announces everything visible to it.
    pub fn on_peer_connected(&mut self, ctx: &mut ReplicationCtx, peer: PeerId) {
        debug!("connecting {peer}");
        if self.peers.insert(peer, Default::default()).is_some() {
            warn!("{peer} was already connected, replacing its state");
        }

        let spawned: Vec<_> = self.spawned.iter().copied().collect();
        for entity in spawned {
            let registered = self
                .registry
                .get(entity)
                .is_some_and(|tracked| !tracked.net_id.is_none());
            if !registered || !self.is_spawn_authority(ctx, entity) {
                continue;
            }
            if let Err(e) = self.update_spawn_visibility(ctx, Some(peer), entity) {
                error!("unable to update visibility of {entity} for {peer}: {e}");
            }
        }

        let synchronizers: Vec<_> = self.synchronizers.iter().copied().collect();
        for sync in synchronizers {
            if let Err(e) = self.update_sync_visibility(ctx, Some(peer), sync) {
                error!("unable to update visibility of sync component {sync} for {peer}: {e}");
            }
        }
    }

    /// Forgets a peer and requests destruction of all entities it spawned to us.
    pub fn on_peer_disconnected(
        &mut self,
        ctx: &mut ReplicationCtx,
        peer: PeerId,
    ) -> Result<(), ReplicationError> {
        debug!("disconnecting {peer}");
        let state = self
            .peers
            .remove(&peer)
            .ok_or(ReplicationError::UnknownPeer(peer))?;
        free_remotes(ctx.scene, &self.registry, &state);

        Ok(())
    }

    /// Handles a packet received from a peer.
    ///
    /// The packet should start with a [`NetworkCommand`]. Errors affect only this packet
    /// and are logged before returning.
    pub fn receive(
        &mut self,
        ctx: &mut ReplicationCtx,
        from: PeerId,
        packet: &[u8],
    ) -> Result<(), ReplicationError> {
        let result = match packet.first() {
            Some(&byte) => match NetworkCommand::try_from(byte) {
                Ok(NetworkCommand::Spawn) => self.on_spawn_receive(ctx, from, packet),
                Ok(NetworkCommand::Despawn) => self.on_despawn_receive(ctx, from, packet),
                Ok(NetworkCommand::Sync) => self.on_sync_receive(ctx, from, packet),
                Err(e) => Err(e),
            },
            None => Err(ReplicationError::PacketTooShort { len: 0, min: 1 }),
        };

        if let Err(e) = &result {
            match e.kind() {
                ErrorKind::ProtocolViolation => warn!("rejecting packet from {from}: {e}"),
                ErrorKind::Malformed => debug!("rejecting malformed packet from {from}: {e}"),
                ErrorKind::Misuse | ErrorKind::Internal | ErrorKind::Data => {
                    error!("unable to apply packet from {from}: {e}")
                }
            }
        }

        result
    }

    /// Returns `true` if the entity has a spawner owned by the local peer.
    pub(crate) fn is_spawn_authority(&self, ctx: &ReplicationCtx, entity: Entity) -> bool {
        self.registry
            .get(entity)
            .and_then(|tracked| tracked.spawner)
            .and_then(|spawner| ctx.scene.spawner(spawner))
            .is_some_and(|spawner| ctx.is_local(spawner.authority()))
    }
}

/// Sends a packet if the transport is active.
pub(crate) fn send_packet(
    transport: &mut dyn Transport,
    peer: PeerId,
    channel: ReplicationChannel,
    packet: &[u8],
) {
    if !transport.is_active() {
        debug!("skipping {} bytes for {peer} since transport is inactive", packet.len());
        return;
    }

    trace!("sending {} bytes to {peer} over {channel:?}", packet.len());
    transport.send(peer, channel.into(), packet);
}

fn free_remotes(scene: &mut dyn SceneTree, registry: &EntityRegistry, peer: &PeerState) {
    for (&net_id, &entity) in &peer.received_entities {
        if !registry.contains(entity) || !scene.queue_free(entity) {
            error!("received entity {entity} with ID {net_id} is missing");
        }
    }
}
