//! Periodic state updates of sync components.

pub mod sync_message;

use alloc::vec::Vec;
use core::time::Duration;

use bevy::prelude::*;
use log::{error, trace, warn};

use crate::{
    session::{ReplicationSession, send_packet},
    shared::{
        backend::transport::ReplicationChannel,
        ctx::ReplicationCtx,
        error::ReplicationError,
        net_id::NetId,
        peer_id::PeerId,
        replication_config::PropertyPath,
        sync_tick::SyncTick,
    },
};
use sync_message::{SyncReader, SyncWriter};

impl ReplicationSession {
    /// Sends states of sync components to every peer that has something to sync.
    ///
    /// Should be called once per network tick. `now` is passed to
    /// [`Synchronizer::update_outbound_sync_time`](crate::shared::scene::Synchronizer::update_outbound_sync_time)
    /// to let components decide how often they emit updates.
    pub fn process(&mut self, ctx: &mut ReplicationCtx, now: Duration) {
        let mut passes = Vec::new();
        for (&peer, state) in &mut self.peers {
            if state.sync_entities.is_empty() {
                continue;
            }
            let tick = state.next_tick();
            passes.push((peer, tick, state.sync_entities().collect::<Vec<_>>()));
        }

        for (peer, tick, synchronizers) in passes {
            self.send_sync(ctx, peer, tick, &synchronizers, now);
        }
    }

    fn send_sync(
        &mut self,
        ctx: &mut ReplicationCtx,
        peer: PeerId,
        tick: SyncTick,
        synchronizers: &[Entity],
        now: Duration,
    ) {
        let local = ctx.transport.unique_id();
        let max_size = self.config.max_sync_packet_size;
        let mut writer = SyncWriter::new(&mut self.packet, tick, max_size);
        for &sync in synchronizers {
            let Some(sync_component) = ctx.scene.synchronizer_mut(sync) else {
                error!("sync component {sync} is active, but missing in the scene");
                continue;
            };
            let Some(config) = sync_component.replication_config() else {
                error!("sync component {sync} has no replication config");
                continue;
            };
            let properties: Vec<PropertyPath> = config.sync_properties().cloned().collect();
            if sync_component.authority() != local {
                error!("sync component {sync} is synced to {peer} without authority");
                continue;
            }
            if !sync_component.update_outbound_sync_time(now) {
                continue;
            }

            let root = sync_component.root();
            let mut net_id = sync_component.net_id();
            if net_id.is_none() || net_id.is_path_based() {
                let confirm = ctx.path_cache.send_and_confirm(sync, peer);
                if net_id.is_none() {
                    net_id = NetId::from_path(confirm.id);
                    sync_component.set_net_id(net_id);
                }
                if !confirm.confirmed {
                    trace!("waiting for {peer} to confirm path of {sync}");
                    continue;
                }
            }

            let values = match ctx.scene.get_state(root, &properties) {
                Ok(values) => values,
                Err(e) => {
                    error!("unable to read sync state of {sync}: {e}");
                    continue;
                }
            };
            self.state.clear();
            if let Err(e) = ctx.codec.encode(&values, &mut self.state) {
                error!("unable to encode sync state of {sync}: {e}");
                continue;
            }
            if self.state.is_empty() {
                continue;
            }

            if !writer.can_fit(self.state.len()) {
                warn!(
                    "skipping state of {sync} with {} bytes since it doesn't fit into {max_size} bytes",
                    self.state.len()
                );
                continue;
            }
            if writer.is_full(self.state.len()) {
                send_packet(ctx.transport, peer, ReplicationChannel::Sync, writer.packet());
                writer.clear();
            }

            trace!(
                "writing {} bytes for {sync} with ID {net_id} to {peer}",
                self.state.len()
            );
            writer.write_entry(net_id, &self.state);
        }

        if writer.has_entries() {
            send_packet(ctx.transport, peer, ReplicationChannel::Sync, writer.packet());
        }
    }

    /// Applies states from a sync packet.
    ///
    /// Entries for unknown, foreign or outdated sync components are skipped.
    /// A state that can't be decoded or applied aborts the rest of the packet.
    pub(crate) fn on_sync_receive(
        &mut self,
        ctx: &mut ReplicationCtx,
        from: PeerId,
        packet: &[u8],
    ) -> Result<(), ReplicationError> {
        let mut reader = SyncReader::new(packet)?;
        let tick = reader.tick();
        while let Some((net_id, payload)) = reader.next_entry()? {
            let sync = if net_id.is_path_based() {
                ctx.path_cache.resolve(from, net_id.path_id())
            } else {
                self.peers
                    .get(&from)
                    .and_then(|state| state.received_synchronizer(net_id))
            };
            let Some(sync) = sync else {
                trace!("skipping unknown ID {net_id} from {from}");
                continue;
            };

            let Some(sync_component) = ctx.scene.synchronizer(sync) else {
                error!("received sync component {sync} is missing in the scene");
                continue;
            };
            if sync_component.authority() != from {
                warn!("{from} is not the authority of sync component {sync}");
                continue;
            }
            let root = sync_component.root();
            if !ctx.scene.contains(root) {
                error!("root {root} of sync component {sync} is missing in the scene");
                continue;
            }
            let Some(config) = sync_component.replication_config() else {
                error!("sync component {sync} has no replication config");
                continue;
            };
            let properties: Vec<PropertyPath> = config.sync_properties().cloned().collect();

            let Some(sync_component) = ctx.scene.synchronizer_mut(sync) else {
                continue;
            };
            if !sync_component.update_inbound_sync_time(tick) {
                trace!("discarding outdated `{tick:?}` for {sync} from {from}");
                continue;
            }

            let (values, _) = ctx.codec.decode(payload, properties.len())?;
            ctx.scene.set_state(root, &properties, values)?;
            trace!("applied {} bytes to {sync} from {from}", payload.len());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::{
        session::SessionConfig,
        shared::{replication_config::PropertyValue, scene::SceneTree},
        test_scene::{TestPeer, TestSynchronizer},
    };

    #[test]
    fn tick_per_pass() {
        let mut server = TestPeer::server();
        let peer = PeerId::new(2);
        server.connect(peer);
        let entity = server.scene.create_node("Entity");
        let sync = server.scene.add_synchronizer(
            entity,
            TestSynchronizer::new(PeerId::SERVER).with_sync_property("position"),
        );
        server.path_cache.confirm(sync, peer);
        server.start_replication(entity, sync);
        server
            .scene
            .set_property(entity, "position", PropertyValue::Int(1));

        server.process(Duration::ZERO);
        server.process(Duration::from_millis(1));

        let ticks: Vec<_> = server
            .transport
            .take_sent()
            .into_iter()
            .map(|(_, _, packet)| SyncReader::new(&packet).unwrap().tick())
            .collect();
        assert_eq!(ticks, [SyncTick::new(1), SyncTick::new(2)]);
    }

    #[test]
    fn path_confirmation() {
        let mut server = TestPeer::server();
        let peer = PeerId::new(2);
        server.connect(peer);
        let entity = server.scene.create_node("Entity");
        let sync = server.scene.add_synchronizer(
            entity,
            TestSynchronizer::new(PeerId::SERVER).with_sync_property("position"),
        );
        server.start_replication(entity, sync);
        server
            .scene
            .set_property(entity, "position", PropertyValue::Int(1));

        server.process(Duration::ZERO);
        assert!(server.transport.take_sent().is_empty());
        let net_id = server.scene.synchronizer(sync).unwrap().net_id();
        assert!(net_id.is_path_based());

        server.path_cache.confirm(sync, peer);
        server.process(Duration::from_millis(1));
        let sent = server.transport.take_sent();
        assert_eq!(sent.len(), 1);
        let mut reader = SyncReader::new(&sent[0].2).unwrap();
        let (sent_id, _) = reader.next_entry().unwrap().unwrap();
        assert_eq!(sent_id, net_id, "path-based IDs should stay tagged");
    }

    #[test]
    fn packet_splitting() {
        let mut server = TestPeer::with_config(
            PeerId::SERVER,
            SessionConfig {
                max_sync_packet_size: 40,
            },
        );
        let peer = PeerId::new(2);
        server.connect(peer);

        let mut synchronizers = Vec::new();
        for name in ["First", "Second", "Third"] {
            let entity = server.scene.create_node(name);
            let sync = server.scene.add_synchronizer(
                entity,
                TestSynchronizer::new(PeerId::SERVER).with_sync_property("data"),
            );
            server.path_cache.confirm(sync, peer);
            server.start_replication(entity, sync);
            server
                .scene
                .set_property(entity, "data", PropertyValue::Bytes(vec![0; 10]));
            synchronizers.push(sync);
        }

        let oversized = server.scene.create_node("Oversized");
        let sync = server.scene.add_synchronizer(
            oversized,
            TestSynchronizer::new(PeerId::SERVER).with_sync_property("data"),
        );
        server.path_cache.confirm(sync, peer);
        server.start_replication(oversized, sync);
        server
            .scene
            .set_property(oversized, "data", PropertyValue::Bytes(vec![0; 40]));

        server.process(Duration::ZERO);

        let sent = server.transport.take_sent();
        assert_eq!(sent.len(), 3, "each 12-byte state should take its own packet");
        let mut entries = 0;
        for (_, _, packet) in &sent {
            assert!(packet.len() <= 40);
            let mut reader = SyncReader::new(packet).unwrap();
            assert_eq!(reader.tick(), SyncTick::new(1));
            while reader.next_entry().unwrap().is_some() {
                entries += 1;
            }
        }
        assert_eq!(entries, synchronizers.len());
    }
}
