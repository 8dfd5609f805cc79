use super::super::peer_id::PeerId;

/// Delivers packets to connected peers.
pub trait Transport {
    /// ID of the local peer.
    fn unique_id(&self) -> PeerId;

    /// Returns `true` if the transport is connected to a network session.
    ///
    /// When inactive, the session still tracks entities, but doesn't allocate IDs or send anything.
    fn is_active(&self) -> bool;

    /// Sends a packet to a peer.
    ///
    /// Delivery is fire-and-forget, the session never retries.
    fn send(&mut self, peer: PeerId, channel: Channel, packet: &[u8]);
}

/// Channel used for a replication packet.
///
/// Spawns and despawns can't be outdated, so they are sent reliably and in order.
/// Sync packets carry the latest state and a [`SyncTick`](crate::shared::sync_tick::SyncTick)
/// to drop outdated data, so they are sent unreliably.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReplicationChannel {
    /// For spawn and despawn packets.
    ///
    /// This is an ordered reliable channel.
    Spawns,
    /// For sync packets.
    ///
    /// This is an unreliable channel.
    Sync,
}

impl From<ReplicationChannel> for Channel {
    fn from(value: ReplicationChannel) -> Self {
        match value {
            ReplicationChannel::Spawns => Channel::Ordered,
            ReplicationChannel::Sync => Channel::Unreliable,
        }
    }
}

/// Channel delivery guarantee.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Channel {
    /// Unreliable and unordered.
    Unreliable,
    /// Reliable and unordered.
    Unordered,
    /// Reliable and ordered.
    Ordered,
}
