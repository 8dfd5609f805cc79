use bevy::prelude::*;

use super::super::peer_id::PeerId;

/// Gives short integer IDs to remotely addressable objects (spawners and sync components).
///
/// Each side announces its IDs to a peer before using them and the peer confirms
/// them, so IDs are always scoped by the peer that sent them.
pub trait PathCache {
    /// Returns the local ID for `target`, allocating one if needed.
    fn make_local_id(&mut self, target: Entity) -> u32;

    /// Announces the ID of `target` to `peer` if it wasn't announced yet.
    ///
    /// The returned [`PathConfirm::confirmed`] becomes `true` only after the peer
    /// confirmed the announcement.
    fn send_and_confirm(&mut self, target: Entity, peer: PeerId) -> PathConfirm;

    /// Resolves an ID announced by `peer` to a local object.
    fn resolve(&self, peer: PeerId, id: u32) -> Option<Entity>;
}

/// Result of [`PathCache::send_and_confirm`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathConfirm {
    pub id: u32,
    pub confirmed: bool,
}
