use super::{
    backend::{path_cache::PathCache, transport::Transport},
    peer_id::PeerId,
    scene::SceneTree,
    state_codec::StateCodec,
};

/// External collaborators of the [`ReplicationSession`](crate::session::ReplicationSession).
///
/// Passed to every session operation instead of being stored inside the session,
/// so the caller keeps ownership of the scene between calls.
pub struct ReplicationCtx<'a> {
    pub scene: &'a mut dyn SceneTree,
    pub transport: &'a mut dyn Transport,
    pub path_cache: &'a mut dyn PathCache,
    pub codec: &'a dyn StateCodec,
}

impl ReplicationCtx<'_> {
    /// Returns `true` if the local peer is `authority`.
    pub(crate) fn is_local(&self, authority: PeerId) -> bool {
        self.transport.unique_id() == authority
    }
}
