use alloc::collections::BTreeSet;

use log::{debug, warn};

use super::peer_id::PeerId;

/// Controls which peers a sync component (and the entity it belongs to) is visible to.
///
/// Sync components can embed it to implement
/// [`Synchronizer::is_visible_to`](super::scene::Synchronizer::is_visible_to).
/// After changing visibility, notify the session with
/// [`ReplicationSession::on_visibility_changed`](crate::session::ReplicationSession::on_visibility_changed).
///
/// # Examples
///
/// ```
/// use replicon_scene::prelude::*;
///
/// let mut visibility = PeerVisibility::new(VisibilityPolicy::Whitelist);
/// visibility.set_visibility(PeerId::new(2), true);
///
/// assert!(visibility.is_visible_to(Some(PeerId::new(2))));
/// assert!(!visibility.is_visible_to(Some(PeerId::new(3))));
/// assert!(!visibility.is_visible_to(None), "not visible to everyone");
/// ```
#[derive(Clone, Debug, Default)]
pub struct PeerVisibility {
    /// Wrapped enum to make its fields private.
    filter: VisibilityFilter,
}

impl PeerVisibility {
    pub fn new(policy: VisibilityPolicy) -> Self {
        let filter = match policy {
            VisibilityPolicy::All => VisibilityFilter::All,
            VisibilityPolicy::Blacklist => VisibilityFilter::Blacklist(Default::default()),
            VisibilityPolicy::Whitelist => VisibilityFilter::Whitelist(Default::default()),
        };

        Self { filter }
    }

    /// Returns the policy this instance was created with.
    pub fn policy(&self) -> VisibilityPolicy {
        match self.filter {
            VisibilityFilter::All => VisibilityPolicy::All,
            VisibilityFilter::Blacklist(_) => VisibilityPolicy::Blacklist,
            VisibilityFilter::Whitelist(_) => VisibilityPolicy::Whitelist,
        }
    }

    /// Sets visibility for a specific peer.
    ///
    /// Does nothing if the policy is set to [`VisibilityPolicy::All`].
    pub fn set_visibility(&mut self, peer: PeerId, visible: bool) {
        match &mut self.filter {
            VisibilityFilter::All => {
                if visible {
                    debug!(
                        "ignoring visibility enable for {peer} due to {:?}",
                        VisibilityPolicy::All
                    );
                } else {
                    warn!(
                        "ignoring visibility disable for {peer} due to {:?}",
                        VisibilityPolicy::All
                    );
                }
            }
            VisibilityFilter::Blacklist(list) => {
                if visible {
                    list.remove(&peer);
                } else {
                    list.insert(peer);
                }
            }
            VisibilityFilter::Whitelist(list) => {
                if visible {
                    list.insert(peer);
                } else {
                    list.remove(&peer);
                }
            }
        }
    }

    /// Checks visibility for a specific peer or, if `peer` is [`None`], for every peer.
    pub fn is_visible_to(&self, peer: Option<PeerId>) -> bool {
        match (&self.filter, peer) {
            (VisibilityFilter::All, _) => true,
            (VisibilityFilter::Blacklist(list), Some(peer)) => !list.contains(&peer),
            (VisibilityFilter::Blacklist(list), None) => list.is_empty(),
            (VisibilityFilter::Whitelist(list), Some(peer)) => list.contains(&peer),
            (VisibilityFilter::Whitelist(_), None) => false,
        }
    }
}

/// Default visibility for peers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VisibilityPolicy {
    /// All peers see the component.
    #[default]
    All,
    /// All peers see the component except the listed ones.
    Blacklist,
    /// Only the listed peers see the component.
    Whitelist,
}

/// Filter for [`PeerVisibility`] based on [`VisibilityPolicy`].
#[derive(Clone, Debug, Default)]
enum VisibilityFilter {
    #[default]
    All,
    Blacklist(BTreeSet<PeerId>),
    Whitelist(BTreeSet<PeerId>),
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    const PEER: PeerId = PeerId::new(2);

    #[test]
    fn all() {
        let mut visibility = PeerVisibility::default();
        assert_eq!(visibility.policy(), VisibilityPolicy::All);
        visibility.set_visibility(PEER, false);
        assert!(visibility.is_visible_to(Some(PEER)));
        assert!(visibility.is_visible_to(None));
    }

    #[test]
    fn blacklist() {
        let mut visibility = PeerVisibility::new(VisibilityPolicy::Blacklist);
        assert!(visibility.is_visible_to(None));

        visibility.set_visibility(PEER, false);
        assert!(!visibility.is_visible_to(Some(PEER)));
        assert!(visibility.is_visible_to(Some(PeerId::new(3))));
        assert!(!visibility.is_visible_to(None));

        visibility.set_visibility(PEER, true);
        assert!(visibility.is_visible_to(Some(PEER)));
        assert!(visibility.is_visible_to(None));
    }

    #[test]
    fn whitelist() {
        let mut visibility = PeerVisibility::new(VisibilityPolicy::Whitelist);
        assert!(!visibility.is_visible_to(Some(PEER)));

        visibility.set_visibility(PEER, true);
        assert!(visibility.is_visible_to(Some(PEER)));
        assert!(!visibility.is_visible_to(None));

        visibility.set_visibility(PEER, false);
        assert!(!visibility.is_visible_to(Some(PEER)));
    }
}
