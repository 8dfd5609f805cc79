use core::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Identifier of a connected peer assigned by the transport.
///
/// Broadcast targets are expressed as `Option<PeerId>` where [`None`] means every peer,
/// so there is no reserved "zero" value.
#[derive(
    Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PeerId(u32);

impl PeerId {
    /// The peer that hosts the session.
    pub const SERVER: Self = Self(1);

    /// Creates a new ID wrapping the given value.
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Gets the value of this ID.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "peer {}", self.0)
    }
}
