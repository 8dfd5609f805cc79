use core::fmt::{self, Display, Formatter};

use log::debug;
use serde::{Deserialize, Serialize};

/// Protocol-level identifier of an entity or a sync component.
///
/// There are two identifier spaces:
///
/// - Sequential IDs allocated by the spawn authority with [`NetIdAllocator`].
/// - Path-based IDs derived from the [`PathCache`](super::backend::path_cache::PathCache).
///   They have the [`Self::PATH_FLAG`] bit set, so they never collide with sequential IDs
///   that share the same lower 31 bits.
///
/// Zero is reserved for [`Self::NONE`].
#[derive(
    Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NetId(u32);

impl NetId {
    /// Unassigned ID.
    pub const NONE: Self = Self(0);

    /// Marks an ID as path-based.
    pub const PATH_FLAG: u32 = 0x8000_0000;

    /// Creates an ID from its wire representation.
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Creates a path-based ID from a path cache ID.
    pub const fn from_path(path_id: u32) -> Self {
        Self(path_id | Self::PATH_FLAG)
    }

    /// Returns the wire representation.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns `true` if the ID was not assigned yet.
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the ID was derived from a path.
    pub const fn is_path_based(self) -> bool {
        self.0 & Self::PATH_FLAG != 0
    }

    /// Returns the path cache ID without the flag.
    pub const fn path_id(self) -> u32 {
        self.0 & !Self::PATH_FLAG
    }
}

impl Display for NetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_path_based() {
            write!(f, "path:{}", self.path_id())
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Allocates sequential [`NetId`]s on the spawn authority.
///
/// IDs are never reused within a session, only [`Self::reset`] starts the sequence over.
#[derive(Default, Debug)]
pub struct NetIdAllocator {
    last: u32,
}

impl NetIdAllocator {
    /// Returns the next free ID.
    pub fn allocate(&mut self) -> NetId {
        self.last += 1;
        debug_assert_eq!(
            self.last & NetId::PATH_FLAG,
            0,
            "sequential IDs shouldn't overflow into path-based IDs"
        );
        NetId(self.last)
    }

    /// Starts the sequence over.
    pub fn reset(&mut self) {
        debug!("resetting network ID allocator at {}", self.last);
        self.last = 0;
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn allocation() {
        let mut allocator = NetIdAllocator::default();
        assert_eq!(allocator.allocate(), NetId::new(1));
        assert_eq!(allocator.allocate(), NetId::new(2));

        allocator.reset();
        assert_eq!(allocator.allocate(), NetId::new(1));
    }

    #[test]
    fn path_based() {
        let sequential = NetId::new(5);
        let path_based = NetId::from_path(5);
        assert!(!sequential.is_path_based());
        assert!(path_based.is_path_based());
        assert_ne!(sequential, path_based);
        assert_eq!(path_based.path_id(), sequential.get());
        assert_eq!(path_based.get(), 0x8000_0005);
    }
}
