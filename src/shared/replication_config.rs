use alloc::{
    borrow::{Borrow, Cow},
    string::String,
    vec::Vec,
};
use core::fmt::{self, Display, Formatter};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Path to a property of an entity, relative to the sync component's root.
///
/// Interpreted only by the [`SceneTree`](super::scene::SceneTree).
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyPath(Cow<'static, str>);

impl PropertyPath {
    /// Creates a path from a static string without allocating.
    pub const fn from_static(path: &'static str) -> Self {
        Self(Cow::Borrowed(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for PropertyPath {
    fn from(value: &'static str) -> Self {
        Self::from_static(value)
    }
}

impl From<String> for PropertyPath {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

impl Borrow<str> for PropertyPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Display for PropertyPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A dynamically typed property value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    Bytes(Vec<u8>),
    Array(Vec<PropertyValue>),
}

bitflags! {
    /// When a property is replicated.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct PropertyFlags: u8 {
        /// Sent once inside the spawn packet.
        const SPAWN = 0b00000001;
        /// Sent with every sync update.
        const SYNC = 0b00000010;
    }
}

/// Ordered list of properties replicated by a sync component.
///
/// The order is part of the protocol: both sides must use the same configuration
/// for a sync component.
///
/// # Examples
///
/// ```
/// use replicon_scene::prelude::*;
///
/// let config = ReplicationConfig::default()
///     .with_property("position", PropertyFlags::SPAWN | PropertyFlags::SYNC)
///     .with_property("color", PropertyFlags::SPAWN);
///
/// assert_eq!(config.spawn_properties().count(), 2);
/// assert_eq!(config.sync_properties().count(), 1);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplicationConfig {
    properties: Vec<(PropertyPath, PropertyFlags)>,
}

impl ReplicationConfig {
    /// Adds a property or updates flags of the existing one.
    pub fn add_property(&mut self, path: impl Into<PropertyPath>, flags: PropertyFlags) {
        let path = path.into();
        if let Some((_, existing)) = self.properties.iter_mut().find(|(p, _)| *p == path) {
            *existing = flags;
        } else {
            self.properties.push((path, flags));
        }
    }

    /// Same as [`Self::add_property`], but returns `self` for chaining.
    #[must_use]
    pub fn with_property(mut self, path: impl Into<PropertyPath>, flags: PropertyFlags) -> Self {
        self.add_property(path, flags);
        self
    }

    /// Removes a property from the configuration.
    pub fn remove_property(&mut self, path: &PropertyPath) {
        self.properties.retain(|(p, _)| p != path);
    }

    /// Returns properties that are sent inside the spawn packet.
    pub fn spawn_properties(&self) -> impl Iterator<Item = &PropertyPath> {
        self.filtered(PropertyFlags::SPAWN)
    }

    /// Returns properties that are sent with sync updates.
    pub fn sync_properties(&self) -> impl Iterator<Item = &PropertyPath> {
        self.filtered(PropertyFlags::SYNC)
    }

    fn filtered(&self, flag: PropertyFlags) -> impl Iterator<Item = &PropertyPath> {
        self.properties
            .iter()
            .filter(move |(_, flags)| flags.contains(flag))
            .map(|(path, _)| path)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn property_order() {
        let mut config = ReplicationConfig::default()
            .with_property("a", PropertyFlags::SYNC)
            .with_property("b", PropertyFlags::SPAWN | PropertyFlags::SYNC)
            .with_property("c", PropertyFlags::SPAWN);

        let sync: Vec<_> = config.sync_properties().map(PropertyPath::as_str).collect();
        assert_eq!(sync, ["a", "b"]);

        config.add_property("a", PropertyFlags::SPAWN);
        let spawn: Vec<_> = config.spawn_properties().map(PropertyPath::as_str).collect();
        assert_eq!(spawn, ["a", "b", "c"], "updating flags should keep the order");

        config.remove_property(&"b".into());
        assert_eq!(config.sync_properties().count(), 0);
    }
}
