use alloc::vec::Vec;
use core::str;

use bytes::{Buf, BufMut};

use crate::shared::{
    command::NetworkCommand, error::ReplicationError, net_id::NetId, scene,
};

/// Scene ID that marks a spawn from a custom argument.
pub const CUSTOM_SCENE_ID: u8 = u8::MAX;

/// Announces that an entity exists.
///
/// Layout, all integers are little-endian:
///
/// | Field              | Size               |
/// |--------------------|--------------------|
/// | command            | 1                  |
/// | scene ID           | 1                  |
/// | spawner path ID    | 4                  |
/// | entity ID          | 4                  |
/// | sync ID count      | 4                  |
/// | name length        | 4                  |
/// | sync IDs           | 4 × count          |
/// | name               | name length        |
/// | argument size      | 4, custom only     |
/// | argument           | size, custom only  |
/// | spawn state        | rest of the packet |
///
/// The name length is the number of UTF-8 bytes without a terminator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpawnMessage<'a> {
    pub source: SpawnSource<'a>,
    pub spawner_path_id: u32,
    pub net_id: NetId,
    pub sync_ids: Vec<NetId>,
    pub name: &'a str,
    /// Encoded spawn properties of all sync components in order of [`Self::sync_ids`].
    pub state: &'a [u8],
}

/// How the receiver should instantiate the entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpawnSource<'a> {
    /// Index of a spawnable scene.
    Scene(u8),
    /// Encoded custom argument.
    Custom(&'a [u8]),
}

impl<'a> SpawnMessage<'a> {
    /// Size of all fixed fields.
    pub const MIN_SIZE: usize = 18;

    /// Returns the exact size of the packet.
    pub fn size(&self) -> usize {
        let custom_size = match self.source {
            SpawnSource::Scene(_) => 0,
            SpawnSource::Custom(arg) => size_of::<u32>() + arg.len(),
        };

        Self::MIN_SIZE
            + self.sync_ids.len() * size_of::<u32>()
            + self.name.len()
            + custom_size
            + self.state.len()
    }

    /// Replaces content of `packet` with the serialized message.
    pub fn write(&self, packet: &mut Vec<u8>) {
        packet.clear();
        packet.reserve(self.size());

        let scene_id = match self.source {
            SpawnSource::Scene(id) => id,
            SpawnSource::Custom(_) => CUSTOM_SCENE_ID,
        };

        packet.put_u8(NetworkCommand::Spawn.into());
        packet.put_u8(scene_id);
        packet.put_u32_le(self.spawner_path_id);
        packet.put_u32_le(self.net_id.get());
        packet.put_u32_le(self.sync_ids.len() as u32);
        packet.put_u32_le(self.name.len() as u32);
        for sync_id in &self.sync_ids {
            packet.put_u32_le(sync_id.get());
        }
        packet.put_slice(self.name.as_bytes());
        if let SpawnSource::Custom(arg) = self.source {
            packet.put_u32_le(arg.len() as u32);
            packet.put_slice(arg);
        }
        packet.put_slice(self.state);
    }

    /// Parses a spawn packet.
    ///
    /// Rejects packets with declared sizes that exceed the packet and names
    /// that are not valid entity names.
    pub fn read(packet: &'a [u8]) -> Result<Self, ReplicationError> {
        if packet.len() < Self::MIN_SIZE {
            return Err(ReplicationError::PacketTooShort {
                len: packet.len(),
                min: Self::MIN_SIZE,
            });
        }

        let mut buf = &packet[1..];
        let scene_id = buf.get_u8();
        let spawner_path_id = buf.get_u32_le();
        let net_id = NetId::new(buf.get_u32_le());
        let sync_count = buf.get_u32_le() as usize;
        let name_len = buf.get_u32_le() as usize;

        let declared = sync_count
            .checked_mul(size_of::<u32>())
            .and_then(|ids_size| ids_size.checked_add(name_len))
            .unwrap_or(usize::MAX);
        if declared > buf.remaining() {
            return Err(ReplicationError::SizeOverflow {
                declared,
                remaining: buf.remaining(),
            });
        }

        let sync_ids = (0..sync_count)
            .map(|_| NetId::new(buf.get_u32_le()))
            .collect();

        let (name_bytes, rest) = buf.split_at(name_len);
        buf = rest;
        let name = str::from_utf8(name_bytes).map_err(|_| ReplicationError::NameEncoding)?;
        if !scene::is_valid_name(name) {
            return Err(ReplicationError::InvalidName(name.into()));
        }

        let source = if scene_id == CUSTOM_SCENE_ID {
            if buf.remaining() < size_of::<u32>() {
                return Err(ReplicationError::PacketTooShort {
                    len: packet.len(),
                    min: packet.len() - buf.remaining() + size_of::<u32>(),
                });
            }
            let arg_size = buf.get_u32_le() as usize;
            if arg_size > buf.remaining() {
                return Err(ReplicationError::SizeOverflow {
                    declared: arg_size,
                    remaining: buf.remaining(),
                });
            }
            let (arg, rest) = buf.split_at(arg_size);
            buf = rest;
            SpawnSource::Custom(arg)
        } else {
            SpawnSource::Scene(scene_id)
        };

        Ok(Self {
            source,
            spawner_path_id,
            net_id,
            sync_ids,
            name,
            state: buf,
        })
    }
}

/// Announces that an entity no longer exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DespawnMessage {
    pub net_id: NetId,
}

impl DespawnMessage {
    pub const SIZE: usize = 5;

    pub fn write(&self, packet: &mut Vec<u8>) {
        packet.clear();
        packet.reserve(Self::SIZE);
        packet.put_u8(NetworkCommand::Despawn.into());
        packet.put_u32_le(self.net_id.get());
    }

    pub fn read(packet: &[u8]) -> Result<Self, ReplicationError> {
        if packet.len() < Self::SIZE {
            return Err(ReplicationError::PacketTooShort {
                len: packet.len(),
                min: Self::SIZE,
            });
        }

        let mut buf = &packet[1..];
        Ok(Self {
            net_id: NetId::new(buf.get_u32_le()),
        })
    }
}
