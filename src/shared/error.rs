use alloc::string::String;

use bevy::prelude::*;
use thiserror::Error;

use super::{net_id::NetId, peer_id::PeerId, scene::StateError, state_codec::CodecError};

/// Error returned by [`ReplicationSession`](crate::session::ReplicationSession) operations.
///
/// See [`Self::kind`] for how each error should be treated.
#[derive(Error, Debug)]
pub enum ReplicationError {
    #[error("packet has {len} bytes, but at least {min} are required")]
    PacketTooShort { len: usize, min: usize },
    #[error("packet declares {declared} bytes, but only {remaining} remain")]
    SizeOverflow { declared: usize, remaining: usize },
    #[error("unknown network command {0}")]
    UnknownCommand(u8),
    #[error("received name `{0}` is not a valid entity name")]
    InvalidName(String),
    #[error("received name is not valid UTF-8")]
    NameEncoding,

    #[error("spawner with path ID {path_id} from {peer} does not exist")]
    UnknownSpawner { peer: PeerId, path_id: u32 },
    #[error("{peer} is not the authority of {target}")]
    Unauthorized { peer: PeerId, target: Entity },
    #[error("{peer} has not spawned an entity with ID {net_id}")]
    UnknownRemoteEntity { peer: PeerId, net_id: NetId },
    #[error("{peer} already spawned an entity with ID {net_id}")]
    NetIdInUse { peer: PeerId, net_id: NetId },
    #[error("spawner {spawner} refused to instantiate an entity for {peer}")]
    InstantiationRefused { peer: PeerId, spawner: Entity },
    #[error("an entity named `{name}` already exists under {parent}")]
    NameTaken { parent: Entity, name: String },
    #[error("{spawn_entity} was spawned with {count} sync IDs that were not consumed by its sync components")]
    UnconsumedSyncIds { spawn_entity: Entity, count: usize },
    #[error("sync component {sync} has no pending ID to consume for {spawn_entity}")]
    MissingPendingSyncId { spawn_entity: Entity, sync: Entity },

    #[error("{0} is not a valid entity")]
    InvalidEntity(Entity),
    #[error("{0} is not a valid spawner")]
    InvalidSpawner(Entity),
    #[error("{0} is not a valid sync component")]
    InvalidSynchronizer(Entity),
    #[error("{entity} is already spawned by {spawner}")]
    AlreadySpawned { entity: Entity, spawner: Entity },
    #[error("{entity} is not spawned by {spawner}")]
    NotSpawnedBy { entity: Entity, spawner: Entity },
    #[error("{0} is not tracked")]
    NotTracked(Entity),
    #[error("sync component {0} has no replication config")]
    MissingConfig(Entity),
    #[error("spawner {0} has no spawn parent")]
    MissingSpawnParent(Entity),
    #[error("{0} is not connected")]
    UnknownPeer(PeerId),

    #[error("{0} has no network ID")]
    MissingNetId(Entity),
    #[error("local peer is not the spawn authority of {0}")]
    NotSpawnAuthority(Entity),

    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    State(#[from] StateError),
}

impl ReplicationError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReplicationError::PacketTooShort { .. }
            | ReplicationError::SizeOverflow { .. }
            | ReplicationError::UnknownCommand(_)
            | ReplicationError::InvalidName(_)
            | ReplicationError::NameEncoding => ErrorKind::Malformed,
            ReplicationError::UnknownSpawner { .. }
            | ReplicationError::Unauthorized { .. }
            | ReplicationError::UnknownRemoteEntity { .. }
            | ReplicationError::NetIdInUse { .. }
            | ReplicationError::InstantiationRefused { .. }
            | ReplicationError::NameTaken { .. }
            | ReplicationError::UnconsumedSyncIds { .. }
            | ReplicationError::MissingPendingSyncId { .. } => ErrorKind::ProtocolViolation,
            ReplicationError::InvalidEntity(_)
            | ReplicationError::InvalidSpawner(_)
            | ReplicationError::InvalidSynchronizer(_)
            | ReplicationError::AlreadySpawned { .. }
            | ReplicationError::NotSpawnedBy { .. }
            | ReplicationError::NotTracked(_)
            | ReplicationError::MissingConfig(_)
            | ReplicationError::MissingSpawnParent(_)
            | ReplicationError::UnknownPeer(_) => ErrorKind::Misuse,
            ReplicationError::MissingNetId(_) | ReplicationError::NotSpawnAuthority(_) => {
                ErrorKind::Internal
            }
            ReplicationError::Codec(_) | ReplicationError::State(_) => ErrorKind::Data,
        }
    }
}

/// Category of a [`ReplicationError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The packet is malformed, only this packet is rejected.
    Malformed,
    /// The sender is unauthorized or desynced.
    ///
    /// The packet is rejected, but such errors are worth logging since they often
    /// indicate a hostile peer.
    ProtocolViolation,
    /// The calling layer used the API incorrectly.
    Misuse,
    /// Tracked state is inconsistent with the scene.
    Internal,
    /// Property values couldn't be encoded, decoded or applied.
    Data,
}
