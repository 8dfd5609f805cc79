use super::error::ReplicationError;

/// First byte of every packet handled by the replication session.
///
/// Other values belong to other layers sharing the same transport framing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum NetworkCommand {
    Spawn = 4,
    Despawn = 5,
    Sync = 6,
}

impl TryFrom<u8> for NetworkCommand {
    type Error = ReplicationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(Self::Spawn),
            5 => Ok(Self::Despawn),
            6 => Ok(Self::Sync),
            _ => Err(ReplicationError::UnknownCommand(value)),
        }
    }
}

impl From<NetworkCommand> for u8 {
    fn from(value: NetworkCommand) -> Self {
        value as u8
    }
}
