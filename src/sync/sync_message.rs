use alloc::vec::Vec;

use bytes::{Buf, BufMut};

use crate::shared::{
    command::NetworkCommand, error::ReplicationError, net_id::NetId, sync_tick::SyncTick,
};

/// Size of the command and the tick.
pub const HEADER_SIZE: usize = 3;

/// Size of the ID and the payload size preceding each entry.
pub const ENTRY_HEADER_SIZE: usize = 8;

/// Smallest packet that can carry an entry.
pub const MIN_SIZE: usize = HEADER_SIZE + ENTRY_HEADER_SIZE;

/// Packs sync states of multiple components into packets of limited size.
///
/// Layout, all integers are little-endian:
///
/// | Field   | Size               |
/// |---------|--------------------|
/// | command | 1                  |
/// | tick    | 2                  |
/// | entries | rest of the packet |
///
/// Each entry is an ID (4 bytes), a payload size (4 bytes) and the payload.
pub(crate) struct SyncWriter<'a> {
    packet: &'a mut Vec<u8>,
    max_size: usize,
}

impl<'a> SyncWriter<'a> {
    pub(crate) fn new(packet: &'a mut Vec<u8>, tick: SyncTick, max_size: usize) -> Self {
        packet.clear();
        packet.reserve(max_size);
        packet.put_u8(NetworkCommand::Sync.into());
        packet.put_u16_le(tick.get());

        Self { packet, max_size }
    }

    /// Returns `true` if an entry with this payload fits into an empty packet.
    pub(crate) fn can_fit(&self, payload_size: usize) -> bool {
        MIN_SIZE + payload_size <= self.max_size
    }

    /// Returns `true` if an entry with this payload doesn't fit into the current packet.
    pub(crate) fn is_full(&self, payload_size: usize) -> bool {
        self.packet.len() + ENTRY_HEADER_SIZE + payload_size > self.max_size
    }

    pub(crate) fn has_entries(&self) -> bool {
        self.packet.len() > HEADER_SIZE
    }

    pub(crate) fn write_entry(&mut self, net_id: NetId, payload: &[u8]) {
        self.packet.put_u32_le(net_id.get());
        self.packet.put_u32_le(payload.len() as u32);
        self.packet.put_slice(payload);
    }

    pub(crate) fn packet(&self) -> &[u8] {
        &self.packet[..]
    }

    /// Removes all entries, keeping the header.
    pub(crate) fn clear(&mut self) {
        self.packet.truncate(HEADER_SIZE);
    }
}

/// Iterates over entries of a sync packet.
pub(crate) struct SyncReader<'a> {
    buf: &'a [u8],
    tick: SyncTick,
}

impl<'a> SyncReader<'a> {
    pub(crate) fn new(packet: &'a [u8]) -> Result<Self, ReplicationError> {
        if packet.len() < MIN_SIZE {
            return Err(ReplicationError::PacketTooShort {
                len: packet.len(),
                min: MIN_SIZE,
            });
        }

        let mut buf = &packet[1..];
        let tick = SyncTick::new(buf.get_u16_le());

        Ok(Self { buf, tick })
    }

    pub(crate) fn tick(&self) -> SyncTick {
        self.tick
    }

    /// Returns the next entry or [`None`] if there are not enough bytes for another one.
    ///
    /// Fails if the declared payload size exceeds the remaining bytes.
    pub(crate) fn next_entry(&mut self) -> Result<Option<(NetId, &'a [u8])>, ReplicationError> {
        if self.buf.remaining() < ENTRY_HEADER_SIZE {
            return Ok(None);
        }

        let net_id = NetId::new(self.buf.get_u32_le());
        let size = self.buf.get_u32_le() as usize;
        if size > self.buf.remaining() {
            return Err(ReplicationError::SizeOverflow {
                declared: size,
                remaining: self.buf.remaining(),
            });
        }

        let (payload, rest) = self.buf.split_at(size);
        self.buf = rest;

        Ok(Some((net_id, payload)))
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn entries() {
        let mut packet = Vec::new();
        let mut writer = SyncWriter::new(&mut packet, SyncTick::new(7), 100);
        assert!(!writer.has_entries());
        writer.write_entry(NetId::new(1), &[1, 2]);
        writer.write_entry(NetId::from_path(3), &[3]);
        assert!(writer.has_entries());

        let mut reader = SyncReader::new(&packet).unwrap();
        assert_eq!(reader.tick(), SyncTick::new(7));
        assert_eq!(
            reader.next_entry().unwrap(),
            Some((NetId::new(1), &[1, 2][..]))
        );
        assert_eq!(
            reader.next_entry().unwrap(),
            Some((NetId::from_path(3), &[3][..]))
        );
        assert_eq!(reader.next_entry().unwrap(), None);
    }

    #[test]
    fn limits() {
        let mut packet = Vec::new();
        let mut writer = SyncWriter::new(&mut packet, SyncTick::new(0), 30);
        assert!(writer.can_fit(19));
        assert!(!writer.can_fit(20));

        writer.write_entry(NetId::new(1), &[0; 4]);
        assert!(!writer.is_full(7));
        assert!(writer.is_full(8));

        writer.clear();
        assert!(!writer.has_entries());
        assert_eq!(writer.packet().len(), HEADER_SIZE);
    }

    #[test]
    fn too_short() {
        let error = SyncReader::new(&[6, 0, 0]).err().unwrap();
        assert!(matches!(
            error,
            ReplicationError::PacketTooShort { len: 3, min: 11 }
        ));
    }

    #[test]
    fn size_overflow() {
        let mut packet = Vec::new();
        SyncWriter::new(&mut packet, SyncTick::new(0), 100).write_entry(NetId::new(1), &[1, 2]);
        packet.truncate(packet.len() - 1);

        let mut reader = SyncReader::new(&packet).unwrap();
        assert!(matches!(
            reader.next_entry(),
            Err(ReplicationError::SizeOverflow {
                declared: 2,
                remaining: 1
            })
        ));
    }
}
