use alloc::{string::String, vec::Vec};

use thiserror::Error;

use super::{postcard_utils, replication_config::PropertyValue};

/// Encodes and decodes ordered lists of property values.
///
/// Several encoded lists can be concatenated. The spawn packet stores the
/// spawn properties of all sync components of an entity as a single encoded list
/// and the receiver decodes it in per-component slices, so [`Self::decode`] must
/// be able to decode a prefix and report how many bytes it consumed.
pub trait StateCodec {
    /// Appends encoded `values` to `out`.
    fn encode(&self, values: &[PropertyValue], out: &mut Vec<u8>) -> Result<(), CodecError>;

    /// Decodes `count` values from the start of `bytes`.
    ///
    /// Returns the values and the number of consumed bytes.
    fn decode(&self, bytes: &[u8], count: usize)
    -> Result<(Vec<PropertyValue>, usize), CodecError>;
}

/// Default [`StateCodec`] that writes values back-to-back with postcard.
#[derive(Clone, Copy, Debug, Default)]
pub struct PostcardCodec;

impl StateCodec for PostcardCodec {
    fn encode(&self, values: &[PropertyValue], out: &mut Vec<u8>) -> Result<(), CodecError> {
        for value in values {
            postcard_utils::to_extend_mut(value, out)?;
        }

        Ok(())
    }

    fn decode(
        &self,
        bytes: &[u8],
        count: usize,
    ) -> Result<(Vec<PropertyValue>, usize), CodecError> {
        let mut buf = bytes;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(postcard_utils::take_from_slice(&mut buf)?);
        }

        Ok((values, bytes.len() - buf.len()))
    }
}

/// Error returned by a [`StateCodec`].
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("unable to serialize values: {0}")]
    Postcard(#[from] postcard::Error),
    #[error("expected {expected} values, but got {actual}")]
    CountMismatch { expected: usize, actual: usize },
    #[error("{0}")]
    Custom(String),
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn prefix_decoding() {
        let first = [PropertyValue::Int(1), PropertyValue::String("a".into())];
        let second = [PropertyValue::Vector2([1.0, 2.0])];

        let mut bytes = Vec::new();
        PostcardCodec.encode(&first, &mut bytes).unwrap();
        let first_len = bytes.len();
        PostcardCodec.encode(&second, &mut bytes).unwrap();

        let (values, consumed) = PostcardCodec.decode(&bytes, first.len()).unwrap();
        assert_eq!(values, first);
        assert_eq!(consumed, first_len);

        let (values, consumed) = PostcardCodec.decode(&bytes[consumed..], 1).unwrap();
        assert_eq!(values, second);
        assert_eq!(consumed, bytes.len() - first_len);
    }

    #[test]
    fn truncated() {
        let mut bytes = Vec::new();
        PostcardCodec
            .encode(&[PropertyValue::String("value".into())], &mut bytes)
            .unwrap();
        bytes.pop();

        assert!(PostcardCodec.decode(&bytes, 1).is_err());
    }
}
