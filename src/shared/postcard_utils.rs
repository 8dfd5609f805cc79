//! Postcard helpers that append to and consume from reusable buffers.
//!
//! Used by [`PostcardCodec`](super::state_codec::PostcardCodec) to pack several
//! values back-to-back without intermediate allocations.

use alloc::vec::Vec;

use postcard::ser_flavors::Flavor;
use serde::{Deserialize, Serialize};

/// Serializes a value to the end of `out`.
///
/// Similar to [`postcard::to_extend`], but keeps ownership of the buffer, so it can be reused.
/// On error, `out` may contain a partially written value.
///
/// See also [`take_from_slice`].
///
/// # Examples
///
/// ```
/// use replicon_scene::{prelude::*, shared::postcard_utils};
///
/// let mut state = vec![0xFF];
/// postcard_utils::to_extend_mut(&PropertyValue::Bool(true), &mut state).unwrap();
/// assert_eq!(state[0], 0xFF, "existing bytes should be kept");
/// assert!(state.len() > 1);
/// ```
pub fn to_extend_mut<T: Serialize + ?Sized>(value: &T, out: &mut Vec<u8>) -> postcard::Result<()> {
    postcard::serialize_with_flavor(value, AppendFlavor { out })
}

/// Deserializes a value from the start of `buf` and advances it past the consumed bytes.
///
/// Similar to [`postcard::take_from_bytes`], but updates the slice in place.
/// On error, `buf` is left untouched.
///
/// # Examples
///
/// ```
/// use replicon_scene::{prelude::*, shared::postcard_utils};
///
/// let mut state = Vec::new();
/// postcard_utils::to_extend_mut(&PropertyValue::Int(1), &mut state).unwrap();
/// postcard_utils::to_extend_mut(&PropertyValue::Int(2), &mut state).unwrap();
///
/// let mut buf = &state[..];
/// let first: PropertyValue = postcard_utils::take_from_slice(&mut buf).unwrap();
/// let second: PropertyValue = postcard_utils::take_from_slice(&mut buf).unwrap();
/// assert_eq!(first, PropertyValue::Int(1));
/// assert_eq!(second, PropertyValue::Int(2));
/// assert!(buf.is_empty());
/// ```
pub fn take_from_slice<'de, T: Deserialize<'de>>(buf: &mut &'de [u8]) -> postcard::Result<T> {
    let (value, rest) = postcard::take_from_bytes(*buf)?;
    *buf = rest;
    Ok(value)
}

/// Serialization flavor that appends to a borrowed [`Vec`].
struct AppendFlavor<'a> {
    out: &'a mut Vec<u8>,
}

impl Flavor for AppendFlavor<'_> {
    type Output = ();

    fn try_push(&mut self, data: u8) -> postcard::Result<()> {
        self.out.push(data);
        Ok(())
    }

    fn try_extend(&mut self, data: &[u8]) -> postcard::Result<()> {
        self.out.extend_from_slice(data);
        Ok(())
    }

    fn finalize(self) -> postcard::Result<Self::Output> {
        Ok(())
    }
}
