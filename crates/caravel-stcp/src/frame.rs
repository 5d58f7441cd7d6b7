//! # STCP Data Unit
//!
//! An STCP protocol data unit is a serialized bundle preceded by its length:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                   Bundle Length (32, big-endian)              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                   Bundle Data (variable)                      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! A length of zero denotes a keep-alive and carries no payload. There is no
//! trailer, no magic, no version bits.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::FrameError;

/// Size of the length prefix in bytes.
pub const FRAME_HEADER_LEN: usize = 4;

/// The keep-alive data unit: a zero length prefix and nothing else.
pub const KEEP_ALIVE_FRAME: [u8; 4] = [0, 0, 0, 0];

/// Largest bundle a single data unit can carry.
pub const MAX_BUNDLE_LEN: usize = u32::MAX as usize;

/// Frame a bundle as an STCP data unit: 4-byte big-endian length + payload.
pub fn encode_data_unit(bundle: &[u8]) -> Result<Bytes, FrameError> {
    if bundle.len() > MAX_BUNDLE_LEN {
        return Err(FrameError::PayloadTooLarge { len: bundle.len() });
    }
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + bundle.len());
    buf.put_u32(bundle.len() as u32);
    buf.put_slice(bundle);
    Ok(buf.freeze())
}

/// Framed size of a bundle of `bundle_len` bytes.
pub fn framed_len(bundle_len: usize) -> usize {
    FRAME_HEADER_LEN + bundle_len
}
