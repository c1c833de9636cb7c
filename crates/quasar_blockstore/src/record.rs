//! On-disk record framing.
//!
//! ```text
//! +-------------+----------------------+
//! | len: u16 LE | payload: len bytes   |
//! +-------------+----------------------+
//! ```

use crate::error::{BlockstoreError, BlockstoreResult};

/// Size of the length header.
pub const HEADER_SIZE: usize = 2;

/// Largest payload a record can carry.
pub const MAX_RECORD_LEN: usize = u16::MAX as usize;

/// Encodes the length header for a payload.
///
/// # Errors
///
/// Returns `InvalidArgument` if the payload is longer than [`MAX_RECORD_LEN`].
pub fn encode_header(payload_len: usize) -> BlockstoreResult<[u8; HEADER_SIZE]> {
    let len = u16::try_from(payload_len).map_err(|_| {
        BlockstoreError::invalid_argument(format!(
            "record of {payload_len} bytes exceeds maximum of {MAX_RECORD_LEN}"
        ))
    })?;
    Ok(len.to_le_bytes())
}

/// Decodes the payload length from the first two bytes of `bytes`.
///
/// Returns `None` if fewer than [`HEADER_SIZE`] bytes are given.
#[must_use]
pub fn decode_header(bytes: &[u8]) -> Option<usize> {
    match bytes {
        [lo, hi, ..] => Some(u16::from_le_bytes([*lo, *hi]) as usize),
        _ => None,
    }
}

/// Total bytes a payload occupies on disk.
#[must_use]
pub const fn encoded_len(payload_len: usize) -> u64 {
    (HEADER_SIZE + payload_len) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn header_is_little_endian() {
        assert_eq!(encode_header(0x0102).unwrap(), [0x02, 0x01]);
        assert_eq!(decode_header(&[0x02, 0x01, 0xff]), Some(0x0102));
    }

    #[test]
    fn header_limits() {
        assert_eq!(encode_header(0).unwrap(), [0, 0]);
        assert_eq!(encode_header(MAX_RECORD_LEN).unwrap(), [0xff, 0xff]);
        assert!(matches!(
            encode_header(MAX_RECORD_LEN + 1),
            Err(BlockstoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn short_header_is_none() {
        assert_eq!(decode_header(&[]), None);
        assert_eq!(decode_header(&[7]), None);
    }

    #[test]
    fn encoded_len_counts_header() {
        assert_eq!(encoded_len(0), 2);
        assert_eq!(encoded_len(3), 5);
    }

    proptest! {
        #[test]
        fn header_round_trips(len in 0usize..=MAX_RECORD_LEN) {
            let header = encode_header(len).unwrap();
            prop_assert_eq!(decode_header(&header), Some(len));
        }
    }
}
