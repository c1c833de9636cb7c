//! Block address encoding.
//!
//! An [`Address`] packs a backing file index and a byte offset inside that
//! file into a single `u64`:
//!
//! ```text
//! 63            50 49                                  0
//! +---------------+-------------------------------------+
//! |  file index   |               offset                |
//! +---------------+-------------------------------------+
//! ```
//!
//! The layout is part of the on-disk format: addresses are stored by higher
//! layers, so these constants must not change between releases. Fifty offset
//! bits leave 1 PiB per file; the fourteen file index bits leave room to grow
//! past the current 256 files without touching issued addresses.

use crate::error::{BlockstoreError, BlockstoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of low bits holding the in-file offset.
pub const OFFSET_BITS: u32 = 50;

/// Number of high bits holding the file index.
pub const FILE_INDEX_BITS: u32 = u64::BITS - OFFSET_BITS;

/// Mask selecting the offset bits.
pub const OFFSET_MASK: u64 = (1 << OFFSET_BITS) - 1;

/// Exclusive upper bound on encodable file indices.
pub const MAX_FILE_INDEX: usize = 1 << FILE_INDEX_BITS;

/// Location of a record: file index plus offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(u64);

impl Address {
    /// The "no address" sentinel. Never issued for a record because every
    /// backing file starts with the magic tag.
    pub const NONE: Address = Address(0);

    /// Encodes a file index and offset.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `file_index` does not fit in
    /// [`FILE_INDEX_BITS`] or `offset` does not fit in [`OFFSET_BITS`].
    pub fn encode(file_index: usize, offset: u64) -> BlockstoreResult<Self> {
        if file_index >= MAX_FILE_INDEX {
            return Err(BlockstoreError::invalid_argument(format!(
                "file index {file_index} exceeds {FILE_INDEX_BITS}-bit address field"
            )));
        }
        if offset > OFFSET_MASK {
            return Err(BlockstoreError::invalid_argument(format!(
                "offset {offset} exceeds {OFFSET_BITS}-bit address field"
            )));
        }
        Ok(Self(((file_index as u64) << OFFSET_BITS) | offset))
    }

    /// Splits the address into `(file_index, offset)`.
    #[must_use]
    pub const fn decode(self) -> (usize, u64) {
        (self.file_index(), self.offset())
    }

    /// Returns the file index bits.
    #[must_use]
    pub const fn file_index(self) -> usize {
        (self.0 >> OFFSET_BITS) as usize
    }

    /// Returns the offset bits.
    #[must_use]
    pub const fn offset(self) -> u64 {
        self.0 & OFFSET_MASK
    }

    /// Wraps a raw value previously obtained from [`Address::as_u64`].
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns true for the sentinel.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Returns the address `delta` bytes further into the same file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the new offset overflows the offset field.
    pub fn offset_by(self, delta: u64) -> BlockstoreResult<Self> {
        let offset = self.offset().checked_add(delta).ok_or_else(|| {
            BlockstoreError::invalid_argument("address offset overflow")
        })?;
        Self::encode(self.file_index(), offset)
    }
}

impl From<Address> for u64 {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
