//! # Quasar Blockstore
//!
//! File-pool block storage for the Quasar time-series database.
//!
//! This crate is the lowest storage layer. It persists opaque,
//! length-prefixed records across a fixed pool of backing files and returns a
//! 64-bit [`Address`] for each one. The address alone is enough to read the
//! record back later; no separate index exists.
//!
//! ## Components
//!
//! - [`Address`] - packs a file index and in-file offset into a `u64`
//! - [`FilePool`] - owns the backing files and leases them to writers
//! - [`Segment`] - an exclusive write lease with an ordered background writer
//! - [`FilePool::read`] - two-phase, per-file synchronized record reads
//!
//! ## Example
//!
//! ```no_run
//! use quasar_blockstore::{Config, FilePool};
//! use std::path::Path;
//!
//! let path = Path::new("/var/lib/quasar");
//! let config = Config::default();
//!
//! match FilePool::create_database(path, &config) {
//!     Ok(()) => {}
//!     Err(e) if e.is_already_exists() => {}
//!     Err(e) => return Err(e),
//! }
//!
//! let pool = FilePool::open(path, config)?;
//! let mut segment = pool.lock_segment()?;
//! let first = segment.write(b"hello")?;
//! let second = segment.write(b"world")?;
//! segment.unlock()?;
//!
//! assert_eq!(pool.read_to_vec(first)?, b"hello");
//! assert_eq!(pool.read_to_vec(second)?, b"world");
//! # Ok::<(), quasar_blockstore::BlockstoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod address;
mod config;
mod error;
pub mod layout;
mod metadata;
mod pool;
mod reader;
pub mod record;
mod segment;

pub use address::{Address, FILE_INDEX_BITS, MAX_FILE_INDEX, OFFSET_BITS, OFFSET_MASK};
pub use config::{
    Config, DEFAULT_FILE_COUNT, DEFAULT_FIRST_READ_SIZE, DEFAULT_WRITE_QUEUE_DEPTH, MAX_FILE_COUNT,
};
pub use error::{BlockstoreError, BlockstoreResult};
pub use layout::{DATA_START, MAGIC_TAG};
pub use metadata::{StreamInfo, StreamMetadata};
pub use pool::FilePool;
pub use segment::Segment;
