//! Stream metadata contract.
//!
//! The database above the blockstore also needs stream registration,
//! collection listing, annotations and versioned superblocks. The file
//! blockstore stores none of these; [`FilePool`] implements the trait by
//! returning [`BlockstoreError::Unsupported`] so callers find out immediately
//! instead of silently losing data.

use crate::error::{BlockstoreError, BlockstoreResult};
use crate::pool::FilePool;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Descriptor of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Stream identifier.
    pub uuid: Uuid,
    /// Collection the stream belongs to.
    pub collection: String,
    /// Tag key/value pairs.
    pub tags: BTreeMap<String, String>,
    /// Version of the stream annotation.
    pub annotation_version: u64,
}

/// Stream and superblock bookkeeping that a storage provider may offer.
pub trait StreamMetadata {
    /// Reads the superblock of `stream` at `version`.
    fn read_superblock(&self, stream: Uuid, version: u64) -> BlockstoreResult<Vec<u8>>;

    /// Writes the superblock of `stream` at `version`.
    fn write_superblock(&self, stream: Uuid, version: u64, superblock: &[u8])
        -> BlockstoreResult<()>;

    /// Sets the current version of a stream; a lower version is a rollback.
    fn set_stream_version(&self, stream: Uuid, version: u64) -> BlockstoreResult<()>;

    /// Returns the current version of a stream, or 0 if it does not exist.
    fn get_stream_version(&self, stream: Uuid) -> BlockstoreResult<u64>;

    /// Returns the stream descriptor and its version.
    fn get_stream_info(&self, stream: Uuid) -> BlockstoreResult<Option<(StreamInfo, u64)>>;

    /// Registers a new stream.
    fn create_stream(
        &self,
        stream: Uuid,
        collection: &str,
        tags: &BTreeMap<String, String>,
        annotation: &[u8],
    ) -> BlockstoreResult<()>;

    /// Lists collections starting with `prefix`, after `starting_from`, at
    /// most `limit` of them.
    fn list_collections(
        &self,
        prefix: &str,
        starting_from: &str,
        limit: Option<usize>,
    ) -> BlockstoreResult<Vec<String>>;

    /// Lists streams in a collection whose tags match.
    fn list_streams(
        &self,
        collection: &str,
        partial: bool,
        tags: &BTreeMap<String, String>,
    ) -> BlockstoreResult<Vec<StreamInfo>>;

    /// Replaces the annotation of a stream if `expected_version` matches.
    fn set_stream_annotation(
        &self,
        stream: Uuid,
        expected_version: u64,
        annotation: &[u8],
    ) -> BlockstoreResult<()>;

    /// Returns the annotation of a stream and its version.
    fn get_stream_annotation(&self, stream: Uuid) -> BlockstoreResult<(Vec<u8>, u64)>;
}

fn unsupported<T>(operation: &'static str) -> BlockstoreResult<T> {
    Err(BlockstoreError::Unsupported { operation })
}

impl StreamMetadata for FilePool {
    fn read_superblock(&self, _stream: Uuid, _version: u64) -> BlockstoreResult<Vec<u8>> {
        unsupported("read_superblock")
    }

    fn write_superblock(
        &self,
        _stream: Uuid,
        _version: u64,
        _superblock: &[u8],
    ) -> BlockstoreResult<()> {
        unsupported("write_superblock")
    }

    fn set_stream_version(&self, _stream: Uuid, _version: u64) -> BlockstoreResult<()> {
        unsupported("set_stream_version")
    }

    fn get_stream_version(&self, _stream: Uuid) -> BlockstoreResult<u64> {
        unsupported("get_stream_version")
    }

    fn get_stream_info(&self, _stream: Uuid) -> BlockstoreResult<Option<(StreamInfo, u64)>> {
        unsupported("get_stream_info")
    }

    fn create_stream(
        &self,
        _stream: Uuid,
        _collection: &str,
        _tags: &BTreeMap<String, String>,
        _annotation: &[u8],
    ) -> BlockstoreResult<()> {
        unsupported("create_stream")
    }

    fn list_collections(
        &self,
        _prefix: &str,
        _starting_from: &str,
        _limit: Option<usize>,
    ) -> BlockstoreResult<Vec<String>> {
        unsupported("list_collections")
    }

    fn list_streams(
        &self,
        _collection: &str,
        _partial: bool,
        _tags: &BTreeMap<String, String>,
    ) -> BlockstoreResult<Vec<StreamInfo>> {
        unsupported("list_streams")
    }

    fn set_stream_annotation(
        &self,
        _stream: Uuid,
        _expected_version: u64,
        _annotation: &[u8],
    ) -> BlockstoreResult<()> {
        unsupported("set_stream_annotation")
    }

    fn get_stream_annotation(&self, _stream: Uuid) -> BlockstoreResult<(Vec<u8>, u64)> {
        unsupported("get_stream_annotation")
    }
}
