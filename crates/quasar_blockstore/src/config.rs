//! Blockstore configuration.

use crate::error::{BlockstoreError, BlockstoreResult};
use crate::record::HEADER_SIZE;
use serde::{Deserialize, Serialize};

/// Number of backing files in a standard database.
pub const DEFAULT_FILE_COUNT: usize = 256;

/// Largest supported pool; file names carry the index as two hex digits.
pub const MAX_FILE_COUNT: usize = 256;

/// Default write queue depth per segment.
pub const DEFAULT_WRITE_QUEUE_DEPTH: usize = 16;

/// Size of the first read: a maximal compressed block plus its header.
pub const DEFAULT_FIRST_READ_SIZE: usize = 3459;

/// Configuration for creating and opening a blockstore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of backing files.
    pub file_count: usize,

    /// Pending writes a segment buffers before `write` blocks.
    pub write_queue_depth: usize,

    /// Bytes fetched by the first phase of a read.
    pub first_read_size: usize,

    /// Whether `flush` syncs file data to disk after draining.
    pub sync_on_flush: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            file_count: DEFAULT_FILE_COUNT,
            write_queue_depth: DEFAULT_WRITE_QUEUE_DEPTH,
            first_read_size: DEFAULT_FIRST_READ_SIZE,
            sync_on_flush: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of backing files.
    #[must_use]
    pub const fn file_count(mut self, count: usize) -> Self {
        self.file_count = count;
        self
    }

    /// Sets the per-segment write queue depth.
    #[must_use]
    pub const fn write_queue_depth(mut self, depth: usize) -> Self {
        self.write_queue_depth = depth;
        self
    }

    /// Sets the first read size.
    #[must_use]
    pub const fn first_read_size(mut self, size: usize) -> Self {
        self.first_read_size = size;
        self
    }

    /// Sets whether to sync file data on flush.
    #[must_use]
    pub const fn sync_on_flush(mut self, value: bool) -> Self {
        self.sync_on_flush = value;
        self
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` describing the first bad value.
    pub fn validate(&self) -> BlockstoreResult<()> {
        if self.file_count == 0 || self.file_count > MAX_FILE_COUNT {
            return Err(BlockstoreError::invalid_argument(format!(
                "file_count must be in 1..={MAX_FILE_COUNT}, got {}",
                self.file_count
            )));
        }
        if self.write_queue_depth == 0 {
            return Err(BlockstoreError::invalid_argument(
                "write_queue_depth must be at least 1",
            ));
        }
        if self.first_read_size < HEADER_SIZE {
            return Err(BlockstoreError::invalid_argument(format!(
                "first_read_size must be at least {HEADER_SIZE}, got {}",
                self.first_read_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.file_count, 256);
        assert_eq!(config.write_queue_depth, 16);
        assert_eq!(config.first_read_size, 3459);
        assert!(!config.sync_on_flush);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .file_count(4)
            .write_queue_depth(2)
            .first_read_size(16)
            .sync_on_flush(true);

        assert_eq!(config.file_count, 4);
        assert_eq!(config.write_queue_depth, 2);
        assert_eq!(config.first_read_size, 16);
        assert!(config.sync_on_flush);
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(Config::new().file_count(0).validate().is_err());
        assert!(Config::new().file_count(257).validate().is_err());
        assert!(Config::new().write_queue_depth(0).validate().is_err());
        assert!(Config::new().first_read_size(1).validate().is_err());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: Config = serde_json::from_str(r#"{"file_count": 4}"#).unwrap();
        assert_eq!(config, Config::new().file_count(4));

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["first_read_size"], 3459);
    }
}
