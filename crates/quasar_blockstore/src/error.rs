//! Error types for blockstore operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for blockstore operations.
pub type BlockstoreResult<T> = Result<T, BlockstoreError>;

/// Errors that can occur while creating, writing or reading the blockstore.
#[derive(Debug, Error)]
pub enum BlockstoreError {
    /// Backing files already exist at the storage path.
    #[error("database already exists: {}", path.display())]
    AlreadyExists {
        /// The first backing file found to exist.
        path: PathBuf,
    },

    /// The storage path has no backing files; the database was never created.
    #[error("database does not exist: {} is missing", path.display())]
    NotCreated {
        /// The missing backing file.
        path: PathBuf,
    },

    /// Another pool holds the storage directory lock.
    #[error("database locked: {} is held by another process", path.display())]
    DatabaseLocked {
        /// The lock file path.
        path: PathBuf,
    },

    /// Malformed address, oversized record, bad file index or bad config.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// An I/O error at a known position in a backing file.
    #[error("I/O error in file {file_index:#04x} at offset {offset}: {source}")]
    Io {
        /// Index of the backing file.
        file_index: usize,
        /// Offset of the failed operation.
        offset: u64,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// An I/O error while opening or creating a backing file.
    #[error("I/O error on {}: {source}", path.display())]
    FileIo {
        /// The file being opened or created.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Stored bytes are inconsistent with the record format.
    #[error("corruption in file {file_index:#04x} at offset {offset}: {message}")]
    Corruption {
        /// Index of the backing file.
        file_index: usize,
        /// Offset of the record.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// The segment's write queue was already closed.
    #[error("segment on file {file_index:#04x} is already flushed")]
    SegmentClosed {
        /// Index of the leased file.
        file_index: usize,
    },

    /// No file index was granted before the deadline.
    #[error("timed out waiting for a segment lease")]
    LockTimeout,

    /// The write worker did not drain before the deadline.
    #[error("timed out flushing segment on file {file_index:#04x}")]
    FlushTimeout {
        /// Index of the leased file.
        file_index: usize,
    },

    /// The pool scheduler has stopped.
    #[error("file pool is closed")]
    PoolClosed,

    /// The operation is not provided by this backend.
    #[error("operation not supported by the file blockstore: {operation}")]
    Unsupported {
        /// Name of the operation.
        operation: &'static str,
    },
}

impl BlockstoreError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a corruption error for a record position.
    pub fn corruption(file_index: usize, offset: u64, message: impl Into<String>) -> Self {
        Self::Corruption {
            file_index,
            offset,
            message: message.into(),
        }
    }

    /// Wraps an I/O error with the file position it occurred at.
    pub fn io(file_index: usize, offset: u64, source: io::Error) -> Self {
        Self::Io {
            file_index,
            offset,
            source,
        }
    }

    /// Wraps an I/O error with the path it occurred on.
    pub fn file_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }

    /// Returns true if this error reports an already created database.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_file_and_offset() {
        let err = BlockstoreError::io(0x1f, 4096, io::Error::other("disk gone"));
        let message = err.to_string();
        assert!(message.contains("0x1f"));
        assert!(message.contains("4096"));
        assert!(message.contains("disk gone"));
    }

    #[test]
    fn already_exists_is_distinct() {
        let err = BlockstoreError::AlreadyExists {
            path: PathBuf::from("/tmp/blockstore.00.db"),
        };
        assert!(err.is_already_exists());
        assert!(!BlockstoreError::LockTimeout.is_already_exists());
    }
}
