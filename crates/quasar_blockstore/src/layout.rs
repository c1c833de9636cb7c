//! Storage directory layout.
//!
//! ```text
//! <storage_path>/
//! ├─ LOCK                 # Advisory lock held by the open pool
//! ├─ blockstore.00.db     # Backing file 0
//! ├─ blockstore.01.db
//! │  ...
//! └─ blockstore.ff.db     # Backing file 255
//! ```
//!
//! Every backing file starts with [`MAGIC_TAG`]. Records therefore never sit
//! at offset 0, which keeps address 0 free for use as a sentinel.

use crate::config::Config;
use crate::error::{BlockstoreError, BlockstoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Tag written at the start of every backing file.
pub const MAGIC_TAG: [u8; 8] = *b"QUASARDB";

/// Offset of the first byte a record may occupy.
pub const DATA_START: u64 = MAGIC_TAG.len() as u64;

const LOCK_FILE: &str = "LOCK";

/// Returns the file name for a backing file index.
#[must_use]
pub fn file_name(file_index: usize) -> String {
    format!("blockstore.{file_index:02x}.db")
}

/// Returns the full path of a backing file.
#[must_use]
pub fn file_path(storage_path: &Path, file_index: usize) -> PathBuf {
    storage_path.join(file_name(file_index))
}

/// Creates every backing file and writes its magic tag.
///
/// Nothing is written if any backing file is already present.
pub(crate) fn create_files(storage_path: &Path, config: &Config) -> BlockstoreResult<()> {
    config.validate()?;
    fs::create_dir_all(storage_path)
        .map_err(|e| BlockstoreError::file_io(storage_path, e))?;

    for file_index in 0..config.file_count {
        let path = file_path(storage_path, file_index);
        if path.exists() {
            return Err(BlockstoreError::AlreadyExists { path });
        }
    }

    for file_index in 0..config.file_count {
        let path = file_path(storage_path, file_index);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(BlockstoreError::AlreadyExists { path });
            }
            Err(e) => return Err(BlockstoreError::file_io(path, e)),
        };
        file.write_all(&MAGIC_TAG)
            .and_then(|()| file.sync_all())
            .map_err(|e| BlockstoreError::file_io(&path, e))?;
    }

    info!(
        path = %storage_path.display(),
        files = config.file_count,
        "created blockstore"
    );
    Ok(())
}

/// Opens a backing file for writing and, separately, for reading.
pub(crate) fn open_file_pair(storage_path: &Path, file_index: usize) -> BlockstoreResult<(File, File)> {
    let path = file_path(storage_path, file_index);
    let writer = match OpenOptions::new().read(true).write(true).open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(BlockstoreError::NotCreated { path });
        }
        Err(e) => return Err(BlockstoreError::file_io(path, e)),
    };
    let reader = File::open(&path).map_err(|e| BlockstoreError::file_io(&path, e))?;
    Ok((writer, reader))
}

/// Reads the first bytes of a backing file and checks them against the tag.
///
/// # Errors
///
/// Returns `NotCreated` if the file is missing, `Corruption` if the tag
/// differs, or `FileIo` on other failures.
pub fn check_magic(storage_path: &Path, file_index: usize) -> BlockstoreResult<()> {
    let path = file_path(storage_path, file_index);
    let mut file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(BlockstoreError::NotCreated { path });
        }
        Err(e) => return Err(BlockstoreError::file_io(path, e)),
    };

    let mut tag = [0u8; MAGIC_TAG.len()];
    match file.read_exact(&mut tag) {
        Ok(()) if tag == MAGIC_TAG => Ok(()),
        Ok(()) => Err(BlockstoreError::corruption(file_index, 0, "bad magic tag")),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(BlockstoreError::corruption(
            file_index,
            0,
            "file shorter than magic tag",
        )),
        Err(e) => Err(BlockstoreError::file_io(path, e)),
    }
}

/// Exclusive advisory lock on a storage directory.
///
/// Released when dropped.
#[derive(Debug)]
pub(crate) struct DirLock {
    _file: File,
}

impl DirLock {
    /// Takes the lock without blocking.
    pub(crate) fn acquire(storage_path: &Path) -> BlockstoreResult<Self> {
        let path = storage_path.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| BlockstoreError::file_io(&path, e))?;

        if file.try_lock_exclusive().is_err() {
            return Err(BlockstoreError::DatabaseLocked { path });
        }

        Ok(Self { _file: file })
    }
}
