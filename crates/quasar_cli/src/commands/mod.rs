//! CLI command implementations.

pub mod inspect;
pub mod makedb;
pub mod record;
pub mod verify;

use quasar_blockstore::{BlockstoreError, Config, FilePool};
use std::path::Path;
use tracing::error;

/// Opens the pool, exiting the process if the database cannot be used.
pub fn open_pool(path: &Path, config: Config) -> FilePool {
    match FilePool::open(path, config) {
        Ok(pool) => pool,
        Err(BlockstoreError::NotCreated { path }) => {
            error!(
                path = %path.display(),
                "aborting: database does not exist, have you run `quasar makedb`?"
            );
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "aborting: cannot open blockstore");
            std::process::exit(1);
        }
    }
}
