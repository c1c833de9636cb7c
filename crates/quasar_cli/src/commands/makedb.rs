//! Makedb command implementation.

use quasar_blockstore::{BlockstoreError, Config, FilePool};
use std::path::Path;
use tracing::info;

/// Runs the makedb command.
///
/// An existing database is reported and left untouched.
pub fn run(path: &Path, config: &Config) -> Result<(), BlockstoreError> {
    match FilePool::create_database(path, config) {
        Ok(()) => {
            println!(
                "Created {} backing files in {}",
                config.file_count,
                path.display()
            );
            Ok(())
        }
        Err(BlockstoreError::AlreadyExists { path: existing }) => {
            info!(path = %existing.display(), "database already initialized");
            println!("Database already exists at {}", path.display());
            Ok(())
        }
        Err(e) => Err(e),
    }
}
