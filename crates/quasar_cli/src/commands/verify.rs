//! Verify command implementation.

use quasar_blockstore::layout::{check_magic, file_name};
use quasar_blockstore::Config;
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of files checked.
    pub files_checked: usize,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Checks every backing file.
pub fn verify_files(path: &Path, config: &Config) -> VerifyResult {
    let mut result = VerifyResult::default();
    for file_index in 0..config.file_count {
        result.files_checked += 1;
        if let Err(e) = check_magic(path, file_index) {
            result.errors.push(format!("{}: {e}", file_name(file_index)));
        }
    }
    result
}

/// Runs the verify command.
pub fn run(path: &Path, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying blockstore at {}", path.display());

    let result = verify_files(path, config);
    println!("  Files checked: {}", result.files_checked);
    for error in &result.errors {
        println!("  ✗ {error}");
    }

    if result.is_ok() {
        println!("✓ Blockstore verification passed");
        Ok(())
    } else {
        println!("✗ Blockstore verification failed");
        Err("Verification failed".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quasar_blockstore::FilePool;
    use tempfile::tempdir;

    #[test]
    fn fresh_database_verifies() {
        let dir = tempdir().unwrap();
        let config = Config::new().file_count(3);
        FilePool::create_database(dir.path(), &config).unwrap();

        let result = verify_files(dir.path(), &config);
        assert_eq!(result.files_checked, 3);
        assert!(result.is_ok());
    }

    #[test]
    fn missing_and_damaged_files_reported() {
        let dir = tempdir().unwrap();
        let config = Config::new().file_count(3);
        FilePool::create_database(dir.path(), &config).unwrap();

        std::fs::remove_file(dir.path().join("blockstore.01.db")).unwrap();
        std::fs::write(dir.path().join("blockstore.02.db"), b"garbage!").unwrap();

        let result = verify_files(dir.path(), &config);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].starts_with("blockstore.01.db"));
        assert!(result.errors[1].starts_with("blockstore.02.db"));
    }
}
