//! Shared helpers for Quasar blockstore benchmarks.

#![warn(missing_docs)]

use quasar_blockstore::{Address, Config, FilePool};
use rand::Rng;
use tempfile::TempDir;

/// Generate random record data of the specified size.
#[must_use]
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Creates and opens a pool in a fresh temporary directory.
///
/// The directory is removed when the returned `TempDir` drops, so keep it
/// alive for as long as the pool is used.
#[must_use]
pub fn temp_pool(config: Config) -> (TempDir, FilePool) {
    let dir = TempDir::new().expect("temp dir");
    FilePool::create_database(dir.path(), &config).expect("create database");
    let pool = FilePool::open(dir.path(), config).expect("open pool");
    (dir, pool)
}

/// Writes `count` records of `size` bytes through one segment.
#[must_use]
pub fn populate(pool: &FilePool, count: usize, size: usize) -> Vec<Address> {
    let data = random_data(size);
    let mut segment = pool.lock_segment().expect("lock segment");
    let addresses = (0..count)
        .map(|_| segment.write(&data).expect("write"))
        .collect();
    segment.unlock().expect("unlock");
    addresses
}
