//! Integration tests for the file pool, segments and reads.

use quasar_blockstore::layout::file_path;
use quasar_blockstore::{Address, BlockstoreError, Config, FilePool, DATA_START, MAGIC_TAG};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

fn create_and_open(path: &Path, config: Config) -> FilePool {
    FilePool::create_database(path, &config).unwrap();
    FilePool::open(path, config).unwrap()
}

fn pad_file(path: &Path, file_index: usize, len: usize) {
    let mut file = OpenOptions::new()
        .append(true)
        .open(file_path(path, file_index))
        .unwrap();
    file.write_all(&vec![0xEE; len]).unwrap();
}

/// Payload whose content is derivable from its length and a seed.
fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

#[test]
fn lock_blocks_when_every_file_is_leased() {
    let dir = tempdir().unwrap();
    let pool = create_and_open(dir.path(), Config::new().file_count(3));

    let mut held: Vec<_> = (0..3).map(|_| pool.lock_segment().unwrap()).collect();
    let indices: HashSet<_> = held.iter().map(|s| s.file_index()).collect();
    assert_eq!(indices.len(), 3);

    thread::scope(|scope| {
        let (tx, rx) = mpsc::channel();
        let pool = &pool;
        scope.spawn(move || {
            let segment = pool.lock_segment().unwrap();
            tx.send(segment.file_index()).unwrap();
            segment.unlock().unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

        let released = held.pop().unwrap();
        let released_index = released.file_index();
        released.unlock().unwrap();

        let granted = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(granted, released_index);
    });

    for segment in held {
        segment.unlock().unwrap();
    }
}

#[test]
fn concurrent_writers_never_share_a_file() {
    let dir = tempdir().unwrap();
    let pool = create_and_open(dir.path(), Config::new().file_count(4));
    let in_use: Vec<AtomicBool> = (0..4).map(|_| AtomicBool::new(false)).collect();
    let leases = AtomicUsize::new(0);

    thread::scope(|scope| {
        for worker in 0..8u8 {
            let pool = &pool;
            let in_use = &in_use;
            let leases = &leases;
            scope.spawn(move || {
                for round in 0..20u8 {
                    let mut segment = pool.lock_segment().unwrap();
                    let file_index = segment.file_index();
                    assert!(!in_use[file_index].swap(true, Ordering::SeqCst));

                    let data = payload(usize::from(round) * 7, worker);
                    let address = segment.write(&data).unwrap();
                    assert_eq!(address.file_index(), file_index);

                    in_use[file_index].store(false, Ordering::SeqCst);
                    segment.unlock().unwrap();
                    leases.fetch_add(1, Ordering::Relaxed);

                    assert_eq!(pool.read_to_vec(address).unwrap(), data);
                }
            });
        }
    });

    assert_eq!(leases.load(Ordering::Relaxed), 160);
}

#[test]
fn boundary_lengths_round_trip() {
    let dir = tempdir().unwrap();
    let pool = create_and_open(dir.path(), Config::new().file_count(2));

    let records = [Vec::new(), vec![0x42], payload(65535, 9)];

    let mut segment = pool.lock_segment().unwrap();
    let file_index = segment.file_index();
    let mut addresses = Vec::new();
    for data in &records {
        let cursor = segment.next_address();
        let address = segment.write(data).unwrap();
        assert_eq!(address.decode(), (file_index, cursor.offset()));
        addresses.push(address);
    }
    segment.unlock().unwrap();

    let mut buffer = Vec::new();
    for (address, data) in addresses.iter().zip(&records) {
        assert_eq!(pool.read(*address, &mut buffer).unwrap(), data.as_slice());
    }
}

#[test]
fn sequential_addresses_step_by_record_size() {
    let dir = tempdir().unwrap();
    let pool = create_and_open(dir.path(), Config::new().file_count(1));

    let mut segment = pool.lock_segment().unwrap();
    let base = segment.base_address();
    let a = segment.write(b"a").unwrap();
    let bb = segment.write(b"bb").unwrap();
    let ccc = segment.write(b"ccc").unwrap();
    segment.unlock().unwrap();

    assert_eq!(a.offset(), base.offset());
    assert_eq!(bb.offset(), base.offset() + 3);
    assert_eq!(ccc.offset(), base.offset() + 7);

    assert_eq!(pool.read_to_vec(a).unwrap(), b"a");
    assert_eq!(pool.read_to_vec(bb).unwrap(), b"bb");
    assert_eq!(pool.read_to_vec(ccc).unwrap(), b"ccc");
}

#[test]
fn create_database_twice_keeps_existing_data() {
    let dir = tempdir().unwrap();
    let config = Config::new().file_count(2);

    FilePool::create_database(dir.path(), &config).unwrap();
    let address = {
        let pool = FilePool::open(dir.path(), config.clone()).unwrap();
        let mut segment = pool.lock_segment().unwrap();
        let address = segment.write(b"survives").unwrap();
        segment.unlock().unwrap();
        address
    };
    let before = fs::read(file_path(dir.path(), address.file_index())).unwrap();

    let second = FilePool::create_database(dir.path(), &config);
    assert!(matches!(second, Err(BlockstoreError::AlreadyExists { .. })));

    let after = fs::read(file_path(dir.path(), address.file_index())).unwrap();
    assert_eq!(before, after);
    assert_eq!(&after[..MAGIC_TAG.len()], &MAGIC_TAG);

    let pool = FilePool::open(dir.path(), config).unwrap();
    assert_eq!(pool.read_to_vec(address).unwrap(), b"survives");
}

#[test]
fn lease_goes_to_smallest_frontier() {
    let dir = tempdir().unwrap();
    let config = Config::new().file_count(4);
    FilePool::create_database(dir.path(), &config).unwrap();

    pad_file(dir.path(), 0, 100);
    pad_file(dir.path(), 1, 10);
    pad_file(dir.path(), 2, 10);
    pad_file(dir.path(), 3, 50);

    let pool = FilePool::open(dir.path(), config).unwrap();
    assert_eq!(
        pool.frontiers(),
        vec![DATA_START + 100, DATA_START + 10, DATA_START + 10, DATA_START + 50]
    );

    let order: Vec<_> = (0..4).map(|_| pool.lock_segment().unwrap()).collect();
    let indices: Vec<_> = order.iter().map(|s| s.file_index()).collect();
    assert_eq!(indices, vec![1, 2, 3, 0]);

    assert_eq!(order[0].base_address(), Address::encode(1, DATA_START + 10).unwrap());
    for segment in order {
        segment.unlock().unwrap();
    }
}

#[test]
fn returned_file_frontier_is_refreshed() {
    let dir = tempdir().unwrap();
    let pool = create_and_open(dir.path(), Config::new().file_count(3));

    let mut first = pool.lock_segment().unwrap();
    assert_eq!(first.file_index(), 0);
    first.write(&payload(200, 1)).unwrap();
    first.unlock().unwrap();

    let second = pool.lock_segment().unwrap();
    assert_eq!(second.file_index(), 1);

    // File 0 came back 202 bytes longer, so untouched file 2 goes next.
    let third = pool.lock_segment().unwrap();
    assert_eq!(third.file_index(), 2);
    assert_eq!(pool.frontiers()[0], DATA_START + 202);

    second.unlock().unwrap();
    third.unlock().unwrap();
}

#[test]
fn concurrent_reads_on_one_file_are_consistent() {
    let dir = tempdir().unwrap();
    let pool = create_and_open(
        dir.path(),
        Config::new().file_count(1).first_read_size(64),
    );

    let mut segment = pool.lock_segment().unwrap();
    let records: Vec<(Address, Vec<u8>)> = (0..200usize)
        .map(|i| {
            let data = payload((i * 37) % 500, i as u8);
            (segment.write(&data).unwrap(), data)
        })
        .collect();
    segment.unlock().unwrap();

    thread::scope(|scope| {
        for reader in 0..8usize {
            let pool = &pool;
            let records = &records;
            scope.spawn(move || {
                let mut buffer = Vec::new();
                for round in 0..5 {
                    for k in 0..records.len() {
                        let (address, data) = &records[(k * 7 + reader + round) % records.len()];
                        let read = pool.read(*address, &mut buffer).unwrap();
                        assert_eq!(read, data.as_slice());
                    }
                }
            });
        }
    });
}

#[test]
fn reads_see_records_from_all_files_after_reopen() {
    let dir = tempdir().unwrap();
    let config = Config::new().file_count(3);
    FilePool::create_database(dir.path(), &config).unwrap();

    let mut written = Vec::new();
    {
        let pool = FilePool::open(dir.path(), config.clone()).unwrap();
        let mut segments: Vec<_> = (0..3).map(|_| pool.lock_segment().unwrap()).collect();
        for (seed, segment) in segments.iter_mut().enumerate() {
            let data = payload(seed * 11 + 1, seed as u8);
            written.push((segment.write(&data).unwrap(), data));
        }
        for segment in segments {
            segment.unlock().unwrap();
        }
    }

    let pool = FilePool::open(dir.path(), config).unwrap();
    let files: HashSet<_> = written.iter().map(|(a, _)| a.file_index()).collect();
    assert_eq!(files.len(), 3);
    for (address, data) in &written {
        assert_eq!(&pool.read_to_vec(*address).unwrap(), data);
    }
}

#[test]
fn address_zero_never_succeeds() {
    let dir = tempdir().unwrap();
    let pool = create_and_open(dir.path(), Config::new().file_count(1));

    let mut segment = pool.lock_segment().unwrap();
    segment.write(b"data").unwrap();
    segment.unlock().unwrap();

    assert!(pool.read_to_vec(Address::NONE).is_err());
}

#[test]
fn open_without_create_reports_not_created() {
    let dir = tempdir().unwrap();
    match FilePool::open(dir.path(), Config::new().file_count(2)) {
        Err(BlockstoreError::NotCreated { path }) => {
            assert!(path.ends_with("blockstore.00.db"));
        }
        other => panic!("expected NotCreated, got {other:?}"),
    }
}

#[test]
fn small_queue_applies_writes_in_order() {
    let dir = tempdir().unwrap();
    let pool = create_and_open(
        dir.path(),
        Config::new().file_count(1).write_queue_depth(1).sync_on_flush(true),
    );

    let mut segment = pool.lock_segment().unwrap();
    let addresses: Vec<_> = (0..500usize)
        .map(|i| segment.write(&payload(i % 97, i as u8)).unwrap())
        .collect();
    segment.unlock().unwrap();

    for (i, address) in addresses.into_iter().enumerate() {
        assert_eq!(pool.read_to_vec(address).unwrap(), payload(i % 97, i as u8));
    }
}
