//! Backing file pool and write lease scheduler.
//!
//! The pool owns every backing file for its lifetime. Write access is handed
//! out one file at a time as a [`Segment`]; a scheduler thread decides which
//! file the next lease gets:
//!
//! 1. Drain every returned file index without blocking and mark it available.
//! 2. Pick the available file with the smallest frontier (lowest index wins
//!    ties) and hand it to the next caller of [`FilePool::lock_segment`].
//! 3. If nothing is available, block on the return queue until a segment is
//!    unlocked.
//!
//! Readers never go through the scheduler.

use crate::address::Address;
use crate::config::Config;
use crate::error::{BlockstoreError, BlockstoreResult};
use crate::layout::{self, DirLock};
use crate::segment::Segment;
use parking_lot::Mutex;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Per-file state shared by the scheduler, segments and readers.
#[derive(Debug)]
pub(crate) struct FileSlot {
    /// Handle used by the segment that currently leases this file.
    pub(crate) writer: File,
    /// Independent handle for reads; the mutex serializes seek + read.
    pub(crate) reader: Mutex<File>,
    /// End offset as last observed.
    frontier: AtomicU64,
}

impl FileSlot {
    fn new(writer: File, reader: File) -> std::io::Result<Self> {
        let frontier = writer.metadata()?.len();
        Ok(Self {
            writer,
            reader: Mutex::new(reader),
            frontier: AtomicU64::new(frontier),
        })
    }

    pub(crate) fn frontier(&self) -> u64 {
        self.frontier.load(Ordering::Acquire)
    }

    /// Re-reads the end offset from the file system.
    fn refresh_frontier(&self, file_index: usize) {
        match self.writer.metadata() {
            Ok(metadata) => self.frontier.store(metadata.len(), Ordering::Release),
            Err(e) => warn!(file_index, error = %e, "could not refresh frontier"),
        }
    }
}

/// State shared between the pool handle, its scheduler and live segments.
///
/// Files close when the last reference is dropped.
#[derive(Debug)]
pub(crate) struct PoolShared {
    pub(crate) storage_path: PathBuf,
    pub(crate) config: Config,
    pub(crate) slots: Vec<FileSlot>,
    _lock: DirLock,
}

/// Messages from segments and the pool handle to the scheduler.
#[derive(Debug)]
pub(crate) enum PoolMessage {
    /// A segment unlocked its file.
    Returned(usize),
    /// The pool handle is being dropped.
    Shutdown,
}

/// The set of backing files and the scheduler leasing them to writers.
///
/// # Thread Safety
///
/// `FilePool` is `Send + Sync`. Any number of threads may lock segments and
/// read concurrently; each leased file is owned by exactly one [`Segment`].
///
/// # Example
///
/// ```no_run
/// use quasar_blockstore::{Config, FilePool};
/// use std::path::Path;
///
/// let path = Path::new("/var/lib/quasar");
/// FilePool::create_database(path, &Config::default())?;
///
/// let pool = FilePool::open(path, Config::default())?;
/// let mut segment = pool.lock_segment()?;
/// let address = segment.write(b"block")?;
/// segment.unlock()?;
///
/// let mut buffer = Vec::new();
/// assert_eq!(pool.read(address, &mut buffer)?, b"block");
/// # Ok::<(), quasar_blockstore::BlockstoreError>(())
/// ```
#[derive(Debug)]
pub struct FilePool {
    shared: Arc<PoolShared>,
    grants: Mutex<Option<Receiver<usize>>>,
    returns: Sender<PoolMessage>,
    scheduler: Option<JoinHandle<()>>,
}

impl FilePool {
    /// Creates the backing files for a new database.
    ///
    /// Every file is created exclusively and starts with the magic tag.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if any backing file is already present, in
    /// which case no file is created or modified. Other failures return
    /// `FileIo` or `InvalidArgument`.
    pub fn create_database(storage_path: &Path, config: &Config) -> BlockstoreResult<()> {
        layout::create_files(storage_path, config)
    }

    /// Opens every backing file and starts the scheduler.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `NotCreated` if a backing file is missing
    /// - `DatabaseLocked` if another pool has the directory open
    /// - `FileIo` if a file cannot be opened
    /// - `InvalidArgument` if the configuration is invalid
    pub fn open(storage_path: &Path, config: Config) -> BlockstoreResult<Self> {
        config.validate()?;
        if !storage_path.is_dir() {
            return Err(BlockstoreError::NotCreated {
                path: storage_path.to_path_buf(),
            });
        }
        // Never leave a lock file in a directory that holds no database.
        let first = layout::file_path(storage_path, 0);
        if !first.is_file() {
            return Err(BlockstoreError::NotCreated { path: first });
        }
        let lock = DirLock::acquire(storage_path)?;

        let mut slots = Vec::with_capacity(config.file_count);
        for file_index in 0..config.file_count {
            let (writer, reader) = layout::open_file_pair(storage_path, file_index)?;
            let slot = FileSlot::new(writer, reader).map_err(|e| {
                BlockstoreError::file_io(layout::file_path(storage_path, file_index), e)
            })?;
            slots.push(slot);
        }

        Self::start(storage_path, config, slots, lock)
    }

    /// Starts the scheduler over already opened files.
    fn start(
        storage_path: &Path,
        config: Config,
        slots: Vec<FileSlot>,
        lock: DirLock,
    ) -> BlockstoreResult<Self> {
        let shared = Arc::new(PoolShared {
            storage_path: storage_path.to_path_buf(),
            config,
            slots,
            _lock: lock,
        });

        let (grant_tx, grant_rx) = mpsc::sync_channel(0);
        let (return_tx, return_rx) = mpsc::channel();

        let scheduler = Scheduler {
            shared: Arc::clone(&shared),
            available: vec![true; shared.slots.len()],
            returns: return_rx,
            grants: grant_tx,
        };
        let handle = thread::Builder::new()
            .name("blockstore-scheduler".to_string())
            .spawn(move || scheduler.run())
            .map_err(|e| BlockstoreError::file_io(storage_path, e))?;

        info!(
            path = %storage_path.display(),
            files = shared.slots.len(),
            "opened blockstore"
        );

        Ok(Self {
            shared,
            grants: Mutex::new(Some(grant_rx)),
            returns: return_tx,
            scheduler: Some(handle),
        })
    }

    /// Leases a file for writing, blocking until one is available.
    ///
    /// # Errors
    ///
    /// Returns `PoolClosed` if the scheduler has stopped, or `Io` if the
    /// file's end offset cannot be determined.
    pub fn lock_segment(&self) -> BlockstoreResult<Segment> {
        let grants = self.grants.lock();
        let file_index = grants
            .as_ref()
            .ok_or(BlockstoreError::PoolClosed)?
            .recv()
            .map_err(|_| BlockstoreError::PoolClosed)?;
        drop(grants);

        self.lease(file_index)
    }

    /// Leases a file for writing, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `LockTimeout` if no file was granted in time, plus the errors
    /// of [`FilePool::lock_segment`].
    pub fn lock_segment_timeout(&self, timeout: Duration) -> BlockstoreResult<Segment> {
        let deadline = Instant::now() + timeout;
        let grants = self
            .grants
            .try_lock_until(deadline)
            .ok_or(BlockstoreError::LockTimeout)?;

        let remaining = deadline.saturating_duration_since(Instant::now());
        let receiver = grants.as_ref().ok_or(BlockstoreError::PoolClosed)?;
        let file_index = match receiver.recv_timeout(remaining) {
            Ok(file_index) => file_index,
            Err(RecvTimeoutError::Timeout) => return Err(BlockstoreError::LockTimeout),
            Err(RecvTimeoutError::Disconnected) => return Err(BlockstoreError::PoolClosed),
        };
        drop(grants);

        self.lease(file_index)
    }

    fn lease(&self, file_index: usize) -> BlockstoreResult<Segment> {
        let slot = &self.shared.slots[file_index];
        let base = match slot.writer.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                let _ = self.returns.send(PoolMessage::Returned(file_index));
                return Err(BlockstoreError::io(file_index, 0, e));
            }
        };
        slot.frontier.store(base, Ordering::Release);

        debug!(file_index, base, "leased segment");
        Segment::start(
            Arc::clone(&self.shared),
            self.returns.clone(),
            file_index,
            base,
        )
    }

    /// Returns the number of backing files.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.shared.slots.len()
    }

    /// Returns the storage directory.
    #[must_use]
    pub fn storage_path(&self) -> &Path {
        &self.shared.storage_path
    }

    /// Returns the configuration the pool was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Returns the last observed end offset of every backing file.
    ///
    /// Leased files may have grown past the reported value.
    #[must_use]
    pub fn frontiers(&self) -> Vec<u64> {
        self.shared.slots.iter().map(FileSlot::frontier).collect()
    }

    /// Returns the address of the first record slot in a file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `file_index` is out of range.
    pub fn first_address(&self, file_index: usize) -> BlockstoreResult<Address> {
        if file_index >= self.file_count() {
            return Err(BlockstoreError::invalid_argument(format!(
                "file index {file_index} out of range 0..{}",
                self.file_count()
            )));
        }
        Address::encode(file_index, layout::DATA_START)
    }

    pub(crate) fn shared(&self) -> &PoolShared {
        &self.shared
    }
}

impl Drop for FilePool {
    fn drop(&mut self) {
        // Dropping the receiver unblocks a scheduler waiting to hand out a
        // grant; the message wakes one waiting for a return.
        self.grants.lock().take();
        let _ = self.returns.send(PoolMessage::Shutdown);
        if let Some(handle) = self.scheduler.take() {
            if handle.join().is_err() {
                warn!("blockstore scheduler panicked");
            }
        }
    }
}

/// Decides which file the next lease gets.
struct Scheduler {
    shared: Arc<PoolShared>,
    available: Vec<bool>,
    returns: Receiver<PoolMessage>,
    grants: SyncSender<usize>,
}

impl Scheduler {
    fn run(mut self) {
        self.schedule();
        debug!("blockstore scheduler stopped");
    }

    /// Runs until shutdown or until the pool handle is gone.
    fn schedule(&mut self) {
        loop {
            while let Ok(message) = self.returns.try_recv() {
                if !self.handle(message) {
                    return;
                }
            }

            if let Some(file_index) = self.select() {
                self.available[file_index] = false;
                if self.grants.send(file_index).is_err() {
                    return;
                }
            } else {
                // Every file is leased: block rather than spin.
                let Ok(message) = self.returns.recv() else {
                    return;
                };
                if !self.handle(message) {
                    return;
                }
            }
        }
    }

    /// Applies a message; returns false on shutdown.
    fn handle(&mut self, message: PoolMessage) -> bool {
        match message {
            PoolMessage::Returned(file_index) => {
                self.mark_available(file_index);
                true
            }
            PoolMessage::Shutdown => false,
        }
    }

    fn mark_available(&mut self, file_index: usize) {
        self.shared.slots[file_index].refresh_frontier(file_index);
        self.available[file_index] = true;
        debug!(file_index, "segment returned");
    }

    /// Available file with the smallest frontier; lowest index on ties.
    fn select(&self) -> Option<usize> {
        let mut best: Option<(usize, u64)> = None;
        for (file_index, slot) in self.shared.slots.iter().enumerate() {
            if !self.available[file_index] {
                continue;
            }
            let frontier = slot.frontier();
            if best.map_or(true, |(_, min)| frontier < min) {
                best = Some((file_index, frontier));
            }
        }
        best.map(|(file_index, _)| file_index)
    }
}
