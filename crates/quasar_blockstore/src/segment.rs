//! Write leases on a single backing file.
//!
//! A [`Segment`] appends records at the end of the file it leased. Each call
//! to [`Segment::write`] reserves space by advancing the cursor and queues the
//! record for a background worker, so the caller never waits on disk I/O
//! unless the queue is full. The worker applies requests strictly in order.
//!
//! ```text
//! Leased --flush--> Flushing --drained--> Drained --unlock--> (file returned)
//! ```

use crate::address::{Address, OFFSET_BITS};
use crate::error::{BlockstoreError, BlockstoreResult};
use crate::pool::{PoolMessage, PoolShared};
use crate::record;
use parking_lot::{Condvar, Mutex};
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// A queued record.
struct WriteRequest {
    offset: u64,
    header: [u8; record::HEADER_SIZE],
    data: Vec<u8>,
}

/// First failure seen by the worker.
#[derive(Debug, Clone)]
struct WriteFailure {
    offset: u64,
    kind: io::ErrorKind,
    message: String,
}

impl WriteFailure {
    fn to_error(&self, file_index: usize) -> BlockstoreError {
        BlockstoreError::io(
            file_index,
            self.offset,
            io::Error::new(self.kind, self.message.clone()),
        )
    }
}

#[derive(Debug, Default)]
struct WorkerStatus {
    finished: bool,
    failure: Option<WriteFailure>,
}

/// State the worker reports back to its segment.
#[derive(Debug, Default)]
struct WorkerShared {
    status: Mutex<WorkerStatus>,
    finished: Condvar,
    failed: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentState {
    Leased,
    Flushing,
    Drained,
}

/// An exclusive write lease on one backing file.
///
/// Obtained from [`crate::FilePool::lock_segment`]. Records written through a
/// segment are only guaranteed to be readable after [`Segment::flush`] or
/// [`Segment::unlock`] returns.
///
/// Dropping a segment without unlocking it flushes and returns the file to
/// the pool; errors are logged rather than reported.
#[derive(Debug)]
pub struct Segment {
    returns: Sender<PoolMessage>,
    file_index: usize,
    base: u64,
    ptr: u64,
    queue: Option<SyncSender<WriteRequest>>,
    worker: Arc<WorkerShared>,
    handle: Option<JoinHandle<()>>,
    state: SegmentState,
    released: bool,
}

impl Segment {
    /// Starts the write worker for a freshly granted file.
    ///
    /// The file is handed back to the scheduler if the lease cannot start.
    pub(crate) fn start(
        pool: Arc<PoolShared>,
        returns: Sender<PoolMessage>,
        file_index: usize,
        base: u64,
    ) -> BlockstoreResult<Self> {
        if let Err(e) = Address::encode(file_index, base) {
            let _ = returns.send(PoolMessage::Returned(file_index));
            return Err(e);
        }

        let (queue, requests) = mpsc::sync_channel(pool.config.write_queue_depth);
        let worker = Arc::new(WorkerShared::default());

        let spawned = {
            let worker = Arc::clone(&worker);
            thread::Builder::new()
                .name(format!("blockstore-writer-{file_index:02x}"))
                .spawn(move || run_worker(&pool, file_index, requests, &worker))
        };
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                let _ = returns.send(PoolMessage::Returned(file_index));
                return Err(BlockstoreError::io(file_index, base, e));
            }
        };

        Ok(Self {
            returns,
            file_index,
            base,
            ptr: base,
            queue: Some(queue),
            worker,
            handle: Some(handle),
            state: SegmentState::Leased,
            released: false,
        })
    }

    /// Returns the index of the leased file.
    #[must_use]
    pub fn file_index(&self) -> usize {
        self.file_index
    }

    /// Returns the address of the first free byte when the file was leased.
    #[must_use]
    pub fn base_address(&self) -> Address {
        self.address_of(self.base)
    }

    /// Returns the address the next write will receive.
    #[must_use]
    pub fn next_address(&self) -> Address {
        self.address_of(self.ptr)
    }

    /// Returns the number of bytes reserved by writes so far.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.ptr - self.base
    }

    fn address_of(&self, offset: u64) -> Address {
        // Checked at lease time and on every cursor advance.
        Address::from_raw(((self.file_index as u64) << OFFSET_BITS) | offset)
    }

    /// Queues a record and returns its address.
    ///
    /// Returns as soon as the record is queued; the queue holds at most
    /// `write_queue_depth` pending records before this call blocks.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `InvalidArgument` if `data` is longer than [`record::MAX_RECORD_LEN`]
    ///   or the file would outgrow the address offset field
    /// - `Io` if an earlier queued write failed; the segment accepts no more
    ///   writes after that
    /// - `SegmentClosed` after [`Segment::flush`]
    pub fn write(&mut self, data: &[u8]) -> BlockstoreResult<Address> {
        let header = record::encode_header(data.len())?;
        let address = self.next_address();
        let next = address.offset_by(record::encoded_len(data.len()))?;

        self.check_worker()?;
        let queue = self.queue.as_ref().ok_or(BlockstoreError::SegmentClosed {
            file_index: self.file_index,
        })?;

        let request = WriteRequest {
            offset: self.ptr,
            header,
            data: data.to_vec(),
        };
        if queue.send(request).is_err() {
            self.check_worker()?;
            return Err(BlockstoreError::SegmentClosed {
                file_index: self.file_index,
            });
        }

        self.ptr = next.offset();
        Ok(address)
    }

    /// Queues a record at an address the caller tracked itself.
    ///
    /// Returns the address the following write will receive.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `expected` is not [`Segment::next_address`],
    /// plus the errors of [`Segment::write`].
    pub fn write_at(&mut self, expected: Address, data: &[u8]) -> BlockstoreResult<Address> {
        let next = self.next_address();
        if expected != next {
            return Err(BlockstoreError::invalid_argument(format!(
                "write at {expected} but segment cursor is at {next}"
            )));
        }
        self.write(data)?;
        Ok(self.next_address())
    }

    fn check_worker(&self) -> BlockstoreResult<()> {
        if !self.worker.failed.load(Ordering::Acquire) {
            return Ok(());
        }
        match &self.worker.status.lock().failure {
            Some(failure) => Err(failure.to_error(self.file_index)),
            None => Ok(()),
        }
    }

    /// Closes the write queue and waits until every queued record is on disk.
    ///
    /// # Errors
    ///
    /// Returns `Io` with the file offset of the first failed write, or
    /// `SegmentClosed` if the segment was already flushed.
    pub fn flush(&mut self) -> BlockstoreResult<()> {
        self.flush_until(None)
    }

    /// Like [`Segment::flush`], but gives up waiting after `timeout`.
    ///
    /// A timed out flush leaves the queue closed; calling `flush` again
    /// resumes waiting.
    ///
    /// # Errors
    ///
    /// Returns `FlushTimeout` if the worker has not drained in time, plus the
    /// errors of [`Segment::flush`].
    pub fn flush_timeout(&mut self, timeout: Duration) -> BlockstoreResult<()> {
        self.flush_until(Some(Instant::now() + timeout))
    }

    fn flush_until(&mut self, deadline: Option<Instant>) -> BlockstoreResult<()> {
        match self.state {
            SegmentState::Leased => {
                self.queue = None;
                self.state = SegmentState::Flushing;
            }
            SegmentState::Flushing => {}
            SegmentState::Drained => {
                return Err(BlockstoreError::SegmentClosed {
                    file_index: self.file_index,
                });
            }
        }

        {
            let mut status = self.worker.status.lock();
            while !status.finished {
                match deadline {
                    Some(deadline) => {
                        let timed_out = self.worker.finished.wait_until(&mut status, deadline);
                        if timed_out.timed_out() && !status.finished {
                            return Err(BlockstoreError::FlushTimeout {
                                file_index: self.file_index,
                            });
                        }
                    }
                    None => self.worker.finished.wait(&mut status),
                }
            }
        }

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(file_index = self.file_index, "segment writer panicked");
            }
        }
        self.state = SegmentState::Drained;
        self.check_worker()
    }

    /// Flushes and returns the file to the pool.
    ///
    /// The file is returned even when the flush fails.
    ///
    /// # Errors
    ///
    /// Returns the flush error, if any. Unlocking a segment that was already
    /// flushed reports the outcome of that flush again.
    pub fn unlock(mut self) -> BlockstoreResult<()> {
        let result = if self.state == SegmentState::Drained {
            self.check_worker()
        } else {
            self.flush()
        };
        self.release();
        result
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        debug!(
            file_index = self.file_index,
            base = self.base,
            end = self.ptr,
            "released segment"
        );
        let _ = self.returns.send(PoolMessage::Returned(self.file_index));
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if self.state != SegmentState::Drained {
            if let Err(e) = self.flush() {
                error!(file_index = self.file_index, error = %e, "segment dropped with failed writes");
            }
        }
        self.release();
    }
}

/// Applies queued records in order until the queue closes.
///
/// After the first failure the remaining requests are drained and discarded.
fn run_worker(
    pool: &PoolShared,
    file_index: usize,
    requests: Receiver<WriteRequest>,
    worker: &WorkerShared,
) {
    let file = &pool.slots[file_index].writer;
    let mut failure: Option<WriteFailure> = None;

    for request in requests {
        if failure.is_some() {
            continue;
        }
        if let Err(e) = write_record(file, &request) {
            error!(file_index, offset = request.offset, error = %e, "segment write failed");
            let recorded = WriteFailure {
                offset: request.offset,
                kind: e.kind(),
                message: e.to_string(),
            };
            worker.status.lock().failure = Some(recorded.clone());
            worker.failed.store(true, Ordering::Release);
            failure = Some(recorded);
        }
    }

    if failure.is_none() && pool.config.sync_on_flush {
        if let Err(e) = file.sync_data() {
            error!(file_index, error = %e, "segment sync failed");
            worker.status.lock().failure = Some(WriteFailure {
                offset: 0,
                kind: e.kind(),
                message: e.to_string(),
            });
            worker.failed.store(true, Ordering::Release);
        }
    }

    let mut status = worker.status.lock();
    status.finished = true;
    worker.finished.notify_all();
}

/// Writes the length header, then the payload, at the request offset.
fn write_record(mut file: &File, request: &WriteRequest) -> io::Result<()> {
    file.seek(SeekFrom::Start(request.offset))?;
    file.write_all(&request.header)?;
    file.write_all(&request.data)
}
