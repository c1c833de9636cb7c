//! Record reads.
//!
//! A read needs no index: the address names the file and offset, and the
//! record header gives the length. Most records fit in the first read of
//! `first_read_size` bytes; longer ones take a second read for the rest.
//! Each file has its own read handle and mutex, so reads on different files
//! run in parallel while reads on one file never interleave their seeks.

use crate::address::Address;
use crate::error::{BlockstoreError, BlockstoreResult};
use crate::layout::DATA_START;
use crate::pool::FilePool;
use crate::record::{self, HEADER_SIZE};
use std::io::{self, Read, Seek, SeekFrom};

impl FilePool {
    /// Reads the record at `address` into `buffer`.
    ///
    /// Returns the payload, without its header, as a slice of `buffer`. The
    /// buffer is resized as needed and can be reused across calls.
    ///
    /// The record must have been flushed by its segment before it is read.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `InvalidArgument` if the file index is out of range or the offset
    ///   points into the file header (this includes [`Address::NONE`])
    /// - `Corruption` if fewer than two bytes exist at the offset, or the
    ///   payload runs past the end of the file
    /// - `Io` on read failure
    pub fn read<'b>(
        &self,
        address: Address,
        buffer: &'b mut Vec<u8>,
    ) -> BlockstoreResult<&'b [u8]> {
        let (file_index, offset) = address.decode();
        let slot = self.shared().slots.get(file_index).ok_or_else(|| {
            BlockstoreError::invalid_argument(format!(
                "address {address} names file {file_index}, pool has {}",
                self.file_count()
            ))
        })?;
        if offset < DATA_START {
            return Err(BlockstoreError::invalid_argument(format!(
                "address {address} points into the file header"
            )));
        }

        buffer.clear();
        buffer.resize(self.config().first_read_size, 0);

        let mut file = slot.reader.lock();
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| BlockstoreError::io(file_index, offset, e))?;
        let nread = read_up_to(&mut *file, buffer)
            .map_err(|e| BlockstoreError::io(file_index, offset, e))?;

        let len = record::decode_header(&buffer[..nread]).ok_or_else(|| {
            BlockstoreError::corruption(
                file_index,
                offset,
                format!("short read of {nread} bytes, no record header"),
            )
        })?;

        let end = HEADER_SIZE + len;
        if end > nread {
            buffer.resize(end, 0);
            match file.read_exact(&mut buffer[nread..end]) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(BlockstoreError::corruption(
                        file_index,
                        offset,
                        format!("record of {len} bytes extends past end of file"),
                    ));
                }
                Err(e) => {
                    return Err(BlockstoreError::io(file_index, offset + nread as u64, e));
                }
            }
        }
        drop(file);

        Ok(&buffer[HEADER_SIZE..end])
    }

    /// Reads the record at `address` into a new vector.
    ///
    /// # Errors
    ///
    /// Same as [`FilePool::read`].
    pub fn read_to_vec(&self, address: Address) -> BlockstoreResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let payload = self.read(address, &mut buffer)?;
        Ok(payload.to_vec())
    }
}

/// Fills `buf` until it is full or the file ends; returns the bytes read.
fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
