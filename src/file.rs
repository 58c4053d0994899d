//! Byte-addressed access over block storage
//!
//! [`CryptFile`] translates arbitrary `(offset, length)` byte ranges onto the
//! block boundaries of a [`BlockStore`]. Unaligned edges are handled by
//! read-merge-write: the boundary blocks are read back and their out-of-range
//! bytes are carried into the assembled buffer, so a partial-block write
//! never disturbs neighboring data. The assembled buffer is always an exact
//! number of blocks and is handed to the store as a single operation.
//!
//! The translator keeps no state of its own beyond the store it wraps: no
//! caching, no buffering across calls.

use crate::cipher::BlockTransform;
use crate::error::{CryptFileError, Result};
use crate::store::{AccessMode, BlockStore};
use std::path::Path;
use tracing::debug;

/// Byte-addressable view of an encrypted block file.
pub struct CryptFile {
    store: BlockStore,
}

impl CryptFile {
    /// Open (or create, when writable) an encrypted file for byte-level
    /// access. Parameters are those of [`BlockStore::open`].
    pub fn open<P: AsRef<Path>>(
        path: P,
        mode: AccessMode,
        encrypt: Option<Box<dyn BlockTransform>>,
        decrypt: Option<Box<dyn BlockTransform>>,
        block_size: usize,
    ) -> Result<Self> {
        Ok(CryptFile {
            store: BlockStore::open(path, mode, encrypt, decrypt, block_size)?,
        })
    }

    /// Wrap an already-open block store.
    pub fn new(store: BlockStore) -> Self {
        CryptFile { store }
    }

    /// Minimal covering block range for the byte range
    /// `[offset, offset + length)`: first block index and block count.
    fn covering_blocks(&self, offset: u64, length: usize) -> Result<(u64, u64)> {
        let block_size = self.store.block_size() as u64;
        let first = offset / block_size;
        match offset.checked_add(length as u64) {
            Some(end) => Ok((first, end.div_ceil(block_size) - first)),
            None => Err(CryptFileError::OutOfRange {
                first,
                count: (length as u64).div_ceil(block_size),
                allocated: self.store.allocated_blocks()?,
            }),
        }
    }

    /// Read `length` bytes starting at `offset`.
    ///
    /// Returns exactly the bytes previously written to that range,
    /// regardless of block alignment. Fails with `OutOfRange` if any covered
    /// block lies past the current allocation; no partial data is returned.
    pub fn read(&mut self, offset: u64, length: usize) -> Result<Vec<u8>> {
        if !self.store.mode().can_read() {
            return Err(CryptFileError::Capability("read"));
        }
        if length == 0 {
            return Ok(Vec::new());
        }
        let (first, count) = self.covering_blocks(offset, length)?;
        debug!("Reading {} bytes at offset {}", length, offset);

        let mut blocks = self.store.read_blocks(first, count)?;
        let skip = (offset % self.store.block_size() as u64) as usize;
        if skip == 0 {
            blocks.truncate(length);
            Ok(blocks)
        } else {
            Ok(blocks[skip..skip + length].to_vec())
        }
    }

    /// Write `data` starting at `offset`, growing the file as needed.
    ///
    /// Boundary blocks that are only partially covered are read back and
    /// merged so bytes outside the written range survive. Boundary blocks
    /// past the current allocation contribute zero-filled padding instead of
    /// failing. The merged buffer reaches the store as one block-aligned
    /// write, so no partial state is ever observable.
    pub fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        if !self.store.mode().can_write() {
            return Err(CryptFileError::Capability("write"));
        }
        if data.is_empty() {
            return Ok(());
        }
        let block_size = self.store.block_size();
        let (first, count) = self.covering_blocks(offset, data.len())?;
        let last = first + count - 1;
        let allocated = self.store.allocated_blocks()?;

        let head = (offset % block_size as u64) as usize;
        let tail = ((offset + data.len() as u64) % block_size as u64) as usize;
        debug!("Writing {} bytes at offset {}", data.len(), offset);

        let mut buf = Vec::with_capacity(count as usize * block_size);
        let mut head_block = None;
        if head != 0 {
            let block = if first < allocated {
                self.store.read_blocks(first, 1)?
            } else {
                vec![0u8; block_size]
            };
            buf.extend_from_slice(&block[..head]);
            if first == last {
                head_block = Some(block);
            }
        }
        buf.extend_from_slice(data);
        if tail != 0 {
            let block = match head_block {
                Some(block) => block,
                None if last < allocated => self.store.read_blocks(last, 1)?,
                None => vec![0u8; block_size],
            };
            buf.extend_from_slice(&block[tail..]);
        }
        debug_assert_eq!(buf.len(), count as usize * block_size);

        self.store.write_blocks(first, count, &buf)
    }

    /// Current file length in bytes; always a multiple of the block size.
    pub fn len(&self) -> Result<u64> {
        Ok(self.store.allocated_blocks()? * self.store.block_size() as u64)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.store.allocated_blocks()? == 0)
    }

    pub fn block_size(&self) -> usize {
        self.store.block_size()
    }

    pub fn mode(&self) -> AccessMode {
        self.store.mode()
    }

    /// Close the underlying store. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.store.close();
    }
}
