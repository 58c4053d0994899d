//! Block-addressed encrypted storage
//!
//! [`BlockStore`] owns the file handle and the cipher transforms. It is the
//! only component that invokes the cipher, and it does so exclusively over
//! spans that are an integral number of storage blocks, which is what a
//! padding-less block cipher requires. The on-disk file is a flat, headerless
//! sequence of ciphertext blocks; its length is always an exact multiple of
//! the block size.

use crate::cipher::BlockTransform;
use crate::error::{CryptFileError, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, info};

/// Access capabilities requested when opening a file.
///
/// Replaces mode strings ("r"/"w"/"rw") with an explicit enum validated once
/// at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn can_read(self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }
}

/// Block-addressed view of an encrypted file.
///
/// Blocks are fixed-size units identified by a zero-based index. On disk a
/// block holds ciphertext only; plaintext exists transiently in memory during
/// an access. A block is allocated iff its index is less than
/// [`allocated_blocks`](BlockStore::allocated_blocks).
pub struct BlockStore {
    /// Underlying handle; `None` once closed.
    file: Option<File>,
    block_size: usize,
    encrypt: Option<Box<dyn BlockTransform>>,
    decrypt: Option<Box<dyn BlockTransform>>,
    mode: AccessMode,
}

impl BlockStore {
    /// Open (or create, when writable) an encrypted block file.
    ///
    /// A transform must be supplied for each requested capability: `encrypt`
    /// for write access, `decrypt` for read access. Supplying a transform the
    /// mode does not strictly require is allowed; in particular a write-only
    /// store may carry a decrypt transform so that unaligned writes can read
    /// back boundary blocks.
    ///
    /// `block_size` must be a non-zero multiple of every supplied transform's
    /// granularity. An existing file whose length is not a multiple of
    /// `block_size` is rejected.
    pub fn open<P: AsRef<Path>>(
        path: P,
        mode: AccessMode,
        encrypt: Option<Box<dyn BlockTransform>>,
        decrypt: Option<Box<dyn BlockTransform>>,
        block_size: usize,
    ) -> Result<Self> {
        if block_size == 0 {
            return Err(CryptFileError::InvalidBlockSize(block_size));
        }
        for transform in encrypt.iter().chain(decrypt.iter()) {
            let granularity = transform.granularity();
            if granularity == 0 || block_size % granularity != 0 {
                return Err(CryptFileError::InvalidBlockSize(block_size));
            }
        }
        if mode.can_write() && encrypt.is_none() {
            return Err(CryptFileError::Capability("encrypt"));
        }
        if mode.can_read() && decrypt.is_none() {
            return Err(CryptFileError::Capability("decrypt"));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(mode.can_write())
            .create(mode.can_write())
            .open(path.as_ref())?;

        let length = file.metadata()?.len();
        if length % block_size as u64 != 0 {
            return Err(CryptFileError::Format { length, block_size });
        }

        info!(
            "Opened {:?}: {} blocks of {} bytes",
            path.as_ref(),
            length / block_size as u64,
            block_size
        );

        Ok(BlockStore {
            file: Some(file),
            block_size,
            encrypt,
            decrypt,
            mode,
        })
    }

    /// Read `block_count` whole blocks starting at `first_block`.
    ///
    /// The raw span is read in one positioned I/O operation and decrypted as
    /// a single unit. Reading any block past the current allocation fails
    /// with `OutOfRange` before any data is returned.
    pub fn read_blocks(&mut self, first_block: u64, block_count: u64) -> Result<Vec<u8>> {
        let block_size = self.block_size as u64;
        let Self { file, decrypt, .. } = self;
        let decrypt = decrypt
            .as_deref()
            .ok_or(CryptFileError::Capability("decrypt"))?;
        let file = file.as_mut().ok_or(CryptFileError::Closed)?;

        let allocated = file.metadata()?.len() / block_size;
        let in_range = first_block
            .checked_add(block_count)
            .map_or(false, |end| end <= allocated);
        if !in_range {
            return Err(CryptFileError::OutOfRange {
                first: first_block,
                count: block_count,
                allocated,
            });
        }

        let mut buf = vec![0u8; (block_count * block_size) as usize];
        file.seek(SeekFrom::Start(first_block * block_size))?;
        file.read_exact(&mut buf)?;
        decrypt.apply(&mut buf);
        Ok(buf)
    }

    /// Write `block_count` whole blocks of plaintext at `first_block`.
    ///
    /// `plaintext.len()` must equal `block_count * block_size` exactly. If
    /// the target range extends past the current allocation, the gap is
    /// closed first with zero-filled encrypted blocks so no holes ever exist.
    /// The span is then encrypted as a single unit and written in one
    /// positioned I/O operation. All validation happens before any mutation.
    pub fn write_blocks(&mut self, first_block: u64, block_count: u64, plaintext: &[u8]) -> Result<()> {
        if !self.mode.can_write() {
            return Err(CryptFileError::Capability("write"));
        }
        if self.encrypt.is_none() {
            return Err(CryptFileError::Capability("encrypt"));
        }
        let block_size = self.block_size as u64;
        let span_matches = block_count
            .checked_mul(block_size)
            .map_or(false, |span| span == plaintext.len() as u64);
        if !span_matches {
            return Err(CryptFileError::SizeMismatch {
                blocks: block_count,
                block_size: self.block_size,
                actual: plaintext.len(),
            });
        }

        let allocated = self.allocated_blocks()?;
        let end_block = first_block.checked_add(block_count).ok_or(
            CryptFileError::OutOfRange {
                first: first_block,
                count: block_count,
                allocated,
            },
        )?;
        if end_block > allocated {
            self.alloc_blocks(end_block - allocated)?;
        }

        let mut buf = plaintext.to_vec();
        let Self { file, encrypt, .. } = self;
        let encrypt = encrypt
            .as_deref()
            .ok_or(CryptFileError::Capability("encrypt"))?;
        let file = file.as_mut().ok_or(CryptFileError::Closed)?;

        encrypt.apply(&mut buf);
        file.seek(SeekFrom::Start(first_block * block_size))?;
        file.write_all(&buf)?;
        Ok(())
    }

    /// Append `n` zero-plaintext blocks, encrypted, at the current end of
    /// file.
    pub fn alloc_blocks(&mut self, n: u64) -> Result<()> {
        if !self.mode.can_write() {
            return Err(CryptFileError::Capability("write"));
        }
        let block_size = self.block_size;
        let Self { file, encrypt, .. } = self;
        let encrypt = encrypt
            .as_deref()
            .ok_or(CryptFileError::Capability("encrypt"))?;
        let file = file.as_mut().ok_or(CryptFileError::Closed)?;

        let mut zeros = vec![0u8; n as usize * block_size];
        encrypt.apply(&mut zeros);
        file.seek(SeekFrom::End(0))?;
        file.write_all(&zeros)?;
        debug!("Allocated {} blocks", n);
        Ok(())
    }

    /// Number of currently allocated blocks (`file length / block size`).
    pub fn allocated_blocks(&self) -> Result<u64> {
        let file = self.file.as_ref().ok_or(CryptFileError::Closed)?;
        Ok(file.metadata()?.len() / self.block_size as u64)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Release the file handle. Safe to call repeatedly; later calls are a
    /// no-op. Any other operation on a closed store fails with `Closed`.
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            debug!("Closed block store");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::{aes128_transforms, generate_key, Aes128Key};
    use rand::RngCore;
    use tempfile::NamedTempFile;

    const BLOCK_SIZE: usize = 16;

    fn open_rw(path: &Path, key: &Aes128Key) -> BlockStore {
        let (encrypt, decrypt) = aes128_transforms(key);
        BlockStore::open(path, AccessMode::ReadWrite, Some(encrypt), Some(decrypt), BLOCK_SIZE)
            .unwrap()
    }

    fn random_bytes(len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut data);
        data
    }

    #[test]
    fn test_alloc_write_read_roundtrip() {
        let temp = NamedTempFile::new().unwrap();
        let mut store = open_rw(temp.path(), &generate_key());

        store.alloc_blocks(10).unwrap();

        let data = random_bytes(BLOCK_SIZE * 9);
        store.write_blocks(1, 9, &data).unwrap();

        assert_eq!(store.read_blocks(1, 9).unwrap(), data);
        assert_eq!(store.allocated_blocks().unwrap(), 10);
    }

    #[test]
    fn test_write_past_allocation_grows_file() {
        let temp = NamedTempFile::new().unwrap();
        let mut store = open_rw(temp.path(), &generate_key());

        let data = random_bytes(BLOCK_SIZE * 9);
        store.write_blocks(1, 9, &data).unwrap();

        assert_eq!(store.allocated_blocks().unwrap(), 10);
        assert_eq!(store.read_blocks(1, 9).unwrap(), data);
        // The gap block was zero-filled
        assert_eq!(store.read_blocks(0, 1).unwrap(), vec![0u8; BLOCK_SIZE]);
    }

    #[test]
    fn test_overlapping_writes() {
        let temp = NamedTempFile::new().unwrap();
        let mut store = open_rw(temp.path(), &generate_key());

        let data1 = random_bytes(BLOCK_SIZE * 10);
        let data2 = random_bytes(BLOCK_SIZE * 10);
        store.write_blocks(0, 10, &data1).unwrap();
        store.write_blocks(5, 10, &data2).unwrap();

        let mut expected = data1[..5 * BLOCK_SIZE].to_vec();
        expected.extend_from_slice(&data2);

        assert_eq!(store.allocated_blocks().unwrap(), 15);
        assert_eq!(store.read_blocks(0, 15).unwrap(), expected);
    }

    #[test]
    fn test_read_past_allocation_fails() {
        let temp = NamedTempFile::new().unwrap();
        let mut store = open_rw(temp.path(), &generate_key());

        let data = random_bytes(BLOCK_SIZE * 5);
        store.write_blocks(1, 5, &data).unwrap();

        let result = store.read_blocks(1, 6);
        assert!(matches!(
            result,
            Err(CryptFileError::OutOfRange { first: 1, count: 6, allocated: 6 })
        ));
    }

    #[test]
    fn test_write_buffer_size_mismatch() {
        let temp = NamedTempFile::new().unwrap();
        let mut store = open_rw(temp.path(), &generate_key());

        let result = store.write_blocks(0, 2, &[0u8; BLOCK_SIZE]);
        assert!(matches!(result, Err(CryptFileError::SizeMismatch { .. })));
        // Nothing was allocated by the failed write
        assert_eq!(store.allocated_blocks().unwrap(), 0);
    }

    #[test]
    fn test_open_requires_matching_transforms() {
        let temp = NamedTempFile::new().unwrap();
        let key = generate_key();

        let (_, decrypt) = aes128_transforms(&key);
        let result =
            BlockStore::open(temp.path(), AccessMode::ReadWrite, None, Some(decrypt), BLOCK_SIZE);
        assert!(matches!(result, Err(CryptFileError::Capability("encrypt"))));

        let (encrypt, _) = aes128_transforms(&key);
        let result =
            BlockStore::open(temp.path(), AccessMode::ReadOnly, Some(encrypt), None, BLOCK_SIZE);
        assert!(matches!(result, Err(CryptFileError::Capability("decrypt"))));
    }

    #[test]
    fn test_read_without_decrypt_transform() {
        let temp = NamedTempFile::new().unwrap();
        let (encrypt, _) = aes128_transforms(&generate_key());
        let mut store =
            BlockStore::open(temp.path(), AccessMode::WriteOnly, Some(encrypt), None, BLOCK_SIZE)
                .unwrap();

        store.alloc_blocks(2).unwrap();
        let result = store.read_blocks(0, 1);
        assert!(matches!(result, Err(CryptFileError::Capability("decrypt"))));
    }

    #[test]
    fn test_write_in_read_only_mode() {
        let temp = NamedTempFile::new().unwrap();
        let (encrypt, decrypt) = aes128_transforms(&generate_key());
        let mut store =
            BlockStore::open(temp.path(), AccessMode::ReadOnly, Some(encrypt), Some(decrypt), BLOCK_SIZE)
                .unwrap();

        let result = store.write_blocks(0, 1, &[0u8; BLOCK_SIZE]);
        assert!(matches!(result, Err(CryptFileError::Capability("write"))));
    }

    #[test]
    fn test_open_rejects_unaligned_file() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), [0u8; 10]).unwrap();

        let (encrypt, decrypt) = aes128_transforms(&generate_key());
        let result = BlockStore::open(
            temp.path(),
            AccessMode::ReadWrite,
            Some(encrypt),
            Some(decrypt),
            BLOCK_SIZE,
        );
        assert!(matches!(
            result,
            Err(CryptFileError::Format { length: 10, block_size: BLOCK_SIZE })
        ));
    }

    #[test]
    fn test_rejects_bad_block_sizes() {
        let temp = NamedTempFile::new().unwrap();
        let key = generate_key();

        let (encrypt, decrypt) = aes128_transforms(&key);
        let result =
            BlockStore::open(temp.path(), AccessMode::ReadWrite, Some(encrypt), Some(decrypt), 0);
        assert!(matches!(result, Err(CryptFileError::InvalidBlockSize(0))));

        // Not a multiple of the AES granularity
        let (encrypt, decrypt) = aes128_transforms(&key);
        let result =
            BlockStore::open(temp.path(), AccessMode::ReadWrite, Some(encrypt), Some(decrypt), 10);
        assert!(matches!(result, Err(CryptFileError::InvalidBlockSize(10))));

        // A larger multiple of the granularity is fine
        let (encrypt, decrypt) = aes128_transforms(&key);
        assert!(BlockStore::open(
            temp.path(),
            AccessMode::ReadWrite,
            Some(encrypt),
            Some(decrypt),
            64
        )
        .is_ok());
    }

    #[test]
    fn test_file_length_stays_block_aligned() {
        let temp = NamedTempFile::new().unwrap();
        let mut store = open_rw(temp.path(), &generate_key());

        store.alloc_blocks(3).unwrap();
        store.write_blocks(7, 2, &random_bytes(BLOCK_SIZE * 2)).unwrap();

        let raw_len = std::fs::metadata(temp.path()).unwrap().len();
        assert_eq!(raw_len % BLOCK_SIZE as u64, 0);
        assert_eq!(raw_len, 9 * BLOCK_SIZE as u64);
    }

    #[test]
    fn test_close_is_idempotent() {
        let temp = NamedTempFile::new().unwrap();
        let mut store = open_rw(temp.path(), &generate_key());

        store.close();
        store.close();

        assert!(matches!(store.read_blocks(0, 1), Err(CryptFileError::Closed)));
        assert!(matches!(store.allocated_blocks(), Err(CryptFileError::Closed)));
    }
}
