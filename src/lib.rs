//! # Cryptfile - Encrypted Random Access Files
//!
//! `cryptfile` provides byte-addressable random access (read/write at
//! arbitrary offset and length) to a file whose contents are transparently
//! protected by a padding-less block cipher. The cipher operates only on
//! whole, fixed-size blocks with no chaining state between invocations, so
//! the crate reconciles byte-level requests with block-level constraints:
//!
//! - **Byte-exact round trips** at any alignment
//! - **Read-merge-write** at partial-block boundaries, preserving unrelated
//!   data
//! - **On-demand allocation** with zero-filled encrypted blocks, no holes
//! - **Block-aligned file length** maintained at all times
//! - **Single cipher + I/O operation** per request, over exact block
//!   multiples only
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ CryptStream (src/stream.rs)                 │
//! │  - cursor, big-endian typed values, lines   │
//! ├─────────────────────────────────────────────┤
//! │ CryptFile (src/file.rs)                     │
//! │  - byte offsets → block ranges              │
//! │  - boundary read-merge-write                │
//! ├─────────────────────────────────────────────┤
//! │ BlockStore (src/store.rs)                   │
//! │  - block-addressed encrypted I/O            │
//! │  - allocation, alignment invariant          │
//! ├─────────────────────────────────────────────┤
//! │ BlockTransform (src/cipher.rs)              │
//! │  - ECB over any RustCrypto block cipher     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! On disk the file is a flat, headerless sequence of ciphertext blocks.
//! Plaintext only ever exists transiently in memory during an access.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cryptfile::{aes128_transforms, generate_key, AccessMode, CryptFile};
//!
//! # fn main() -> cryptfile::Result<()> {
//! let key = generate_key();
//! let (encrypt, decrypt) = aes128_transforms(&key);
//!
//! let mut file = CryptFile::open(
//!     "data.enc",
//!     AccessMode::ReadWrite,
//!     Some(encrypt),
//!     Some(decrypt),
//!     16,
//! )?;
//!
//! // Offsets and lengths need not align to the 16-byte cipher blocks.
//! file.write(10, b"hello world")?;
//! assert_eq!(file.read(10, 11)?, b"hello world");
//! # Ok(())
//! # }
//! ```
//!
//! ## Limitations
//!
//! Single file, single thread: callers serialize access themselves. The
//! cipher provides confidentiality only; there is no integrity or
//! authentication layer, and no durability guarantee beyond what the
//! operating system provides.

pub mod cipher;
pub mod error;
pub mod file;
pub mod store;
pub mod stream;

// Re-export commonly used types
pub use cipher::{
    aes128_transforms, generate_key, Aes128EcbDecryptor, Aes128EcbEncryptor, Aes128Key,
    BlockTransform, EcbDecryptor, EcbEncryptor,
};
pub use error::{CryptFileError, Result};
pub use file::CryptFile;
pub use store::{AccessMode, BlockStore};
pub use stream::CryptStream;
