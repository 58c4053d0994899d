//! Error types for encrypted file operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptFileError {
    #[error("{0} capability not available")]
    Capability(&'static str),

    #[error("Block range {first}+{count} extends past the {allocated} allocated blocks")]
    OutOfRange { first: u64, count: u64, allocated: u64 },

    #[error("Buffer of {actual} bytes does not cover {blocks} blocks of {block_size} bytes")]
    SizeMismatch {
        blocks: u64,
        block_size: usize,
        actual: usize,
    },

    #[error("File length {length} is not a multiple of block size {block_size}")]
    Format { length: u64, block_size: usize },

    #[error("Invalid block size: {0}")]
    InvalidBlockSize(usize),

    #[error("File is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CryptFileError>;
