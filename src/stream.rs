//! Typed stream facade over byte-level access
//!
//! [`CryptStream`] adds a cursor and fixed-width big-endian encodings on top
//! of [`CryptFile`]. It is implemented purely in terms of the byte-level
//! read/write primitive and never touches block arithmetic; the translator
//! below it remains the sole source of truth for byte-level correctness.

use crate::cipher::BlockTransform;
use crate::error::Result;
use crate::file::CryptFile;
use crate::store::AccessMode;
use std::path::Path;

/// Cursor-carrying stream of typed values over an encrypted file.
///
/// All multi-byte encodings are big-endian. Every accessor advances the
/// cursor by exactly the width it consumed or produced; failed operations
/// leave the cursor unchanged.
pub struct CryptStream {
    file: CryptFile,
    position: u64,
}

impl CryptStream {
    /// Open (or create, when writable) an encrypted file for stream access.
    /// Parameters are those of [`BlockStore::open`](crate::store::BlockStore::open).
    pub fn open<P: AsRef<Path>>(
        path: P,
        mode: AccessMode,
        encrypt: Option<Box<dyn BlockTransform>>,
        decrypt: Option<Box<dyn BlockTransform>>,
        block_size: usize,
    ) -> Result<Self> {
        Ok(CryptStream {
            file: CryptFile::open(path, mode, encrypt, decrypt, block_size)?,
            position: 0,
        })
    }

    /// Wrap an already-open file; the cursor starts at zero.
    pub fn new(file: CryptFile) -> Self {
        CryptStream { file, position: 0 }
    }

    /// Current cursor position in bytes.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Move the cursor to an absolute byte position.
    pub fn seek(&mut self, position: u64) {
        self.position = position;
    }

    /// Advance the cursor by `n` bytes without reading.
    pub fn skip(&mut self, n: u64) {
        self.position = self.position.saturating_add(n);
    }

    /// File length in bytes; always a multiple of the block size.
    pub fn len(&self) -> Result<u64> {
        self.file.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.file.is_empty()
    }

    /// Read exactly `length` bytes at the cursor and advance it.
    pub fn read_exact(&mut self, length: usize) -> Result<Vec<u8>> {
        let bytes = self.file.read(self.position, length)?;
        self.position += length as u64;
        Ok(bytes)
    }

    /// Write all of `data` at the cursor and advance it.
    pub fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.file.write(self.position, data)?;
        self.position += data.len() as u64;
        Ok(())
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_exact(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(&bytes);
        Ok(array)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read one byte; zero is `false`, anything else is `true`.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_be_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.read_array()?))
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_all(&[value])
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write_u8(value as u8)
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(u8::from(value))
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    /// Read bytes up to and including the next `\n` and advance the cursor
    /// past them. Returns `None` when the cursor is at or past end of file.
    /// A final line without a terminator is returned as-is. Invalid UTF-8 is
    /// replaced lossily.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let end = self.file.len()?;
        if self.position >= end {
            return Ok(None);
        }
        let mut bytes = Vec::new();
        while self.position < end {
            let byte = self.read_u8()?;
            bytes.push(byte);
            if byte == b'\n' {
                break;
            }
        }
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Close the underlying file. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.file.close();
    }
}
