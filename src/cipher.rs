//! Padding-less block cipher transforms
//!
//! The storage layer encrypts and decrypts whole blocks only, so the cipher
//! abstraction here is deliberately narrow: a deterministic in-place transform
//! over spans whose length is a multiple of the cipher's native chunk size.
//! No chaining state survives between calls, which is what allows random
//! access to individual blocks without touching their neighbors.
//!
//! [`EcbEncryptor`] and [`EcbDecryptor`] run any RustCrypto block cipher in
//! electronic-codebook mode without padding. AES-128 aliases are provided as
//! the usual configuration (16-byte cipher blocks).

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, BlockSizeUser, Key, KeyInit};
use rand::rngs::OsRng;
use rand::RngCore;

/// Deterministic transform applied in place to whole-block spans.
///
/// Implementations carry no state between calls: the same input span always
/// produces the same output. Callers only ever pass spans whose length is a
/// multiple of [`granularity`](BlockTransform::granularity).
pub trait BlockTransform {
    /// Native chunk size of the underlying cipher, in bytes.
    fn granularity(&self) -> usize;

    /// Transform `buf` in place. `buf.len()` is a multiple of `granularity()`.
    fn apply(&self, buf: &mut [u8]);
}

/// Encrypting transform: a block cipher in ECB mode, no padding.
pub struct EcbEncryptor<C> {
    cipher: C,
}

impl<C: BlockEncrypt + KeyInit> EcbEncryptor<C> {
    pub fn new(key: &Key<C>) -> Self {
        EcbEncryptor { cipher: C::new(key) }
    }
}

impl<C: BlockEncrypt> BlockTransform for EcbEncryptor<C> {
    fn granularity(&self) -> usize {
        C::block_size()
    }

    fn apply(&self, buf: &mut [u8]) {
        debug_assert_eq!(buf.len() % C::block_size(), 0);
        for chunk in buf.chunks_exact_mut(C::block_size()) {
            self.cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
        }
    }
}

/// Decrypting transform: a block cipher in ECB mode, no padding.
pub struct EcbDecryptor<C> {
    cipher: C,
}

impl<C: BlockDecrypt + KeyInit> EcbDecryptor<C> {
    pub fn new(key: &Key<C>) -> Self {
        EcbDecryptor { cipher: C::new(key) }
    }
}

impl<C: BlockDecrypt> BlockTransform for EcbDecryptor<C> {
    fn granularity(&self) -> usize {
        C::block_size()
    }

    fn apply(&self, buf: &mut [u8]) {
        debug_assert_eq!(buf.len() % C::block_size(), 0);
        for chunk in buf.chunks_exact_mut(C::block_size()) {
            self.cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
        }
    }
}

/// AES-128 encrypting transform (16-byte blocks).
pub type Aes128EcbEncryptor = EcbEncryptor<aes::Aes128>;

/// AES-128 decrypting transform (16-byte blocks).
pub type Aes128EcbDecryptor = EcbDecryptor<aes::Aes128>;

/// Encryption key for the AES-128 transforms (16 bytes).
pub type Aes128Key = [u8; 16];

/// Generate a random AES-128 key.
pub fn generate_key() -> Aes128Key {
    let mut key = [0u8; 16];
    OsRng.fill_bytes(&mut key);
    key
}

/// Boxed AES-128 transform pair for `key`, ready to hand to
/// [`BlockStore::open`](crate::store::BlockStore::open).
pub fn aes128_transforms(key: &Aes128Key) -> (Box<dyn BlockTransform>, Box<dyn BlockTransform>) {
    (
        Box::new(Aes128EcbEncryptor::new(&(*key).into())),
        Box::new(Aes128EcbDecryptor::new(&(*key).into())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let key1 = generate_key();
        let key2 = generate_key();

        // Keys should be different
        assert_ne!(key1, key2);
        assert_eq!(key1.len(), 16);
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = generate_key();
        let (encrypt, decrypt) = aes128_transforms(&key);

        let plaintext = *b"exactly 32 bytes of test data...";
        let mut buf = plaintext;

        encrypt.apply(&mut buf);
        assert_ne!(buf, plaintext);

        decrypt.apply(&mut buf);
        assert_eq!(buf, plaintext);
    }

    #[test]
    fn test_granularity_is_cipher_block_size() {
        let key = generate_key();
        let (encrypt, decrypt) = aes128_transforms(&key);

        assert_eq!(encrypt.granularity(), 16);
        assert_eq!(decrypt.granularity(), 16);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let key = generate_key();
        let (encrypt, _) = aes128_transforms(&key);

        let mut first = [0xAB_u8; 16];
        let mut second = [0xAB_u8; 16];
        encrypt.apply(&mut first);
        encrypt.apply(&mut second);

        assert_eq!(first, second);
    }

    #[test]
    fn test_wrong_key_garbles_plaintext() {
        let (encrypt, _) = aes128_transforms(&generate_key());
        let (_, decrypt) = aes128_transforms(&generate_key());

        let plaintext = [0x42_u8; 16];
        let mut buf = plaintext;
        encrypt.apply(&mut buf);
        decrypt.apply(&mut buf);

        assert_ne!(buf, plaintext);
    }

    #[test]
    fn test_multi_block_span() {
        let key = generate_key();
        let (encrypt, decrypt) = aes128_transforms(&key);

        let plaintext: Vec<u8> = (0..160).map(|i| i as u8).collect();
        let mut buf = plaintext.clone();

        encrypt.apply(&mut buf);
        decrypt.apply(&mut buf);

        assert_eq!(buf, plaintext);
    }
}
