// Copyright 2020-2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Seam over the vetted cipher and MAC primitives.
//!
//! The engine consumes two block ciphers: a 128-bit-block cipher (Twofish)
//! that encrypts the on-disk record stream, and a 64-bit-block cipher
//! (Blowfish) that guards individual entry fields held in memory. Both are
//! used strictly as keyed block permutations; all modes of operation live in
//! the callers.

use cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use hmac::Hmac;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use zeroize::Zeroizing;

/// Streaming MAC run over every plaintext payload byte of the record stream.
pub type HmacSha256 = Hmac<Sha256>;

/// Block length of the file-stream cipher.
pub const STREAM_BLOCK: usize = 16;

/// Block length of the in-memory field cipher.
pub const FIELD_BLOCK: usize = 8;

/// A keyed block cipher operating on one block in place.
pub trait BlockCipher {
    /// block length in bytes
    fn block_len(&self) -> usize;

    /// encrypts one block in place; `block.len()` must equal [`block_len`][BlockCipher::block_len]
    fn encrypt_block(&self, block: &mut [u8]);

    /// decrypts one block in place; `block.len()` must equal [`block_len`][BlockCipher::block_len]
    fn decrypt_block(&self, block: &mut [u8]);
}

/// The 128-bit-block cipher keying the on-disk record stream.
pub struct TwofishCipher(twofish::Twofish);

impl TwofishCipher {
    /// key a cipher instance with a 32 byte key
    pub fn new(key: &[u8; 32]) -> Self {
        Self(twofish::Twofish::new_from_slice(key).expect("32 bytes is a valid twofish key length"))
    }
}

impl BlockCipher for TwofishCipher {
    fn block_len(&self) -> usize {
        STREAM_BLOCK
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        self.0.encrypt_block(GenericArray::from_mut_slice(block));
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        self.0.decrypt_block(GenericArray::from_mut_slice(block));
    }
}

/// The 64-bit-block cipher guarding entry fields at rest in memory.
pub struct BlowfishCipher(blowfish::Blowfish);

impl BlowfishCipher {
    /// key a cipher instance with a 32 byte key
    pub fn new(key: &[u8; 32]) -> Self {
        Self(blowfish::Blowfish::new_from_slice(key).expect("32 bytes is a valid blowfish key length"))
    }
}

impl BlockCipher for BlowfishCipher {
    fn block_len(&self) -> usize {
        FIELD_BLOCK
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        self.0.encrypt_block(GenericArray::from_mut_slice(block));
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        self.0.decrypt_block(GenericArray::from_mut_slice(block));
    }
}

/// Wrap a 32 byte key as two independently encrypted cipher blocks.
pub fn wrap_key(key: &[u8; 32], kek: &TwofishCipher) -> [u8; 32] {
    let mut out = *key;
    let (a, b) = out.split_at_mut(STREAM_BLOCK);
    kek.encrypt_block(a);
    kek.encrypt_block(b);
    out
}

/// Inverse of [`wrap_key`]. The unwrapped key is cleared on drop.
pub fn unwrap_key(wrapped: &[u8; 32], kek: &TwofishCipher) -> Zeroizing<[u8; 32]> {
    let mut out = Zeroizing::new(*wrapped);
    let (a, b) = out.split_at_mut(STREAM_BLOCK);
    kek.decrypt_block(a);
    kek.decrypt_block(b);
    out
}

/// Fill `buf` with bytes from the platform's secure random source.
pub fn random_buf(buf: &mut [u8]) -> Result<(), rand::Error> {
    OsRng.try_fill_bytes(buf)
}

/// A vector of `len` secure random bytes.
pub fn random_vec(len: usize) -> Result<Vec<u8>, rand::Error> {
    let mut buf = vec![0; len];
    random_buf(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_block_roundtrip() {
        let tf = TwofishCipher::new(&[7; 32]);
        let mut block = *b"sixteen byte blk";
        tf.encrypt_block(&mut block);
        assert_ne!(&block, b"sixteen byte blk");
        tf.decrypt_block(&mut block);
        assert_eq!(&block, b"sixteen byte blk");

        let bf = BlowfishCipher::new(&[7; 32]);
        let mut block = *b"eight by";
        bf.encrypt_block(&mut block);
        assert_ne!(&block, b"eight by");
        bf.decrypt_block(&mut block);
        assert_eq!(&block, b"eight by");
    }

    #[test]
    fn test_key_wrap_roundtrip() {
        let kek = TwofishCipher::new(&[3; 32]);
        let key = [0xab; 32];

        let wrapped = wrap_key(&key, &kek);
        assert_ne!(wrapped, key);

        let unwrapped = unwrap_key(&wrapped, &kek);
        assert_eq!(*unwrapped, key);
    }

    #[test]
    fn test_wrapped_halves_are_independent() {
        let kek = TwofishCipher::new(&[3; 32]);
        let key = [0x11; 32];

        // both halves of the key are equal, so independent encryption must
        // produce equal ciphertext blocks
        let wrapped = wrap_key(&key, &kek);
        assert_eq!(wrapped[..16], wrapped[16..]);
    }
}
