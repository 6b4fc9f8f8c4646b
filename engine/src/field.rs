// Copyright 2020-2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Per-field encryption of entry data held in memory.
//!
//! Each attribute of an entry is sealed on its own, so one field can be
//! materialized or replaced without touching the others. There is no
//! chaining between fields and no stream IV; a sealed field is a
//! freestanding run of independently encrypted blocks, padded with random
//! filler in the unused tail.

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::cipher::{random_buf, BlockCipher, BlowfishCipher};

/// Session cipher guarding entry data in memory.
///
/// Keyed from the platform's secure random source when constructed and owned
/// by the caller; the key is cleared when the session is dropped. Entries
/// sealed under one session can only be opened under the same session.
pub struct FieldCipher {
    cipher: BlowfishCipher,
}

impl FieldCipher {
    /// Start a session under a fresh random key.
    pub fn new() -> Self {
        let mut key = Zeroizing::new([0u8; 32]);
        random_buf(&mut key[..]).expect("platform random source failed");
        Self {
            cipher: BlowfishCipher::new(&key),
        }
    }
}

impl Default for FieldCipher {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockCipher for FieldCipher {
    fn block_len(&self) -> usize {
        self.cipher.block_len()
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        self.cipher.encrypt_block(block)
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        self.cipher.decrypt_block(block)
    }
}

/// One sealed attribute: ciphertext plus the original length.
///
/// The ciphertext length is always a multiple of the cipher's block length;
/// a sealed length of zero holds no data at all.
#[derive(Debug, Clone, PartialEq, Eq, Default, Zeroize, ZeroizeOnDrop)]
pub struct SealedField {
    len: usize,
    ct: Vec<u8>,
}

impl SealedField {
    /// Seal `plain` under `cipher`, padding the unused tail of the final
    /// block with random filler.
    pub fn seal<C: BlockCipher>(plain: &[u8], cipher: &C) -> Self {
        if plain.is_empty() {
            return Self::default();
        }

        let bs = cipher.block_len();
        let blocks = (plain.len() + bs - 1) / bs;

        let mut ct = vec![0u8; blocks * bs];
        ct[..plain.len()].copy_from_slice(plain);
        random_buf(&mut ct[plain.len()..]).expect("platform random source failed");

        for block in ct.chunks_mut(bs) {
            cipher.encrypt_block(block);
        }

        Self {
            len: plain.len(),
            ct,
        }
    }

    /// Open the field and return the original bytes, cleared on drop.
    ///
    /// An empty field opens without allocating.
    pub fn open<C: BlockCipher>(&self, cipher: &C) -> Zeroizing<Vec<u8>> {
        if self.len == 0 {
            return Zeroizing::new(Vec::new());
        }

        let bs = cipher.block_len();
        debug_assert_eq!(self.ct.len() % bs, 0, "sealed under a different cipher");

        let mut plain = Zeroizing::new(self.ct.clone());
        for block in plain.chunks_mut(bs) {
            cipher.decrypt_block(block);
        }
        plain.truncate(self.len);
        plain
    }

    /// Length of the sealed plaintext.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cipher::{TwofishCipher, FIELD_BLOCK};
    use proptest::prelude::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let fc = FieldCipher::new();

        for plain in [
            &b""[..],
            b"x",
            b"xyz123",
            b"eight by",
            b"nine byte",
            b"a considerably longer value spanning several blocks",
        ] {
            let sealed = SealedField::seal(plain, &fc);
            assert_eq!(sealed.len(), plain.len());
            assert_eq!(sealed.ct.len() % FIELD_BLOCK, 0);
            assert_eq!(&*sealed.open(&fc), plain);
        }
    }

    #[test]
    fn test_empty_field_holds_no_data() {
        let fc = FieldCipher::new();
        let sealed = SealedField::seal(b"", &fc);
        assert!(sealed.is_empty());
        assert!(sealed.ct.is_empty());
        assert!(sealed.open(&fc).is_empty());
    }

    #[test]
    fn test_sealed_bytes_are_not_plaintext() {
        let fc = FieldCipher::new();
        let sealed = SealedField::seal(b"xyz123xy", &fc);
        assert_ne!(&sealed.ct[..], b"xyz123xy");
    }

    #[test]
    fn test_fields_are_independent() {
        let fc = FieldCipher::new();

        // two equal single-block values sealed apart from each other:
        // opening one must not depend on the other existing
        let a = SealedField::seal(b"password", &fc);
        let b = SealedField::seal(b"password", &fc);
        assert_eq!(&*a.open(&fc), b"password");
        assert_eq!(&*b.open(&fc), b"password");
        // single-block values carry no filler, so equal plaintext gives
        // equal ciphertext under the same session
        assert_eq!(a, b);
    }

    #[test]
    fn test_sessions_do_not_interchange() {
        let fc1 = FieldCipher::new();
        let fc2 = FieldCipher::new();

        let sealed = SealedField::seal(b"a secret", &fc1);
        assert_ne!(&*sealed.open(&fc2), b"a secret");
    }

    #[test]
    fn test_works_with_the_stream_cipher_too() {
        let cipher = TwofishCipher::new(&[5; 32]);
        let sealed = SealedField::seal(b"portable across block lengths", &cipher);
        assert_eq!(&*sealed.open(&cipher), b"portable across block lengths");
    }

    proptest! {
        #[test]
        fn prop_seal_open_identity(plain in proptest::collection::vec(any::<u8>(), 0..256)) {
            let fc = FieldCipher::new();
            let sealed = SealedField::seal(&plain, &fc);
            prop_assert_eq!(sealed.ct.len() % FIELD_BLOCK, 0);
            prop_assert_eq!(&*sealed.open(&fc), &plain[..]);
        }
    }
}
