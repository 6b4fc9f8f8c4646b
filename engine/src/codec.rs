// Copyright 2020-2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The chained record codec.
//!
//! Every record in a database file is a sequence of cipher blocks. Each
//! block is combined with the evolving chaining value before encryption and
//! the ciphertext becomes the next chaining value, so a block's ciphertext
//! depends on everything encoded before it. A record starts with a header
//! block carrying its length and type (padded with random filler so short
//! records don't expose themselves to dictionary comparison), followed by
//! the payload in zero-padded chunks. Every payload plaintext byte is also
//! folded into a running MAC, finalized into the digest that closes the
//! file behind the sentinel block.

use std::io::{Read, Write};

use hmac::Mac;
use serde::{Deserialize, Serialize};

use crate::{
    cipher::{self, BlockCipher, HmacSha256, TwofishCipher, STREAM_BLOCK},
    safe::{ReadError, WriteError},
};

/// End-of-stream marker, encoded through the codec like any other block.
pub const SENTINEL: [u8; STREAM_BLOCK] = *b"PWS3-EOFPWS3-EOF";

/// Record type terminating the header section and each entry.
pub const FIELD_END: u8 = 0xff;

/// Length of the digest written after the sentinel.
pub const DIGEST_LEN: usize = 32;

/// One typed record: a type byte and its payload. Types this engine does
/// not recognize still round-trip through [`RawField`] byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawField {
    pub typ: u8,
    pub data: Vec<u8>,
}

/// Source of the filler bytes behind a record's length and type.
pub(crate) enum Filler {
    Random,
    #[cfg(test)]
    Fixed(u8),
}

impl Filler {
    fn fill(&self, buf: &mut [u8]) -> Result<(), WriteError> {
        match self {
            Filler::Random => cipher::random_buf(buf).map_err(|e| WriteError::Random(e.to_string())),
            #[cfg(test)]
            Filler::Fixed(b) => {
                buf.iter_mut().for_each(|x| *x = *b);
                Ok(())
            }
        }
    }
}

/// Encrypting half of the codec, layered over any [`Write`] sink.
pub struct BlockWriter<W: Write> {
    out: W,
    cipher: TwofishCipher,
    cv: [u8; STREAM_BLOCK],
    hmac: HmacSha256,
    filler: Filler,
}

impl<W: Write> BlockWriter<W> {
    /// Start a stream at `iv` with the given stream cipher and MAC key.
    pub fn new(out: W, cipher: TwofishCipher, iv: [u8; STREAM_BLOCK], mac_key: &[u8]) -> Self {
        Self {
            out,
            cipher,
            cv: iv,
            hmac: <HmacSha256 as Mac>::new_from_slice(mac_key).expect("hmac accepts any key length"),
            filler: Filler::Random,
        }
    }

    /// Combine with the chaining value, encrypt, emit, advance the chain.
    fn put_block(&mut self, block: &mut [u8; STREAM_BLOCK]) -> Result<(), WriteError> {
        for (b, c) in block.iter_mut().zip(self.cv.iter()) {
            *b ^= *c;
        }
        self.cipher.encrypt_block(block);
        self.cv.copy_from_slice(block);
        self.out.write_all(block)?;
        Ok(())
    }

    /// Write one typed record; returns the bytes it occupies on disk.
    ///
    /// Zero-length records are valid and still consume one cipher block.
    pub fn write_field(&mut self, typ: u8, data: &[u8]) -> Result<usize, WriteError> {
        let len = u32::try_from(data.len()).map_err(|_| WriteError::FieldTooLong(data.len()))?;

        let mut head = [0u8; STREAM_BLOCK];
        head[..4].copy_from_slice(&len.to_le_bytes());
        head[4] = typ;
        self.filler.fill(&mut head[5..])?;
        self.put_block(&mut head)?;

        self.hmac.update(data);

        let mut written = STREAM_BLOCK;
        for chunk in data.chunks(STREAM_BLOCK) {
            let mut block = [0u8; STREAM_BLOCK];
            // the tail of a partial final chunk stays zero
            block[..chunk.len()].copy_from_slice(chunk);
            self.put_block(&mut block)?;
            written += STREAM_BLOCK;
        }
        Ok(written)
    }

    /// Close the stream: the sentinel goes through the chain like any other
    /// block, then the finalized digest follows in the clear.
    pub fn seal(mut self) -> Result<W, WriteError> {
        let mut block = SENTINEL;
        self.put_block(&mut block)?;

        let digest = self.hmac.finalize().into_bytes();
        self.out.write_all(digest.as_slice())?;
        Ok(self.out)
    }
}

/// Decrypting half of the codec, the exact mirror of [`BlockWriter`].
pub struct BlockReader<R: Read> {
    inp: R,
    cipher: TwofishCipher,
    cv: [u8; STREAM_BLOCK],
    hmac: HmacSha256,
    /// bytes of stream left behind the current position, so a decrypted
    /// length can be sanity-checked before it sizes anything
    remaining: u64,
    done: bool,
}

impl<R: Read> BlockReader<R> {
    /// Start reading at `iv`; `remaining` is the stream length past the
    /// preamble.
    pub fn new(
        inp: R,
        cipher: TwofishCipher,
        iv: [u8; STREAM_BLOCK],
        mac_key: &[u8],
        remaining: u64,
    ) -> Self {
        Self {
            inp,
            cipher,
            cv: iv,
            hmac: <HmacSha256 as Mac>::new_from_slice(mac_key).expect("hmac accepts any key length"),
            remaining,
            done: false,
        }
    }

    /// Read one block, decrypt, undo the chain combination, advance.
    fn take_block(&mut self) -> Result<[u8; STREAM_BLOCK], ReadError> {
        let mut block = [0u8; STREAM_BLOCK];
        self.inp.read_exact(&mut block)?;
        self.remaining = self.remaining.saturating_sub(STREAM_BLOCK as u64);

        let ct = block;
        self.cipher.decrypt_block(&mut block);
        for (b, c) in block.iter_mut().zip(self.cv.iter()) {
            *b ^= *c;
        }
        self.cv = ct;
        Ok(block)
    }

    /// Read the next typed record. `Ok(None)` means the sentinel was reached
    /// and the digest over the whole stream verified.
    pub fn read_field(&mut self) -> Result<Option<RawField>, ReadError> {
        if self.done {
            return Ok(None);
        }

        let head = self.take_block()?;
        if head == SENTINEL {
            return self.verify_digest().map(|()| None);
        }

        let len = u32::from_le_bytes(head[..4].try_into().expect("4 byte length prefix")) as u64;
        let typ = head[4];

        const BS: u64 = STREAM_BLOCK as u64;
        let payload_blocks = (len + BS - 1) / BS;
        // the sentinel block and digest still have to fit behind the payload
        if payload_blocks * BS + BS + DIGEST_LEN as u64 > self.remaining {
            return Err(ReadError::CorruptField(format!(
                "field of {} bytes does not fit in the remaining stream",
                len
            )));
        }

        let mut data = vec![0u8; len as usize];
        let mut off = 0;
        for _ in 0..payload_blocks {
            let block = self.take_block()?;
            let take = usize::min(STREAM_BLOCK, data.len() - off);
            data[off..off + take].copy_from_slice(&block[..take]);
            off += take;
        }
        self.hmac.update(&data);

        Ok(Some(RawField { typ, data }))
    }

    fn verify_digest(&mut self) -> Result<(), ReadError> {
        self.done = true;

        let mut digest = [0u8; DIGEST_LEN];
        self.inp.read_exact(&mut digest)?;

        self.hmac
            .clone()
            .verify_slice(&digest)
            .map_err(|_| ReadError::BadDigest)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use passvault_utils::{random, test_utils};
    use proptest::prelude::*;

    const CIPHER_KEY: [u8; 32] = [0x42; 32];
    const MAC_KEY: [u8; 32] = [0x17; 32];
    const IV: [u8; STREAM_BLOCK] = [0x0f; STREAM_BLOCK];

    fn writer() -> BlockWriter<Vec<u8>> {
        BlockWriter::new(Vec::new(), TwofishCipher::new(&CIPHER_KEY), IV, &MAC_KEY)
    }

    fn reader(buf: &[u8]) -> BlockReader<&[u8]> {
        BlockReader::new(
            buf,
            TwofishCipher::new(&CIPHER_KEY),
            IV,
            &MAC_KEY,
            buf.len() as u64,
        )
    }

    fn roundtrip(fields: &[(u8, Vec<u8>)]) {
        let mut w = writer();
        for (typ, data) in fields {
            let written = w.write_field(*typ, data).unwrap();
            assert_eq!(written % STREAM_BLOCK, 0);
            assert!(written >= STREAM_BLOCK + data.len());
        }
        let buf = w.seal().unwrap();

        let mut r = reader(&buf);
        for (typ, data) in fields {
            let field = r.read_field().unwrap().unwrap();
            assert_eq!(field.typ, *typ);
            assert_eq!(&field.data, data);
        }
        assert!(r.read_field().unwrap().is_none());
        // reading past the end stays at the end
        assert!(r.read_field().unwrap().is_none());
    }

    #[test]
    fn test_roundtrip() {
        roundtrip(&[
            (0x03, b"Bank".to_vec()),
            (0x06, b"xyz123".to_vec()),
            (0x05, b"a note that is longer than one cipher block".to_vec()),
            (0xfe, Vec::new()),
            (0x20, vec![0u8; STREAM_BLOCK]),
            (0xff, Vec::new()),
        ]);
    }

    #[test]
    fn test_roundtrip_random_fields() {
        let fields: Vec<(u8, Vec<u8>)> = (0..32)
            .map(|_| (random::random(), random::bytestring(256)))
            .collect();
        roundtrip(&fields);
    }

    #[test]
    fn test_empty_stream() {
        let buf = writer().seal().unwrap();
        assert_eq!(buf.len(), STREAM_BLOCK + DIGEST_LEN);

        let mut r = reader(&buf);
        assert!(r.read_field().unwrap().is_none());
    }

    #[test]
    fn test_chaining_is_deterministic() {
        let encode = || {
            let mut w = writer();
            w.filler = Filler::Fixed(0xa5);
            w.write_field(0x03, b"Bank").unwrap();
            w.write_field(0x06, b"xyz123").unwrap();
            w.seal().unwrap()
        };
        assert_eq!(encode(), encode());
    }

    #[test]
    fn test_identical_records_have_distinct_ciphertext() {
        let mut w = writer();
        w.filler = Filler::Fixed(0xa5);
        w.write_field(0x03, b"same").unwrap();
        w.write_field(0x03, b"same").unwrap();
        let buf = w.seal().unwrap();

        // the chain makes the second copy differ even with fixed filler
        assert_ne!(buf[..32], buf[32..64]);
    }

    #[test]
    fn test_truncated_stream() {
        let mut w = writer();
        w.write_field(0x03, b"Bank").unwrap();
        let buf = w.seal().unwrap();

        let mut r = reader(&buf[..buf.len() - 10]);
        assert!(matches!(r.read_field(), Ok(Some(_))));
        assert!(matches!(r.read_field(), Err(ReadError::Truncated)));
    }

    #[test]
    fn test_corrupted_stream() {
        let mut w = writer();
        w.write_field(0x03, b"Bank").unwrap();
        w.write_field(0x06, b"xyz123").unwrap();
        let mut buf = w.seal().unwrap();

        test_utils::corrupt(&mut buf);

        let mut r = reader(&buf);
        let mut fields = 0;
        let outcome = loop {
            match r.read_field() {
                Ok(Some(_)) => fields += 1,
                Ok(None) => break Ok(fields),
                Err(e) => break Err(e),
            }
        };
        assert!(outcome.is_err(), "corruption must never verify");
    }

    #[test]
    fn test_implausible_length_is_rejected() {
        let mut w = writer();
        w.write_field(0x03, b"Bank").unwrap();
        let buf = w.seal().unwrap();

        // claim more payload than the stream holds: truncate right after the
        // record's header block
        let mut r = reader(&buf[..STREAM_BLOCK]);
        assert!(matches!(r.read_field(), Err(ReadError::CorruptField(_))));
    }

    proptest! {
        #[test]
        fn prop_roundtrip(typ in 0u8..0xff, data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let mut w = writer();
            w.write_field(typ, &data).unwrap();
            let buf = w.seal().unwrap();

            let mut r = reader(&buf);
            let field = r.read_field().unwrap().unwrap();
            prop_assert_eq!(field.typ, typ);
            prop_assert_eq!(field.data, data);
            prop_assert!(r.read_field().unwrap().is_none());
        }
    }
}
