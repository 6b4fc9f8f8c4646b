// Copyright 2020-2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::{fs::File, io::Read, path::Path};

use zeroize::Zeroize;

use crate::{
    cipher::{self, TwofishCipher, STREAM_BLOCK},
    codec::{BlockReader, FIELD_END},
    entry::Entry,
    field::FieldCipher,
    header::{read_header, Header},
    kdf,
    safe::{ReadError, MAGIC, MIN_FILE_LEN, PREAMBLE_LEN},
};

/// Streaming reader over a database file.
///
/// Opening authenticates the passphrase against the stored verification tag
/// and decodes the header section; entries are then pulled one at a time.
/// The digest over the whole stream is checked when the sentinel is reached,
/// and nothing read before that point may be trusted until
/// [`read_next_entry`][DbReader::read_next_entry] has returned `Ok(None)`.
pub struct DbReader {
    codec: BlockReader<File>,
    header: Header,
    finished: bool,
}

impl DbReader {
    /// Open `path` and verify `passphrase`.
    ///
    /// No file content is decrypted unless the passphrase verifies; a wrong
    /// passphrase fails before any entry material is touched.
    pub fn open(path: &Path, passphrase: &[u8]) -> Result<Self, ReadError> {
        let mut f = File::open(path).map_err(ReadError::Io)?;

        let file_len = f.metadata().map_err(ReadError::Io)?.len();
        if file_len < MIN_FILE_LEN {
            return Err(ReadError::Truncated);
        }

        let mut magic = [0u8; 4];
        f.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(ReadError::NotThisFormat);
        }

        let mut salt = [0u8; kdf::SALT_LEN];
        f.read_exact(&mut salt)?;

        let mut iter_bytes = [0u8; 4];
        f.read_exact(&mut iter_bytes)?;
        let iterations = u32::from_le_bytes(iter_bytes);

        let stretched = kdf::stretch(passphrase, &salt, iterations)?;

        let mut tag = [0u8; 32];
        f.read_exact(&mut tag)?;
        if kdf::verification_tag(&stretched) != tag {
            return Err(ReadError::WrongPassphrase);
        }

        let mut wrapped_data = [0u8; 32];
        f.read_exact(&mut wrapped_data)?;
        let mut wrapped_mac = [0u8; 32];
        f.read_exact(&mut wrapped_mac)?;

        let kek = TwofishCipher::new(&stretched);
        let data_key = cipher::unwrap_key(&wrapped_data, &kek);
        let mac_key = cipher::unwrap_key(&wrapped_mac, &kek);

        let mut iv = [0u8; STREAM_BLOCK];
        f.read_exact(&mut iv)?;

        let stream = TwofishCipher::new(&data_key);
        let mut codec = BlockReader::new(f, stream, iv, &mac_key[..], file_len - PREAMBLE_LEN);

        let header = read_header(&mut codec)?;

        Ok(Self {
            codec,
            header,
            finished: false,
        })
    }

    /// The header decoded at open time.
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn into_header(self) -> Header {
        self.header
    }

    /// Read the next entry, sealing each attribute under `cipher` as it
    /// arrives. `Ok(None)` means the sentinel was reached and the digest
    /// over the whole stream verified.
    pub fn read_next_entry(&mut self, cipher: &FieldCipher) -> Result<Option<Entry>, ReadError> {
        if self.finished {
            return Ok(None);
        }

        let mut entry = Entry::default();
        let mut pending = false;

        loop {
            match self.codec.read_field()? {
                None => {
                    self.finished = true;
                    if pending {
                        return Err(ReadError::CorruptField("unterminated entry".into()));
                    }
                    return Ok(None);
                }
                Some(field) if field.typ == FIELD_END => return Ok(Some(entry)),
                Some(mut field) => {
                    entry.insert_sealed(field.typ, &field.data, cipher);
                    field.data.zeroize();
                    pending = true;
                }
            }
        }
    }
}
