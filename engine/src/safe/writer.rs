// Copyright 2020-2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::{
    fs::{rename, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::{
    cipher::{self, TwofishCipher, STREAM_BLOCK},
    codec::{BlockWriter, FIELD_END},
    entry::Entry,
    field::FieldCipher,
    header::{write_header, Header},
    kdf,
    safe::{WriteError, MAGIC},
};

/// Streaming writer producing a complete database file.
///
/// All output goes to a sibling temporary file (the target name plus a
/// random hex suffix); the target is only replaced on
/// [`close`][DbWriter::close], so an interrupted save leaves the previous
/// database intact. This is currently known to be problematic if the path
/// is a symlink and/or if the target path resides in a directory without
/// user write permission.
pub struct DbWriter {
    codec: BlockWriter<File>,
    tmp: PathBuf,
    path: PathBuf,
}

impl DbWriter {
    /// Create a database at `path`, deriving fresh keys for it.
    ///
    /// The data and MAC keys are generated once here and wrapped under the
    /// stretched passphrase; the stretched key itself is cleared before this
    /// function returns.
    pub fn create(
        path: &Path,
        passphrase: &[u8],
        iterations: u32,
        header: &Header,
    ) -> Result<Self, WriteError> {
        let mut salt = [0u8; kdf::SALT_LEN];
        random(&mut salt)?;

        let stretched = kdf::stretch(passphrase, &salt, iterations)?;
        let tag = kdf::verification_tag(&stretched);

        let mut data_key = Zeroizing::new([0u8; 32]);
        random(&mut data_key[..])?;
        let mut mac_key = Zeroizing::new([0u8; 32]);
        random(&mut mac_key[..])?;

        let kek = TwofishCipher::new(&stretched);
        let wrapped_data = cipher::wrap_key(&data_key, &kek);
        let wrapped_mac = cipher::wrap_key(&mac_key, &kek);

        // random material is hashed before use as the initial chaining value
        let mut seed = [0u8; 32];
        random(&mut seed)?;
        let digest = Sha256::digest(seed);
        let mut iv = [0u8; STREAM_BLOCK];
        iv.copy_from_slice(&digest.as_slice()[..STREAM_BLOCK]);

        let mut suffix = [0u8; 6];
        random(&mut suffix)?;
        let mut s = path.as_os_str().to_os_string();
        s.push(".");
        s.push(hex::encode(suffix));
        let tmp = PathBuf::from(s);

        let mut f = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
        f.write_all(&MAGIC)?;
        f.write_all(&salt)?;
        f.write_all(&iterations.to_le_bytes())?;
        f.write_all(&tag)?;
        f.write_all(&wrapped_data)?;
        f.write_all(&wrapped_mac)?;
        f.write_all(&iv)?;

        let stream = TwofishCipher::new(&data_key);
        let mut codec = BlockWriter::new(f, stream, iv, &mac_key[..]);
        write_header(&mut codec, header)?;

        Ok(Self {
            codec,
            tmp,
            path: path.to_path_buf(),
        })
    }

    /// Write one entry as its run of records, attributes in ascending type
    /// order, closed by the end record.
    pub fn write_entry(&mut self, entry: &Entry, cipher: &FieldCipher) -> Result<(), WriteError> {
        for (typ, sealed) in entry.fields() {
            let data = sealed.open(cipher);
            self.codec.write_field(typ, &data)?;
        }
        self.codec.write_field(FIELD_END, &[])?;
        Ok(())
    }

    /// Seal the stream (sentinel, then digest), flush, and atomically
    /// replace the target file.
    pub fn close(self) -> Result<(), WriteError> {
        let f = self.codec.seal()?;
        f.sync_all()?;
        rename(&self.tmp, &self.path)?;
        Ok(())
    }
}

fn random(buf: &mut [u8]) -> Result<(), WriteError> {
    cipher::random_buf(buf).map_err(|e| WriteError::Random(e.to_string()))
}
