// Copyright 2020-2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The container format: preamble layout, typed errors and the streaming
//! [`DbReader`]/[`DbWriter`] pair.
//!
//! A file is laid out as: magic tag, salt, iteration count, passphrase
//! verification tag, wrapped data key, wrapped MAC key, initial chaining
//! value, header records, entry records, sentinel block, digest. All
//! multi-byte integers are little-endian.

use std::{io, path::Path};

use thiserror::Error as DeriveError;

use crate::{entry::Entry, field::FieldCipher, header::Header, kdf::KdfError};

pub mod reader;
pub mod writer;

pub use reader::DbReader;
pub use writer::DbWriter;

/// Magic bytes (bytes 0-3 of a database file).
pub const MAGIC: [u8; 4] = *b"PWS3";

/// Format version written to new databases: major revision 3, minor 13.
pub const VERSION: u16 = 0x030d;

/// Major format revision this engine can read.
pub const VERSION_MAJOR: u8 = 0x03;

/// Preamble length: magic, salt, iteration count, verification tag, two
/// wrapped keys and the initial chaining value.
pub(crate) const PREAMBLE_LEN: u64 = 4 + 32 + 4 + 32 + 32 + 32 + 16;

/// Smallest well-formed file: preamble, sentinel block, digest.
pub(crate) const MIN_FILE_LEN: u64 = PREAMBLE_LEN + 16 + 32;

/// Failures while opening or reading a database.
///
/// `WrongPassphrase` and `BadDigest` are distinct codes for diagnostics, but
/// anything shown to a user must not reveal which of the two checks failed.
#[derive(Debug, DeriveError)]
pub enum ReadError {
    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("not a password database")]
    NotThisFormat,

    #[error("file is truncated")]
    Truncated,

    #[error("unsupported format revision `{found}`")]
    UnsupportedVersion { found: u8 },

    #[error("key derivation failed: {0}")]
    Kdf(#[from] KdfError),

    #[error("passphrase does not verify")]
    WrongPassphrase,

    #[error("integrity digest does not match")]
    BadDigest,

    #[error("corrupted file: {0}")]
    CorruptField(String),
}

impl From<io::Error> for ReadError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => ReadError::Truncated,
            _ => ReadError::Io(e),
        }
    }
}

/// Failures while creating or writing a database.
#[derive(Debug, DeriveError)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("generating random bytes failed: {0}")]
    Random(String),

    #[error("key derivation failed: {0}")]
    Kdf(#[from] KdfError),

    #[error("field of {0} bytes exceeds the format limit")]
    FieldTooLong(usize),
}

/// Write a whole database in one call: header, entries, sentinel, digest.
pub fn write_safe(
    path: &Path,
    passphrase: &[u8],
    iterations: u32,
    header: &Header,
    entries: &[Entry],
    cipher: &FieldCipher,
) -> Result<(), WriteError> {
    let mut writer = DbWriter::create(path, passphrase, iterations, header)?;
    for entry in entries {
        writer.write_entry(entry, cipher)?;
    }
    writer.close()
}

/// Read a whole database into memory, verifying the digest over the file.
pub fn read_safe(
    path: &Path,
    passphrase: &[u8],
    cipher: &FieldCipher,
) -> Result<(Header, Vec<Entry>), ReadError> {
    let mut reader = DbReader::open(path, passphrase)?;
    let mut entries = Vec::new();
    while let Some(entry) = reader.read_next_entry(cipher)? {
        entries.push(entry);
    }
    Ok((reader.into_header(), entries))
}
