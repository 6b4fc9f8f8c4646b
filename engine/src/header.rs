// Copyright 2020-2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! File-level metadata records.
//!
//! The header section is an ordered run of typed records terminated by the
//! end record. Types this engine does not know are kept byte-for-byte and
//! re-emitted on the next write, so files produced by newer revisions
//! survive a round trip through an older reader.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::{
    codec::{BlockReader, BlockWriter, RawField, FIELD_END},
    ids::UniqueId,
    safe::{ReadError, WriteError, VERSION, VERSION_MAJOR},
};

/// Header field types.
pub const HDR_VERSION: u8 = 0x00;
pub const HDR_UUID: u8 = 0x01;
pub const HDR_PREFS: u8 = 0x02;
pub const HDR_DISPSTAT: u8 = 0x03;
pub const HDR_LASTUPDATETIME: u8 = 0x04;
pub const HDR_LASTUPDATEREF: u8 = 0x05;
pub const HDR_APPLICATION: u8 = 0x06;
pub const HDR_LASTUPDATEUSER: u8 = 0x07;
pub const HDR_LASTUPDATEHOST: u8 = 0x08;
pub const HDR_DBNAME: u8 = 0x09;
pub const HDR_DBDESC: u8 = 0x0a;
pub const HDR_FILTERS: u8 = 0x0b;
pub const HDR_POLICIES: u8 = 0x10;
pub const HDR_EMPTYGROUP: u8 = 0x11;

/// File-level metadata carried before the entry section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// format revision, major byte and minor byte
    pub version: u16,
    /// identifier of the database itself
    pub uuid: UniqueId,
    /// serialized non-default preferences
    pub prefs: String,
    /// tree display status bitstring
    pub display_status: String,
    /// seconds since the epoch of the last save, zero if never recorded
    pub last_save_time: u32,
    pub last_saved_by: String,
    pub last_saved_host: String,
    /// name and version of the application performing the last save
    pub last_save_app: String,
    pub name: String,
    pub description: String,
    /// serialized filter definitions, kept opaque
    pub filters: Option<Vec<u8>>,
    /// serialized named password policies, kept opaque
    pub policies: Option<Vec<u8>>,
    pub empty_groups: Vec<String>,
    /// the overloaded legacy update field, re-emitted verbatim
    pub legacy_update: Option<LegacyUpdate>,
    /// field types unknown to this revision, preserved byte-for-byte
    pub unknown: Vec<RawField>,
}

impl Header {
    /// Fresh header for a new database.
    pub fn new() -> Self {
        Self {
            version: VERSION,
            uuid: UniqueId::random(),
            prefs: String::new(),
            display_status: String::new(),
            last_save_time: 0,
            last_saved_by: String::new(),
            last_saved_host: String::new(),
            last_save_app: String::new(),
            name: String::new(),
            description: String::new(),
            filters: None,
            policies: None,
            empty_groups: Vec::new(),
            legacy_update: None,
            unknown: Vec::new(),
        }
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

/// The two historical meanings of the [`HDR_LASTUPDATEREF`] field: early
/// revisions stored a raw 32 byte key blob, later revisions a "user@host"
/// text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegacyUpdate {
    KeyBlob([u8; 32]),
    UserHost(String),
}

impl LegacyUpdate {
    /// The exact bytes this value is stored as.
    pub fn as_bytes(&self) -> Vec<u8> {
        match self {
            LegacyUpdate::KeyBlob(blob) => blob.to_vec(),
            LegacyUpdate::UserHost(text) => text.as_bytes().to_vec(),
        }
    }
}

/// Decide which historical meaning a [`HDR_LASTUPDATEREF`] value carries.
///
/// A 32 byte value whose leading 8 bytes are all ASCII hex digits is the
/// text revision; any other 32 byte value is the raw key blob; any other
/// length is text. This is a compatibility shim for files written by old
/// releases and must not be changed.
pub fn disambiguate_legacy_update(data: &[u8]) -> LegacyUpdate {
    if data.len() == 32 && !data[..8].iter().all(u8::is_ascii_hexdigit) {
        let mut blob = [0u8; 32];
        blob.copy_from_slice(data);
        return LegacyUpdate::KeyBlob(blob);
    }
    LegacyUpdate::UserHost(String::from_utf8_lossy(data).into_owned())
}

fn text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

/// Decode the header section: dispatch each record by type until the end
/// record.
pub(crate) fn read_header<R: Read>(codec: &mut BlockReader<R>) -> Result<Header, ReadError> {
    let mut header = Header {
        uuid: UniqueId::NIL,
        ..Header::new()
    };

    loop {
        let field = codec
            .read_field()?
            .ok_or_else(|| ReadError::CorruptField("header section is not terminated".into()))?;

        match field.typ {
            FIELD_END => break,
            HDR_VERSION => {
                if field.data.len() < 2 {
                    return Err(ReadError::CorruptField("version field too short".into()));
                }
                let version = u16::from_le_bytes([field.data[0], field.data[1]]);
                let major = (version >> 8) as u8;
                if major != VERSION_MAJOR {
                    return Err(ReadError::UnsupportedVersion { found: major });
                }
                header.version = version;
            }
            HDR_UUID => {
                header.uuid = UniqueId::from_slice(&field.data)
                    .ok_or_else(|| ReadError::CorruptField("malformed database uuid".into()))?;
            }
            HDR_PREFS => header.prefs = text(&field.data),
            HDR_DISPSTAT => header.display_status = text(&field.data),
            HDR_LASTUPDATETIME => {
                let bytes: [u8; 4] = field.data.as_slice().try_into().map_err(|_| {
                    ReadError::CorruptField("malformed last-save timestamp".into())
                })?;
                header.last_save_time = u32::from_le_bytes(bytes);
            }
            HDR_LASTUPDATEREF => {
                header.legacy_update = Some(disambiguate_legacy_update(&field.data));
            }
            HDR_APPLICATION => header.last_save_app = text(&field.data),
            HDR_LASTUPDATEUSER => header.last_saved_by = text(&field.data),
            HDR_LASTUPDATEHOST => header.last_saved_host = text(&field.data),
            HDR_DBNAME => header.name = text(&field.data),
            HDR_DBDESC => header.description = text(&field.data),
            HDR_FILTERS => header.filters = Some(field.data),
            HDR_POLICIES => header.policies = Some(field.data),
            HDR_EMPTYGROUP => header.empty_groups.push(text(&field.data)),
            _ => header.unknown.push(field),
        }
    }

    Ok(header)
}

/// Encode the header section in canonical order, closing with the end
/// record.
pub(crate) fn write_header<W: Write>(
    codec: &mut BlockWriter<W>,
    header: &Header,
) -> Result<(), WriteError> {
    codec.write_field(HDR_VERSION, &header.version.to_le_bytes())?;
    codec.write_field(HDR_UUID, header.uuid.as_bytes())?;

    if !header.prefs.is_empty() {
        codec.write_field(HDR_PREFS, header.prefs.as_bytes())?;
    }
    if !header.display_status.is_empty() {
        codec.write_field(HDR_DISPSTAT, header.display_status.as_bytes())?;
    }
    if header.last_save_time != 0 {
        codec.write_field(HDR_LASTUPDATETIME, &header.last_save_time.to_le_bytes())?;
    }
    if let Some(legacy) = &header.legacy_update {
        codec.write_field(HDR_LASTUPDATEREF, &legacy.as_bytes())?;
    }
    if !header.last_save_app.is_empty() {
        codec.write_field(HDR_APPLICATION, header.last_save_app.as_bytes())?;
    }
    if !header.last_saved_by.is_empty() {
        codec.write_field(HDR_LASTUPDATEUSER, header.last_saved_by.as_bytes())?;
    }
    if !header.last_saved_host.is_empty() {
        codec.write_field(HDR_LASTUPDATEHOST, header.last_saved_host.as_bytes())?;
    }
    if !header.name.is_empty() {
        codec.write_field(HDR_DBNAME, header.name.as_bytes())?;
    }
    if !header.description.is_empty() {
        codec.write_field(HDR_DBDESC, header.description.as_bytes())?;
    }
    if let Some(filters) = &header.filters {
        codec.write_field(HDR_FILTERS, filters)?;
    }
    if let Some(policies) = &header.policies {
        codec.write_field(HDR_POLICIES, policies)?;
    }
    for group in &header.empty_groups {
        codec.write_field(HDR_EMPTYGROUP, group.as_bytes())?;
    }
    for field in &header.unknown {
        codec.write_field(field.typ, &field.data)?;
    }

    codec.write_field(FIELD_END, &[])?;
    Ok(())
}
