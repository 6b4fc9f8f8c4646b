// Copyright 2020-2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Database records.
//!
//! An entry is a set of attributes keyed by record type, each sealed on its
//! own under the caller's [`FieldCipher`] the moment it enters the entry and
//! opened only transiently by the typed accessors. Attribute types this
//! engine does not recognize are kept sealed and round-trip verbatim.

use std::collections::BTreeMap;

use zeroize::Zeroizing;

use crate::{
    field::{FieldCipher, SealedField},
    ids::UniqueId,
};

/// Entry field types.
pub const ITEM_UUID: u8 = 0x01;
pub const ITEM_GROUP: u8 = 0x02;
pub const ITEM_TITLE: u8 = 0x03;
pub const ITEM_USER: u8 = 0x04;
pub const ITEM_NOTES: u8 = 0x05;
pub const ITEM_PASSWORD: u8 = 0x06;
pub const ITEM_CTIME: u8 = 0x07;
pub const ITEM_PMTIME: u8 = 0x08;
pub const ITEM_ATIME: u8 = 0x09;
pub const ITEM_XTIME: u8 = 0x0a;
pub const ITEM_RMTIME: u8 = 0x0c;
pub const ITEM_URL: u8 = 0x0d;
pub const ITEM_AUTOTYPE: u8 = 0x0e;
pub const ITEM_PWHIST: u8 = 0x0f;
pub const ITEM_POLICY: u8 = 0x10;

/// One database record: a set of sealed attributes.
#[derive(Debug, Clone, Default)]
pub struct Entry {
    fields: BTreeMap<u8, SealedField>,
}

impl Entry {
    /// Fresh entry carrying a new random identifier.
    pub fn new(cipher: &FieldCipher) -> Self {
        let mut entry = Self::default();
        entry.set_raw(ITEM_UUID, UniqueId::random().as_bytes(), cipher);
        entry
    }

    /// The entry's identifier, if one is present.
    pub fn uuid(&self, cipher: &FieldCipher) -> Option<UniqueId> {
        self.raw(ITEM_UUID, cipher)
            .and_then(|pt| UniqueId::from_slice(&pt))
    }

    /// Raw bytes of one attribute, opened transiently.
    pub fn raw(&self, typ: u8, cipher: &FieldCipher) -> Option<Zeroizing<Vec<u8>>> {
        self.fields.get(&typ).map(|field| field.open(cipher))
    }

    /// Seal `data` as attribute `typ`. Empty data removes the attribute.
    pub fn set_raw(&mut self, typ: u8, data: &[u8], cipher: &FieldCipher) {
        if data.is_empty() {
            self.fields.remove(&typ);
        } else {
            self.fields.insert(typ, SealedField::seal(data, cipher));
        }
    }

    /// Store an attribute exactly as it arrived from a file, zero length
    /// included.
    pub(crate) fn insert_sealed(&mut self, typ: u8, data: &[u8], cipher: &FieldCipher) {
        self.fields.insert(typ, SealedField::seal(data, cipher));
    }

    /// Sealed attributes in ascending type order.
    pub(crate) fn fields(&self) -> impl Iterator<Item = (u8, &SealedField)> {
        self.fields.iter().map(|(typ, field)| (*typ, field))
    }

    /// Number of attributes present.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    fn text(&self, typ: u8, cipher: &FieldCipher) -> Option<Zeroizing<String>> {
        self.raw(typ, cipher)
            .map(|pt| Zeroizing::new(String::from_utf8_lossy(&pt).into_owned()))
    }

    fn time(&self, typ: u8, cipher: &FieldCipher) -> Option<u32> {
        self.raw(typ, cipher)
            .and_then(|pt| pt.as_slice().try_into().ok())
            .map(u32::from_le_bytes)
    }

    fn set_time(&mut self, typ: u8, time: u32, cipher: &FieldCipher) {
        self.set_raw(typ, &time.to_le_bytes(), cipher);
    }

    pub fn group(&self, cipher: &FieldCipher) -> Option<Zeroizing<String>> {
        self.text(ITEM_GROUP, cipher)
    }

    pub fn set_group(&mut self, group: &str, cipher: &FieldCipher) {
        self.set_raw(ITEM_GROUP, group.as_bytes(), cipher);
    }

    pub fn title(&self, cipher: &FieldCipher) -> Option<Zeroizing<String>> {
        self.text(ITEM_TITLE, cipher)
    }

    pub fn set_title(&mut self, title: &str, cipher: &FieldCipher) {
        self.set_raw(ITEM_TITLE, title.as_bytes(), cipher);
    }

    pub fn username(&self, cipher: &FieldCipher) -> Option<Zeroizing<String>> {
        self.text(ITEM_USER, cipher)
    }

    pub fn set_username(&mut self, username: &str, cipher: &FieldCipher) {
        self.set_raw(ITEM_USER, username.as_bytes(), cipher);
    }

    pub fn notes(&self, cipher: &FieldCipher) -> Option<Zeroizing<String>> {
        self.text(ITEM_NOTES, cipher)
    }

    pub fn set_notes(&mut self, notes: &str, cipher: &FieldCipher) {
        self.set_raw(ITEM_NOTES, notes.as_bytes(), cipher);
    }

    pub fn password(&self, cipher: &FieldCipher) -> Option<Zeroizing<String>> {
        self.text(ITEM_PASSWORD, cipher)
    }

    pub fn set_password(&mut self, password: &str, cipher: &FieldCipher) {
        self.set_raw(ITEM_PASSWORD, password.as_bytes(), cipher);
    }

    pub fn url(&self, cipher: &FieldCipher) -> Option<Zeroizing<String>> {
        self.text(ITEM_URL, cipher)
    }

    pub fn set_url(&mut self, url: &str, cipher: &FieldCipher) {
        self.set_raw(ITEM_URL, url.as_bytes(), cipher);
    }

    pub fn autotype(&self, cipher: &FieldCipher) -> Option<Zeroizing<String>> {
        self.text(ITEM_AUTOTYPE, cipher)
    }

    pub fn set_autotype(&mut self, autotype: &str, cipher: &FieldCipher) {
        self.set_raw(ITEM_AUTOTYPE, autotype.as_bytes(), cipher);
    }

    /// Serialized history of previous passwords, kept opaque.
    pub fn password_history(&self, cipher: &FieldCipher) -> Option<Zeroizing<String>> {
        self.text(ITEM_PWHIST, cipher)
    }

    pub fn set_password_history(&mut self, history: &str, cipher: &FieldCipher) {
        self.set_raw(ITEM_PWHIST, history.as_bytes(), cipher);
    }

    /// Serialized password policy, kept opaque.
    pub fn policy(&self, cipher: &FieldCipher) -> Option<Zeroizing<String>> {
        self.text(ITEM_POLICY, cipher)
    }

    pub fn set_policy(&mut self, policy: &str, cipher: &FieldCipher) {
        self.set_raw(ITEM_POLICY, policy.as_bytes(), cipher);
    }

    pub fn creation_time(&self, cipher: &FieldCipher) -> Option<u32> {
        self.time(ITEM_CTIME, cipher)
    }

    pub fn set_creation_time(&mut self, time: u32, cipher: &FieldCipher) {
        self.set_time(ITEM_CTIME, time, cipher);
    }

    pub fn password_modified_time(&self, cipher: &FieldCipher) -> Option<u32> {
        self.time(ITEM_PMTIME, cipher)
    }

    pub fn set_password_modified_time(&mut self, time: u32, cipher: &FieldCipher) {
        self.set_time(ITEM_PMTIME, time, cipher);
    }

    pub fn last_access_time(&self, cipher: &FieldCipher) -> Option<u32> {
        self.time(ITEM_ATIME, cipher)
    }

    pub fn set_last_access_time(&mut self, time: u32, cipher: &FieldCipher) {
        self.set_time(ITEM_ATIME, time, cipher);
    }

    pub fn expiry_time(&self, cipher: &FieldCipher) -> Option<u32> {
        self.time(ITEM_XTIME, cipher)
    }

    pub fn set_expiry_time(&mut self, time: u32, cipher: &FieldCipher) {
        self.set_time(ITEM_XTIME, time, cipher);
    }

    pub fn modified_time(&self, cipher: &FieldCipher) -> Option<u32> {
        self.time(ITEM_RMTIME, cipher)
    }

    pub fn set_modified_time(&mut self, time: u32, cipher: &FieldCipher) {
        self.set_time(ITEM_RMTIME, time, cipher);
    }
}
