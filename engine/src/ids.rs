// Copyright 2020-2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! 128-bit identifiers for entries and for the database itself.

use std::fmt::{self, Debug, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::cipher::random_buf;

/// A 128-bit identifier. Equality and ordering are byte-wise.
#[repr(transparent)]
#[derive(Copy, Clone, Hash, Ord, PartialOrd, Eq, PartialEq, Serialize, Deserialize)]
pub struct UniqueId([u8; 16]);

impl UniqueId {
    /// The distinguished "unset" identifier.
    pub const NIL: UniqueId = UniqueId([0; 16]);

    /// Create a random identifier from the platform's secure source.
    pub fn random() -> Self {
        let mut buf = [0; 16];
        random_buf(&mut buf).expect("platform random source failed");
        Self(buf)
    }

    /// Load an identifier from raw bytes; `None` unless exactly 16 bytes.
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        let mut id = [0; 16];
        if data.len() != id.len() {
            return None;
        }
        id.copy_from_slice(data);
        Some(Self(id))
    }

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Parse from 32 hex digits; hyphens between groups are accepted.
    pub fn from_hex(s: &str) -> Option<Self> {
        let compact: String = s.chars().filter(|c| *c != '-').collect();
        if compact.len() != 32 {
            return None;
        }
        let mut id = [0u8; 16];
        hex::decode_to_slice(compact.as_bytes(), &mut id).ok()?;
        Some(Self(id))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }
}

impl AsRef<[u8]> for UniqueId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for UniqueId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let h = hex::encode(self.0);
        write!(
            f,
            "{}-{}-{}-{}-{}",
            &h[..8],
            &h[8..12],
            &h[12..16],
            &h[16..20],
            &h[20..]
        )
    }
}

impl Debug for UniqueId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}
