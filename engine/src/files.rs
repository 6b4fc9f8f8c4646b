// Copyright 2020-2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Default on-disk locations for database files.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Get the engine's base directory on this device.
///
/// The `PASSVAULT` environment variable overrides the default location under
/// the user's home directory.
pub fn home_dir() -> io::Result<PathBuf> {
    let home: PathBuf = match std::env::var("PASSVAULT") {
        Ok(h) => h.into(),
        Err(_) => dirs_next::home_dir()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no home directory"))?,
    };
    let home_dir = home.join(".passvault");

    verify_or_create(&home_dir)?;

    Ok(home_dir)
}

/// Get the default directory for database files.
pub fn safe_dir() -> io::Result<PathBuf> {
    let home_dir = home_dir()?;
    let safe_dir = home_dir.join("safes");

    verify_or_create(&safe_dir)?;

    Ok(safe_dir)
}

/// Verify that the folder exists or create it.
fn verify_or_create(dir: &Path) -> io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir)
}
