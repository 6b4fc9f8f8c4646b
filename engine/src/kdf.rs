// Copyright 2020-2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Passphrase stretching.
//!
//! A user passphrase is turned into a 256-bit key by hashing it together with
//! the file's salt and then re-hashing the digest alone for the stored number
//! of rounds. The stretched key is never written to disk; the file carries
//! only its hash as a verification tag, which lets a passphrase be checked
//! without decrypting any content.

use sha2::{Digest, Sha256};
use thiserror::Error as DeriveError;
use zeroize::{Zeroize, Zeroizing};

/// Salt length in bytes.
pub const SALT_LEN: usize = 32;

/// Stretched key length in bytes.
pub const KEY_LEN: usize = 32;

/// Lowest stretch count a database may carry. A stored count below this
/// floor is rejected outright; clamping it would make the file unverifiable.
pub const MIN_ITERATIONS: u32 = 2048;

#[derive(Debug, Clone, PartialEq, Eq, DeriveError)]
pub enum KdfError {
    #[error("passphrase must not be empty")]
    EmptyPassphrase,

    #[error("iteration count `{found}` is below the minimum of `{min}`")]
    IterationsTooLow { found: u32, min: u32 },
}

/// Stretch `passphrase` with `salt` through `iterations` extra hash rounds.
///
/// The salt and passphrase enter the first round only; every later round
/// hashes the previous digest. The result is cleared on drop.
pub fn stretch(
    passphrase: &[u8],
    salt: &[u8; SALT_LEN],
    iterations: u32,
) -> Result<Zeroizing<[u8; KEY_LEN]>, KdfError> {
    if passphrase.is_empty() {
        return Err(KdfError::EmptyPassphrase);
    }
    if iterations < MIN_ITERATIONS {
        return Err(KdfError::IterationsTooLow {
            found: iterations,
            min: MIN_ITERATIONS,
        });
    }

    let mut hasher = Sha256::new();
    hasher.update(passphrase);
    hasher.update(salt);
    let mut digest = hasher.finalize();

    for _ in 0..iterations {
        digest = Sha256::digest(digest);
    }

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(digest.as_slice());
    digest.as_mut_slice().zeroize();

    Ok(key)
}

/// Tag stored in the file preamble to verify a passphrase before anything
/// is decrypted.
pub fn verification_tag(stretched: &[u8; KEY_LEN]) -> [u8; 32] {
    Sha256::digest(stretched).into()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_stretch_is_deterministic() {
        let salt = [9u8; SALT_LEN];
        let a = stretch(b"correct horse", &salt, MIN_ITERATIONS).unwrap();
        let b = stretch(b"correct horse", &salt, MIN_ITERATIONS).unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn test_stretch_depends_on_all_inputs() {
        let salt = [9u8; SALT_LEN];
        let base = stretch(b"correct horse", &salt, MIN_ITERATIONS).unwrap();

        let other_pass = stretch(b"wrong horse", &salt, MIN_ITERATIONS).unwrap();
        assert_ne!(*base, *other_pass);

        let other_salt = stretch(b"correct horse", &[10u8; SALT_LEN], MIN_ITERATIONS).unwrap();
        assert_ne!(*base, *other_salt);

        let other_rounds = stretch(b"correct horse", &salt, MIN_ITERATIONS + 1).unwrap();
        assert_ne!(*base, *other_rounds);
    }

    #[test]
    fn test_empty_passphrase_is_rejected() {
        let salt = [0u8; SALT_LEN];
        assert!(matches!(
            stretch(b"", &salt, MIN_ITERATIONS),
            Err(KdfError::EmptyPassphrase)
        ));
    }

    #[test]
    fn test_iteration_floor_is_enforced() {
        let salt = [0u8; SALT_LEN];
        assert!(matches!(
            stretch(b"pw", &salt, MIN_ITERATIONS - 1),
            Err(KdfError::IterationsTooLow {
                found,
                min: MIN_ITERATIONS,
            }) if found == MIN_ITERATIONS - 1
        ));
    }

    #[test]
    fn test_verification_tag_differs_from_key() {
        let salt = [1u8; SALT_LEN];
        let key = stretch(b"pw", &salt, MIN_ITERATIONS).unwrap();
        assert_ne!(verification_tag(&key), *key);
    }
}
