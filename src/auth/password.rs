// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Argon2id password hashing.

use std::sync::LazyLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Stand-in hash verified when no account matched, so an unknown email
/// costs as much as a wrong password.
static DUMMY_HASH: LazyLock<Result<String, PasswordError>> =
    LazyLock::new(|| hash_password("paycore-unknown-account"));

/// Accepted password length, in characters.
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasswordError {
    #[error("password must be between 8 and 64 characters")]
    InvalidLength,
    #[error("failed to hash password: {0}")]
    Hashing(String),
    #[error("stored password hash is malformed")]
    MalformedHash,
    #[error("password does not match")]
    Mismatch,
}

/// Reject passwords outside the accepted length range.
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    let len = password.chars().count();
    if (PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        Ok(())
    } else {
        Err(PasswordError::InvalidLength)
    }
}

/// Hash a password with a random salt. The PHC string embeds salt and parameters.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    validate_password(password)?;
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}

/// Constant-time verification against a stored PHC string.
pub fn verify_password(password: &str, stored: &str) -> Result<(), PasswordError> {
    let parsed = PasswordHash::new(stored).map_err(|_| PasswordError::MalformedHash)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| PasswordError::Mismatch)
}

/// Verify against `stored`, or burn one verification against the
/// stand-in hash when there is no account. The latter always fails.
pub fn verify_or_dummy(password: &str, stored: Option<&str>) -> Result<(), PasswordError> {
    match stored {
        Some(stored) => verify_password(password, stored),
        None => {
            let dummy = DUMMY_HASH.as_deref().map_err(|e| e.clone())?;
            let _ = verify_password(password, dummy);
            Err(PasswordError::Mismatch)
        }
    }
}
