// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Card Cipher
//!
//! AES-GCM encryption of card numbers with a fresh random nonce per call.
//!
//! ## Wire Layout
//!
//! ```text
//! [ nonce (12 bytes) | ciphertext | tag (16 bytes) ]
//! ```
//!
//! The nonce travels with the ciphertext so a stored blob decrypts on its
//! own. The plaintext is checked against the provider patterns both before
//! encryption and after decryption.

use std::sync::LazyLock;

use aes_gcm::{
    aead::{consts::U12, Aead, AeadCore, KeyInit, OsRng},
    aes::Aes192,
    Aes128Gcm, Aes256Gcm, AesGcm, Nonce,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

type Aes192Gcm = AesGcm<Aes192, U12>;

static VISA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^4[0-9]{12}(?:[0-9]{3})?$").expect("static regex"));
static MASTERCARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^5[1-5][0-9]{14}$").expect("static regex"));
static AMEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^3[47][0-9]{13}$").expect("static regex"));

/// Card cipher errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    #[error("invalid AES key size {0}: must be 16, 24, or 32 bytes")]
    InvalidKeyLength(usize),
    #[error("invalid card number format")]
    InvalidCardNumber,
    #[error("ciphertext too short")]
    CiphertextTooShort,
    #[error("ciphertext authentication failed")]
    AuthenticationFailed,
    #[error("decrypted data is not a valid card number")]
    InvalidPlaintext,
    #[error("encryption failed")]
    Encryption,
}

/// Supported card networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CardProvider {
    Visa,
    Mastercard,
    Amex,
}

impl CardProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardProvider::Visa => "visa",
            CardProvider::Mastercard => "mastercard",
            CardProvider::Amex => "amex",
        }
    }

    /// Detect the network from the structural pattern of a card number.
    pub fn detect(number: &str) -> Option<CardProvider> {
        if VISA.is_match(number) {
            Some(CardProvider::Visa)
        } else if MASTERCARD.is_match(number) {
            Some(CardProvider::Mastercard)
        } else if AMEX.is_match(number) {
            Some(CardProvider::Amex)
        } else {
            None
        }
    }
}

impl std::str::FromStr for CardProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visa" => Ok(CardProvider::Visa),
            "mastercard" => Ok(CardProvider::Mastercard),
            "amex" => Ok(CardProvider::Amex),
            other => Err(format!("unknown card provider: {other}")),
        }
    }
}

impl TryFrom<String> for CardProvider {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::fmt::Display for CardProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Luhn checksum over an all-digit string.
pub fn luhn_valid(number: &str) -> bool {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let sum: u32 = number
        .bytes()
        .rev()
        .map(|b| u32::from(b - b'0'))
        .enumerate()
        .map(|(i, d)| match (i % 2 == 1, d * 2) {
            (true, doubled) if doubled > 9 => doubled - 9,
            (true, doubled) => doubled,
            (false, _) => d,
        })
        .sum();
    sum % 10 == 0
}

enum Engine {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

/// Encrypts and decrypts card numbers.
///
/// Holds only the key schedule; safe to share across requests.
pub struct CardCipher {
    engine: Engine,
}

impl CardCipher {
    /// Build a cipher from raw key bytes (16, 24 or 32 bytes).
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        let invalid = || CipherError::InvalidKeyLength(key.len());
        let engine = match key.len() {
            16 => Engine::Aes128(Aes128Gcm::new_from_slice(key).map_err(|_| invalid())?),
            24 => Engine::Aes192(Aes192Gcm::new_from_slice(key).map_err(|_| invalid())?),
            32 => Engine::Aes256(Aes256Gcm::new_from_slice(key).map_err(|_| invalid())?),
            _ => return Err(invalid()),
        };
        Ok(Self { engine })
    }

    /// Key size in bits.
    pub fn key_bits(&self) -> usize {
        match self.engine {
            Engine::Aes128(_) => 128,
            Engine::Aes192(_) => 192,
            Engine::Aes256(_) => 256,
        }
    }

    /// Encrypt a card number, returning `nonce || ciphertext`.
    pub fn encrypt(&self, number: &str) -> Result<Vec<u8>, CipherError> {
        if CardProvider::detect(number).is_none() {
            return Err(CipherError::InvalidCardNumber);
        }

        let nonce = Aes128Gcm::generate_nonce(&mut OsRng);
        let sealed = match &self.engine {
            Engine::Aes128(c) => c.encrypt(&nonce, number.as_bytes()),
            Engine::Aes192(c) => c.encrypt(&nonce, number.as_bytes()),
            Engine::Aes256(c) => c.encrypt(&nonce, number.as_bytes()),
        }
        .map_err(|_| CipherError::Encryption)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Decrypt a blob produced by [`CardCipher::encrypt`].
    pub fn decrypt(&self, blob: &[u8]) -> Result<String, CipherError> {
        if blob.len() < NONCE_LEN {
            return Err(CipherError::CiphertextTooShort);
        }

        let (nonce, sealed) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::<U12>::from_slice(nonce);
        let plaintext = match &self.engine {
            Engine::Aes128(c) => c.decrypt(nonce, sealed),
            Engine::Aes192(c) => c.decrypt(nonce, sealed),
            Engine::Aes256(c) => c.decrypt(nonce, sealed),
        }
        .map_err(|_| CipherError::AuthenticationFailed)?;

        let number = String::from_utf8(plaintext).map_err(|_| CipherError::InvalidPlaintext)?;
        if CardProvider::detect(&number).is_none() {
            return Err(CipherError::InvalidPlaintext);
        }
        Ok(number)
    }
}

impl std::fmt::Debug for CardCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardCipher")
            .field("key_bits", &self.key_bits())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VISA_16: &str = "4111111111111111";
    const VISA_13: &str = "4222222222222";
    const MASTERCARD_16: &str = "5555555555554444";
    const AMEX_15: &str = "378282246310005";

    #[test]
    fn luhn_checksum() {
        for number in [VISA_16, VISA_13, MASTERCARD_16, AMEX_15] {
            assert!(luhn_valid(number), "{number}");
        }
        assert!(!luhn_valid("4111111111111112"));
        assert!(!luhn_valid("41111111a1111111"));
        assert!(!luhn_valid(""));
    }

    fn cipher(len: usize) -> CardCipher {
        CardCipher::new(&vec![0x42; len]).unwrap()
    }

    #[test]
    fn accepts_only_aes_key_sizes() {
        for len in [16, 24, 32] {
            assert_eq!(cipher(len).key_bits(), len * 8);
        }
        for len in [0, 15, 17, 31, 33, 64] {
            assert_eq!(
                CardCipher::new(&vec![1; len]).unwrap_err(),
                CipherError::InvalidKeyLength(len)
            );
        }
    }

    #[test]
    fn round_trip_for_every_key_size_and_provider() {
        for len in [16, 24, 32] {
            let c = cipher(len);
            for number in [VISA_16, VISA_13, MASTERCARD_16, AMEX_15] {
                let blob = c.encrypt(number).unwrap();
                assert_eq!(c.decrypt(&blob).unwrap(), number);
            }
        }
    }

    #[test]
    fn nonce_is_fresh_per_call() {
        let c = cipher(32);
        let a = c.encrypt(VISA_16).unwrap();
        let b = c.encrypt(VISA_16).unwrap();
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn flipping_any_byte_fails_authentication() {
        let c = cipher(16);
        let blob = c.encrypt(MASTERCARD_16).unwrap();
        for i in 0..blob.len() {
            let mut tampered = blob.clone();
            tampered[i] ^= 0x01;
            assert_eq!(
                c.decrypt(&tampered),
                Err(CipherError::AuthenticationFailed),
                "byte {i}"
            );
        }
    }

    #[test]
    fn short_ciphertext_is_rejected() {
        let c = cipher(24);
        assert_eq!(c.decrypt(&[]), Err(CipherError::CiphertextTooShort));
        assert_eq!(c.decrypt(&[0; NONCE_LEN - 1]), Err(CipherError::CiphertextTooShort));
        // A bare nonce has no tag to authenticate.
        assert_eq!(c.decrypt(&[0; NONCE_LEN]), Err(CipherError::AuthenticationFailed));
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let blob = cipher(32).encrypt(AMEX_15).unwrap();
        let other = CardCipher::new(&[0x24; 32]).unwrap();
        assert_eq!(other.decrypt(&blob), Err(CipherError::AuthenticationFailed));
    }

    #[test]
    fn invalid_numbers_are_not_encrypted() {
        let c = cipher(16);
        for number in ["", "1234567890123456", "411111111111111", "5655555555554444", "4111-1111-1111-1111"] {
            assert_eq!(c.encrypt(number), Err(CipherError::InvalidCardNumber), "{number:?}");
        }
    }

    #[test]
    fn authenticated_garbage_fails_format_check() {
        // Seal a non-card plaintext directly with the same key to simulate
        // stored data that authenticates but is not a card number.
        let key = [0x42; 16];
        let raw = Aes128Gcm::new_from_slice(&key).unwrap();
        let nonce = Aes128Gcm::generate_nonce(&mut OsRng);
        let sealed = raw.encrypt(&nonce, b"not-a-card".as_ref()).unwrap();
        let mut blob = nonce.to_vec();
        blob.extend_from_slice(&sealed);

        let c = CardCipher::new(&key).unwrap();
        assert_eq!(c.decrypt(&blob), Err(CipherError::InvalidPlaintext));
    }

    #[test]
    fn detects_provider_from_number() {
        assert_eq!(CardProvider::detect(VISA_16), Some(CardProvider::Visa));
        assert_eq!(CardProvider::detect(VISA_13), Some(CardProvider::Visa));
        assert_eq!(CardProvider::detect(MASTERCARD_16), Some(CardProvider::Mastercard));
        assert_eq!(CardProvider::detect(AMEX_15), Some(CardProvider::Amex));
        assert_eq!(CardProvider::detect("6011111111111117"), None);
    }

    #[test]
    fn provider_names_parse() {
        assert_eq!("amex".parse::<CardProvider>(), Ok(CardProvider::Amex));
        assert!("discover".parse::<CardProvider>().is_err());
    }
}
