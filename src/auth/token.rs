// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Token Service
//!
//! Issues and verifies ES256-signed access tokens.
//!
//! ## Verification
//!
//! - Only `ES256` is accepted; a token whose header names any other
//!   algorithm (including `none` or an HMAC downgrade) is rejected
//! - `exp`, `nbf` and `sub` are required
//! - The time window is checked against an explicit clock value with no
//!   leeway: a token is expired at `now >= exp` and immature at `nbf > now`
//! - Every failure surfaces as [`TokenError::Invalid`] so callers cannot
//!   tell which check failed

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use super::claims::TokenClaims;

/// Token service errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Principal identifier is not a UUID
    #[error("invalid principal identifier")]
    InvalidSubject,
    /// Key material could not be parsed
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    /// Signing failed
    #[error("failed to sign token: {0}")]
    Signing(String),
    /// Any verification failure
    #[error("invalid token")]
    Invalid,
}

/// Signs and verifies access tokens.
///
/// Read-only after construction; share it behind an `Arc`.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl TokenService {
    /// Build from PEM-encoded P-256 keys (PKCS#8 private, SPKI public).
    pub fn from_pem(private_pem: &[u8], public_pem: &[u8], ttl_secs: i64) -> Result<Self, TokenError> {
        let encoding = EncodingKey::from_ec_pem(private_pem)
            .map_err(|e| TokenError::InvalidKey(format!("private key: {e}")))?;
        let decoding = DecodingKey::from_ec_pem(public_pem)
            .map_err(|e| TokenError::InvalidKey(format!("public key: {e}")))?;

        let mut validation = Validation::new(Algorithm::ES256);
        // Time checks run in verify_at against an explicit clock.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "nbf", "sub"]);

        Ok(Self {
            encoding,
            decoding,
            validation,
            ttl_secs,
        })
    }

    /// Token lifetime in seconds.
    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Issue a token for `principal_id`, valid from now for the configured TTL.
    pub fn issue(&self, principal_id: &str) -> Result<String, TokenError> {
        self.issue_at(principal_id, Utc::now().timestamp())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(&self, principal_id: &str, now: i64) -> Result<String, TokenError> {
        let sub = Uuid::parse_str(principal_id).map_err(|_| TokenError::InvalidSubject)?;
        let claims = TokenClaims {
            sub,
            iat: now,
            nbf: now,
            exp: now + self.ttl_secs,
        };

        encode(&Header::new(Algorithm::ES256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify a token as if the current time were `now`.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<TokenClaims, TokenError> {
        let data = decode::<TokenClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            TokenError::Invalid
        })?;
        let claims = data.claims;

        if now >= claims.exp {
            tracing::debug!(exp = claims.exp, now, "token expired");
            return Err(TokenError::Invalid);
        }
        if claims.nbf > now {
            tracing::debug!(nbf = claims.nbf, now, "token not yet valid");
            return Err(TokenError::Invalid);
        }

        Ok(claims)
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

/// Throwaway P-256 key pair for tests, derived from a fixed scalar.
#[cfg(test)]
pub(crate) fn test_key_pair(seed: u8) -> (String, String) {
    use p256::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

    let secret = p256::SecretKey::from_slice(&[seed; 32]).expect("valid scalar");
    let private_pem = secret
        .to_pkcs8_pem(LineEnding::LF)
        .expect("encode private key")
        .as_str()
        .to_owned();
    let public_pem = secret
        .public_key()
        .to_public_key_pem(LineEnding::LF)
        .expect("encode public key");
    (private_pem, public_pem)
}

#[cfg(test)]
pub(crate) fn test_token_service() -> TokenService {
    let (private_pem, public_pem) = test_key_pair(7);
    TokenService::from_pem(private_pem.as_bytes(), public_pem.as_bytes(), 1800)
        .expect("test token service")
}
