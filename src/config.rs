// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded once from the environment at startup (a `.env`
//! file is read first when present). Every missing or invalid required
//! value is reported together and startup aborts.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATABASE_URL` | Postgres connection string | Required |
//! | `DB_MAX_CONNECTIONS` | Pool size | `10` |
//! | `DB_ACQUIRE_TIMEOUT_SECS` | Pool acquire timeout | `5` |
//! | `JWT_PRIVATE_KEY` | Base64 of the PEM (PKCS#8) P-256 signing key | Required |
//! | `JWT_PUBLIC_KEY` | Base64 of the PEM P-256 verification key | Required |
//! | `JWT_ACCESS_TTL_SECS` | Access token lifetime | `1800` |
//! | `CARD_AES_KEY` | Base64 of a 16, 24 or 32 byte AES key | Required |
//! | `POLICY_PATH` | Policy document overriding the embedded one | Embedded |
//! | `RATE_LIMIT_PER_SECOND` | Per-IP replenish rate | `10` |
//! | `RATE_LIMIT_BURST` | Per-IP burst size | `20` |
//! | `TRUSTED_PROXY_HOPS` | Reverse proxies in front of the service; `x-forwarded-for` is ignored at 0 | `0` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use base64ct::{Base64, Encoding};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const DB_MAX_CONNECTIONS_ENV: &str = "DB_MAX_CONNECTIONS";
pub const DB_ACQUIRE_TIMEOUT_ENV: &str = "DB_ACQUIRE_TIMEOUT_SECS";
pub const JWT_PRIVATE_KEY_ENV: &str = "JWT_PRIVATE_KEY";
pub const JWT_PUBLIC_KEY_ENV: &str = "JWT_PUBLIC_KEY";
pub const JWT_ACCESS_TTL_ENV: &str = "JWT_ACCESS_TTL_SECS";
pub const CARD_AES_KEY_ENV: &str = "CARD_AES_KEY";
pub const POLICY_PATH_ENV: &str = "POLICY_PATH";
pub const RATE_LIMIT_PER_SECOND_ENV: &str = "RATE_LIMIT_PER_SECOND";
pub const RATE_LIMIT_BURST_ENV: &str = "RATE_LIMIT_BURST";
pub const TRUSTED_PROXY_HOPS_ENV: &str = "TRUSTED_PROXY_HOPS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Per-operation deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub read: Duration,
    pub write: Duration,
    /// One Argon2 hash or verification
    pub password: Duration,
    /// Pool connect and migrations
    pub startup: Duration,
    /// Drain window after a shutdown signal
    pub shutdown: Duration,
}

pub const TIMEOUTS: Timeouts = Timeouts {
    read: Duration::from_millis(300),
    write: Duration::from_millis(500),
    password: Duration::from_secs(2),
    startup: Duration::from_secs(30),
    shutdown: Duration::from_secs(10),
};

impl Default for Timeouts {
    fn default() -> Self {
        TIMEOUTS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("invalid configuration: {}", join_errors(.0))]
    Multiple(Vec<ConfigError>),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validated startup configuration.
///
/// Key material is held decoded; [`std::fmt::Debug`] redacts it.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub jwt_private_pem: Vec<u8>,
    pub jwt_public_pem: Vec<u8>,
    pub jwt_ttl_secs: i64,
    pub card_key: Vec<u8>,
    pub policy_path: Option<PathBuf>,
    pub rate_limit_per_second: u32,
    pub rate_limit_burst: u32,
    pub trusted_proxy_hops: usize,
}

impl AppConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "failed to read .env file");
            }
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut errors = Vec::new();
        let errs = &mut errors;

        let host = lookup(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string());
        let port = collect(errs, parse_or(&lookup, PORT_ENV, 8080u16));
        let database_url = collect(errs, required(&lookup, DATABASE_URL_ENV));
        let db_max_connections = collect(errs, parse_or(&lookup, DB_MAX_CONNECTIONS_ENV, 10u32));
        let db_acquire_timeout = collect(errs, parse_or(&lookup, DB_ACQUIRE_TIMEOUT_ENV, 5u64));
        let jwt_private_pem = collect(errs, required_base64(&lookup, JWT_PRIVATE_KEY_ENV));
        let jwt_public_pem = collect(errs, required_base64(&lookup, JWT_PUBLIC_KEY_ENV));
        let jwt_ttl_secs = collect(errs, parse_or(&lookup, JWT_ACCESS_TTL_ENV, 1800i64).and_then(
            |ttl| {
                if ttl > 0 {
                    Ok(ttl)
                } else {
                    Err(ConfigError::Invalid {
                        name: JWT_ACCESS_TTL_ENV,
                        reason: "must be positive".to_string(),
                    })
                }
            },
        ));
        let card_key = collect(errs, required_base64(&lookup, CARD_AES_KEY_ENV).and_then(|key| {
            if matches!(key.len(), 16 | 24 | 32) {
                Ok(key)
            } else {
                Err(ConfigError::Invalid {
                    name: CARD_AES_KEY_ENV,
                    reason: format!("decoded key is {} bytes, expected 16, 24 or 32", key.len()),
                })
            }
        }));
        let rate_limit_per_second = collect(errs, parse_or(&lookup, RATE_LIMIT_PER_SECOND_ENV, 10u32));
        let rate_limit_burst = collect(errs, parse_or(&lookup, RATE_LIMIT_BURST_ENV, 20u32));
        let trusted_proxy_hops = collect(errs, parse_or(&lookup, TRUSTED_PROXY_HOPS_ENV, 0usize));
        let policy_path = lookup(POLICY_PATH_ENV)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        match (
            port,
            database_url,
            db_max_connections,
            db_acquire_timeout,
            jwt_private_pem,
            jwt_public_pem,
            jwt_ttl_secs,
            card_key,
            rate_limit_per_second,
            rate_limit_burst,
            trusted_proxy_hops,
        ) {
            (
                Some(port),
                Some(database_url),
                Some(db_max_connections),
                Some(db_acquire_timeout),
                Some(jwt_private_pem),
                Some(jwt_public_pem),
                Some(jwt_ttl_secs),
                Some(card_key),
                Some(rate_limit_per_second),
                Some(rate_limit_burst),
                Some(trusted_proxy_hops),
            ) => Ok(Self {
                host,
                port,
                database_url,
                db_max_connections,
                db_acquire_timeout: Duration::from_secs(db_acquire_timeout),
                jwt_private_pem,
                jwt_public_pem,
                jwt_ttl_secs,
                card_key,
                policy_path,
                rate_limit_per_second: rate_limit_per_second.max(1),
                rate_limit_burst: rate_limit_burst.max(1),
                trusted_proxy_hops,
            }),
            _ => Err(match errors.len() {
                1 => errors.remove(0),
                _ => ConfigError::Multiple(errors),
            }),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_acquire_timeout", &self.db_acquire_timeout)
            .field("jwt_ttl_secs", &self.jwt_ttl_secs)
            .field("policy_path", &self.policy_path)
            .field("rate_limit_per_second", &self.rate_limit_per_second)
            .field("rate_limit_burst", &self.rate_limit_burst)
            .field("trusted_proxy_hops", &self.trusted_proxy_hops)
            .finish_non_exhaustive()
    }
}

fn collect<T>(errors: &mut Vec<ConfigError>, result: Result<T, ConfigError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn required_base64<F>(lookup: &F, name: &'static str) -> Result<Vec<u8>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = required(lookup, name)?;
    Base64::decode_vec(raw.trim()).map_err(|_| ConfigError::Invalid {
        name,
        reason: "not valid base64".to_string(),
    })
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}
