// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Paycore - account backend for users, wallets and payment cards
//!
//! Every protected request passes one authorization gate: an ES256 access
//! token, an identity lookup and a role check against a declarative route
//! policy. Card numbers are stored AES-GCM encrypted. Writes that guard a
//! uniqueness rule run in serializable transactions.
//!
//! ## Modules
//!
//! - `api` - HTTP handlers, router and OpenAPI document (Axum)
//! - `auth` - Tokens, policy, authorization gate, password hashing
//! - `crypto` - Card number cipher and provider detection
//! - `storage` - Repositories (Postgres and in-memory), transactions
//! - `rate_limit` - Per-IP request limiting

pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod rate_limit;
pub mod state;
pub mod storage;
pub mod telemetry;
