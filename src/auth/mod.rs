// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication and Authorization
//!
//! ## Request Flow
//!
//! 1. Client logs in and receives an ES256 access token
//! 2. Client sends `Authorization: Bearer <token>`
//! 3. The gate ([`middleware::authorize`]):
//!    - verifies the token signature and validity window
//!    - loads the principal by the `sub` claim
//!    - checks the principal's role against the policy for the
//!      request path and method
//! 4. Handlers take the principal through [`Auth`] or [`Owner`]
//!
//! ## Security
//!
//! - Only ES256 is accepted; `none` and HMAC tokens are rejected
//! - Every token failure maps to the same `401 invalid token`
//! - No clock skew leeway
//! - Ownership of path and row is checked for every role

pub mod claims;
pub mod error;
pub mod extractor;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod roles;
pub mod token;

pub use claims::{Principal, TokenClaims};
pub use error::AuthError;
pub use extractor::{ensure_owner, Auth, Owner};
pub use middleware::authorize;
pub use policy::{PermissionResolver, Policy, PolicyError};
pub use roles::Role;
pub use token::{TokenError, TokenService};
