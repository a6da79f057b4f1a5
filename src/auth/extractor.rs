// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the principal admitted by the gate.
//!
//! ```rust,ignore
//! async fn me(Auth(principal): Auth) -> impl IntoResponse { ... }
//!
//! // Also requires `{user_uuid}` in the path to be the caller.
//! async fn balance(Owner(principal): Owner, ...) -> impl IntoResponse { ... }
//! ```

use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use super::{AuthError, Principal};

/// The principal attached by [`super::middleware::authorize`].
pub struct Auth(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(Auth)
            .ok_or_else(|| {
                AuthError::Internal(format!(
                    "no principal in request context for {}",
                    parts.uri.path()
                ))
            })
    }
}

#[derive(Debug, Deserialize)]
struct OwnerParams {
    user_uuid: Uuid,
}

/// The principal, checked to be the owner named by `{user_uuid}` in the path.
///
/// Applies to every role: a permitted action on one's own sub-resources
/// is still forbidden on a peer's.
pub struct Owner(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Auth(principal) = Auth::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        let Path(params) = Path::<OwnerParams>::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        ensure_owner(&principal, params.user_uuid).map_err(IntoResponse::into_response)?;
        Ok(Owner(principal))
    }
}

/// Reject unless `owner` is the principal itself.
pub fn ensure_owner(principal: &Principal, owner: Uuid) -> Result<(), AuthError> {
    if principal.uuid == owner {
        Ok(())
    } else {
        tracing::warn!(
            user_uuid = %principal.uuid,
            path_owner = %owner,
            "cross-principal access denied"
        );
        Err(AuthError::NotOwner)
    }
}
