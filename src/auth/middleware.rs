// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization gate.
//!
//! Runs before every protected handler:
//!
//! 1. Extract the bearer token (401 if absent or malformed)
//! 2. Verify it (401 on any failure)
//! 3. Load the principal by the token subject (401 if unknown or not
//!    active, 500 on lookup failure)
//! 4. Check the role against the policy for this path and method (403)
//! 5. Insert the [`Principal`] into request extensions
//!
//! Routes are registered with their full paths so `request.uri().path()`
//! is the path the policy templates describe.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{AuthError, Principal};
use crate::state::AppState;
use crate::storage::UserLookup;

/// What the gate needs from a request, owned so no borrow of the request
/// is held across the identity lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    token: String,
    path: String,
    method: String,
}

impl Target {
    fn of(request: &Request) -> Result<Self, AuthError> {
        Ok(Self {
            token: bearer_token(request.headers())?.to_owned(),
            path: request.uri().path().to_owned(),
            method: request.method().as_str().to_owned(),
        })
    }
}

/// Gate middleware. Attach with `axum::middleware::from_fn_with_state`.
pub async fn authorize(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let target = match Target::of(&request) {
        Ok(target) => target,
        Err(e) => return e.into_response(),
    };

    match admit(&state, target).await {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

async fn admit(state: &AppState, target: Target) -> Result<Principal, AuthError> {
    let claims = state.tokens.verify(&target.token).map_err(|e| {
        tracing::debug!(error = %e, "token rejected");
        AuthError::InvalidToken
    })?;

    let lookup = state.users.find_by(UserLookup::Uuid(claims.sub));
    let user = match tokio::time::timeout(state.timeouts.read, lookup).await {
        Err(_) => return Err(AuthError::LookupTimeout),
        Ok(Ok(user)) => user,
        Ok(Err(e)) if e.is_internal() => return Err(AuthError::Internal(e.to_string())),
        Ok(Err(_)) => {
            tracing::debug!(user_uuid = %claims.sub, "token subject not found");
            return Err(AuthError::UnknownPrincipal);
        }
    };

    let principal = Principal::from(user);
    if !principal.is_active() {
        tracing::debug!(user_uuid = %principal.uuid, status = principal.status.as_str(), "principal not active");
        return Err(AuthError::UnknownPrincipal);
    }

    let Target { path, method, .. } = target;
    if !state.permissions.has_permission(principal.role, &path, &method) {
        tracing::warn!(
            user_uuid = %principal.uuid,
            role = principal.role.as_str(),
            path = %path,
            method = %method,
            "permission denied"
        );
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(principal)
}

/// Extract `<token>` from `Authorization: Bearer <token>`.
///
/// The scheme is case-insensitive. Anything other than exactly two
/// space-separated parts is malformed.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() =>
        {
            Ok(token)
        }
        _ => Err(AuthError::InvalidAuthHeader),
    }
}
