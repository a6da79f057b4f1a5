// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization gate errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Rejection produced by the authorization gate.
///
/// Token failures are collapsed into [`AuthError::InvalidToken`] so a caller
/// cannot tell a bad signature from an expired token.
#[derive(Debug)]
pub enum AuthError {
    /// No authorization header present
    MissingAuthHeader,
    /// Header present but not `Bearer <token>`
    InvalidAuthHeader,
    /// Token failed verification
    InvalidToken,
    /// Token is valid but the principal is unknown or not active
    UnknownPrincipal,
    /// Role does not grant the action
    InsufficientPermissions,
    /// Path or resource belongs to another principal
    NotOwner,
    /// Identity lookup exceeded its deadline
    LookupTimeout,
    /// Identity lookup failed. The detail is logged, never returned.
    Internal(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::InvalidToken => "invalid_token",
            AuthError::UnknownPrincipal => "invalid_token",
            AuthError::InsufficientPermissions => "insufficient_permissions",
            AuthError::NotOwner => "not_owner",
            AuthError::LookupTimeout => "timeout",
            AuthError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::InvalidToken
            | AuthError::UnknownPrincipal => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientPermissions | AuthError::NotOwner => StatusCode::FORBIDDEN,
            AuthError::LookupTimeout => StatusCode::GATEWAY_TIMEOUT,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::InvalidToken => write!(f, "Invalid token"),
            AuthError::UnknownPrincipal => write!(f, "Invalid token"),
            AuthError::InsufficientPermissions => {
                write!(f, "Insufficient permissions for this operation")
            }
            AuthError::NotOwner => write!(f, "Access to another user's resources is forbidden"),
            AuthError::LookupTimeout => write!(f, "operation timed out"),
            AuthError::Internal(_) => write!(f, "unexpected server error"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Internal(detail) = &self {
            tracing::error!(error = %detail, "authorization gate failure");
        }
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(error: AuthError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn missing_auth_returns_401() {
        let (status, body) = body_of(AuthError::MissingAuthHeader).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "missing_auth_header");
    }

    #[tokio::test]
    async fn unknown_principal_looks_like_a_bad_token() {
        let (status, body) = body_of(AuthError::UnknownPrincipal).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], AuthError::InvalidToken.to_string());
        assert_eq!(body["error_code"], AuthError::InvalidToken.error_code());
    }

    #[tokio::test]
    async fn permission_and_ownership_return_403() {
        assert_eq!(
            AuthError::InsufficientPermissions.status_code(),
            StatusCode::FORBIDDEN
        );
        let (status, body) = body_of(AuthError::NotOwner).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error_code"], "not_owner");
    }

    #[tokio::test]
    async fn internal_detail_is_not_returned() {
        let (status, body) = body_of(AuthError::Internal("pool timed out".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "unexpected server error");
    }
}
