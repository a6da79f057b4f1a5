// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::storage::StorageError;

const INTERNAL_MESSAGE: &str = "unexpected server error";

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// Log `detail` and return a generic 500.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        tracing::error!(error = %detail, "internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
    }

    /// An operation exceeded its deadline.
    pub fn timeout(operation: &'static str) -> Self {
        tracing::warn!(operation, "operation timed out");
        Self::new(StatusCode::GATEWAY_TIMEOUT, "operation timed out")
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::BadInput(message) => Self::bad_request(message),
            StorageError::NotFound(message) => Self::not_found(message),
            StorageError::Conflict(message) => Self::conflict(message),
            StorageError::PermissionDenied { resource } => {
                Self::forbidden(format!("access denied to {resource}"))
            }
            internal @ (StorageError::Begin(_)
            | StorageError::Commit(_)
            | StorageError::Database { .. }) => Self::internal(internal),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);

        assert_eq!(ApiError::unauthorized("x").status, StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status, StatusCode::FORBIDDEN);
        assert_eq!(ApiError::conflict("x").status, StatusCode::CONFLICT);
        assert_eq!(ApiError::timeout("wallet.create").status, StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn storage_errors_map_to_status() {
        let cases = [
            (StorageError::BadInput("b".into()), StatusCode::BAD_REQUEST, "b"),
            (StorageError::NotFound("n".into()), StatusCode::NOT_FOUND, "n"),
            (StorageError::Conflict("c".into()), StatusCode::CONFLICT, "c"),
        ];
        for (err, status, message) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.status, status);
            assert_eq!(api.message, message);
        }

        let denied = ApiError::from(StorageError::PermissionDenied { resource: "card" });
        assert_eq!(denied.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn database_detail_never_reaches_the_caller() {
        let err = StorageError::Database {
            operation: "card.list",
            source: sqlx::Error::Protocol("relation \"cards\" does not exist".to_string()),
        };
        let api = ApiError::from(err);
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.message, INTERNAL_MESSAGE);
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data"}"#);
    }
}
