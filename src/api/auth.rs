// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registration and login.
//!
//! Both bypass the gate. Login never reveals whether the email or the
//! password was wrong.

use std::time::Duration;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{blocking, bounded, users::UserResponse, validation};
use crate::auth::{password, Role};
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::{NewUser, User, UserLookup, UserStatus};

const INVALID_CREDENTIALS: &str = "invalid credentials";

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub token_type: String,
    /// Seconds until the token expires
    pub expires_in: i64,
}

/// Hash a new password off the async workers, under `limit`.
pub(crate) async fn hash_blocking(limit: Duration, plain: String) -> Result<String, ApiError> {
    blocking(limit, "password.hash", move || password::hash_password(&plain))
        .await?
        .map_err(|e| match e {
            password::PasswordError::InvalidLength => ApiError::bad_request(e.to_string()),
            other => ApiError::internal(other),
        })
}

fn issue(state: &AppState, user: User) -> Result<TokenResponse, ApiError> {
    let access_token = state
        .tokens
        .issue(&user.uuid.to_string())
        .map_err(ApiError::internal)?;
    Ok(TokenResponse {
        user: user.into(),
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.ttl_secs(),
    })
}

/// Self-registration. New principals are active users.
#[utoipa::path(
    post,
    path = "/api/v1/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = TokenResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already registered"),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    validation::validate_new_user(&req.full_name, &req.email, &req.password)?;
    let password_hash = hash_blocking(state.timeouts.password, req.password).await?;

    let user = bounded(
        state.timeouts.write,
        "auth.register",
        state.users.create(NewUser {
            full_name: req.full_name.trim().to_string(),
            email: validation::normalize_email(&req.email),
            password_hash,
            role: Role::default(),
        }),
    )
    .await?;

    tracing::info!(user_uuid = %user.uuid, "user registered");
    Ok((StatusCode::CREATED, Json(issue(&state, user)?)))
}

/// Exchange email and password for an access token.
#[utoipa::path(
    post,
    path = "/api/v1/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let lookup = UserLookup::Email(validation::normalize_email(&req.email));
    let user = match tokio::time::timeout(state.timeouts.read, state.users.find_by(lookup)).await {
        Err(_) => return Err(ApiError::timeout("auth.login")),
        Ok(Ok(user)) => Some(user),
        Ok(Err(e)) if e.is_internal() => return Err(ApiError::internal(e)),
        Ok(Err(_)) => None,
    };

    // Unknown emails still pay for one verification.
    let stored = user.as_ref().map(|u| u.password_hash.clone());
    let verified = blocking(state.timeouts.password, "password.verify", move || {
        password::verify_or_dummy(&req.password, stored.as_deref())
    })
    .await?;

    let user = match (user, verified) {
        (Some(user), Ok(())) => user,
        (Some(user), Err(e)) => {
            tracing::debug!(user_uuid = %user.uuid, error = %e, "login rejected");
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        }
        (None, _) => {
            tracing::debug!("login for unknown email");
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        }
    };

    if user.status != UserStatus::Active {
        tracing::debug!(user_uuid = %user.uuid, status = user.status.as_str(), "login for inactive user");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    tracing::info!(user_uuid = %user.uuid, "user logged in");
    Ok(Json(issue(&state, user)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_blocking_rejects_short_password_as_bad_input() {
        let limit = Duration::from_secs(5);
        let err = hash_blocking(limit, "short".to_string()).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let hash = hash_blocking(limit, "long enough".to_string()).await.unwrap();
        assert!(password::verify_password("long enough", &hash).is_ok());
    }

    #[test]
    fn token_response_shape() {
        let body = TokenResponse {
            user: UserResponse {
                uuid: uuid::Uuid::nil(),
                full_name: "Ada Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                role: Role::User,
                status: UserStatus::Active,
                created_at: chrono::Utc::now(),
            },
            access_token: "t".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 1800,
        };
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["tokenType"], "Bearer");
        assert_eq!(json["expiresIn"], 1800);
        assert_eq!(json["user"]["email"], "ada@example.com");
    }
}
