// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Principal endpoints.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{auth::hash_blocking, bounded, validation};
use crate::auth::{Auth, Principal, Role};
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::{NewUser, User, UserStatus};

/// Public view of a principal.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub uuid: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            uuid: user.uuid,
            full_name: user.full_name,
            email: user.email,
            role: user.role,
            status: user.status,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Create a principal with an explicit role.
///
/// On top of the route permission, the caller's role must be allowed to
/// create the requested role: admins any role, agents users and merchants.
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Principal created", body = UserResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Role may not create this role"),
        (status = 409, description = "Email already registered"),
    )
)]
pub async fn create_user_with_role(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    if !principal.role.can_create(req.role) {
        tracing::warn!(
            user_uuid = %principal.uuid,
            role = principal.role.as_str(),
            target_role = req.role.as_str(),
            "role elevation denied"
        );
        return Err(ApiError::forbidden(format!(
            "role {} may not create principals with role {}",
            principal.role, req.role
        )));
    }

    validation::validate_new_user(&req.full_name, &req.email, &req.password)?;
    let password_hash = hash_blocking(state.timeouts.password, req.password).await?;

    let new_user = NewUser {
        full_name: req.full_name.trim().to_string(),
        email: validation::normalize_email(&req.email),
        password_hash,
        role: req.role,
    };
    let user = bounded(
        state.timeouts.write,
        "user.create",
        state.users.create(new_user),
    )
    .await?;

    tracing::info!(
        created_by = %principal.uuid,
        user_uuid = %user.uuid,
        role = user.role.as_str(),
        "principal created"
    );
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// The authenticated principal.
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current principal", body = Principal),
        (status = 401, description = "Unauthorized"),
    )
)]
pub async fn get_current_user(Auth(principal): Auth) -> Json<Principal> {
    Json(principal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_response_hides_password_hash() {
        let now = Utc::now();
        let user = User {
            id: 7,
            uuid: Uuid::new_v4(),
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            status: UserStatus::Active,
            role: Role::Merchant,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert_eq!(json["fullName"], "Ada Lovelace");
        assert_eq!(json["role"], "merchant");
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("id").is_none());
    }

    #[test]
    fn create_request_rejects_unknown_role() {
        let body = r#"{"fullName":"A B C","email":"a@b.co","password":"password1","role":"root"}"#;
        assert!(serde_json::from_str::<CreateUserRequest>(body).is_err());
    }
}
