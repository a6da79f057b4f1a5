// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token claims and the authenticated principal.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::roles::Role;
use crate::storage::{User, UserStatus};

/// Claims carried by an access token.
///
/// Exactly the principal identifier and the validity window. There is no
/// refresh state: a new token is obtained by logging in again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Principal UUID
    pub sub: Uuid,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Not before (unix seconds)
    pub nbf: i64,
    /// Expires at (unix seconds)
    pub exp: i64,
}

/// Principal resolved by the authorization gate for one request.
///
/// Inserted into request extensions once the token, identity lookup and
/// permission check have all passed.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Internal row id, never serialized
    #[serde(skip)]
    pub id: i64,
    pub uuid: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            uuid: user.uuid,
            full_name: user.full_name,
            email: user.email,
            role: user.role,
            status: user.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_user(role: Role, status: UserStatus) -> User {
        let now = Utc::now();
        User {
            id: 7,
            uuid: Uuid::new_v4(),
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$argon2id$v=19$secret".to_string(),
            status,
            role,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn from_user_drops_password_material() {
        let user = sample_user(Role::Merchant, UserStatus::Active);
        let uuid = user.uuid;
        let principal = Principal::from(user);

        assert_eq!(principal.id, 7);
        assert_eq!(principal.uuid, uuid);
        assert_eq!(principal.role, Role::Merchant);

        let json = serde_json::to_value(&principal).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("id").is_none());
        assert_eq!(json["fullName"], "Ada Lovelace");
    }

    #[test]
    fn status_and_admin_helpers() {
        let admin = Principal::from(sample_user(Role::Admin, UserStatus::Active));
        assert!(admin.is_admin());
        assert!(admin.is_active());

        let inactive = Principal::from(sample_user(Role::User, UserStatus::Inactive));
        assert!(!inactive.is_admin());
        assert!(!inactive.is_active());
    }

    #[test]
    fn claims_serialize_sub_as_string() {
        let sub = Uuid::new_v4();
        let claims = TokenClaims {
            sub,
            iat: 1,
            nbf: 1,
            exp: 2,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["sub"], sub.to_string());
    }
}
