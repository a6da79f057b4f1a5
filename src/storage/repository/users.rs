// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User repository.
//!
//! ## Guarded Operations
//!
//! | Operation | Isolation | Invariant |
//! |-----------|-----------|-----------|
//! | `create` | serializable | one user per email |
//! | `find_by` | read committed | - |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Role;
use crate::storage::tx::{begin, finish, Isolation};
use crate::storage::{StorageError, StorageResult};

/// Principal lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Deleted,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Deleted => "deleted",
        }
    }
}

impl TryFrom<String> for UserStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            "deleted" => Ok(UserStatus::Deleted),
            other => Err(format!("unknown user status: {other}")),
        }
    }
}

/// A row of the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub uuid: Uuid,
    pub full_name: String,
    pub email: String,
    /// Argon2id PHC string
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub status: UserStatus,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`UserRepository::create`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Closed set of columns a user can be looked up by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserLookup {
    Id(i64),
    Uuid(Uuid),
    Email(String),
}

impl UserLookup {
    pub fn column(&self) -> &'static str {
        match self {
            UserLookup::Id(_) => "id",
            UserLookup::Uuid(_) => "uuid",
            UserLookup::Email(_) => "email",
        }
    }
}

/// Identity store.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user, enforcing email uniqueness inside a serializable transaction.
    async fn create(&self, user: NewUser) -> StorageResult<User>;

    async fn find_by(&self, lookup: UserLookup) -> StorageResult<User>;

    /// Cheap connectivity probe for health checks.
    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }
}

pub(crate) const DUPLICATE_EMAIL: &str = "user with this email already exists";

const USER_COLUMNS: &str =
    "id, uuid, full_name, email, password_hash, status, role, created_at, updated_at";

/// Postgres-backed [`UserRepository`].
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn create_in(conn: &mut PgConnection, user: NewUser) -> StorageResult<User> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
            .bind(&user.email)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| StorageError::database("user.create check email", e))?;
        if exists {
            return Err(StorageError::Conflict(DUPLICATE_EMAIL.to_string()));
        }

        let query = format!(
            "INSERT INTO users (uuid, full_name, email, password_hash, status, role) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(Uuid::new_v4())
            .bind(&user.full_name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(UserStatus::Active.as_str())
            .bind(user.role.as_str())
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| StorageError::database("user.create insert", e))
    }

    async fn find_by_in(conn: &mut PgConnection, lookup: &UserLookup) -> StorageResult<User> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {} = $1",
            lookup.column()
        );
        let query = sqlx::query_as::<_, User>(&query);
        let query = match lookup {
            UserLookup::Id(id) => query.bind(*id),
            UserLookup::Uuid(uuid) => query.bind(*uuid),
            UserLookup::Email(email) => query.bind(email.clone()),
        };
        query
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| StorageError::database("user.find_by", e))?
            .ok_or_else(|| StorageError::NotFound("user not found".to_string()))
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: NewUser) -> StorageResult<User> {
        let mut tx = begin(&self.pool, Isolation::Serializable).await?;
        let result = Self::create_in(&mut tx, user).await;
        finish(tx, result, "user.create").await
    }

    async fn find_by(&self, lookup: UserLookup) -> StorageResult<User> {
        let mut tx = begin(&self.pool, Isolation::ReadCommitted).await?;
        let result = Self::find_by_in(&mut tx, &lookup).await;
        finish(tx, result, "user.find_by").await
    }

    async fn ping(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| StorageError::database("ping", e))
    }
}
