// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet repository.
//!
//! ## Guarded Operations
//!
//! | Operation | Isolation | Invariant |
//! |-----------|-----------|-----------|
//! | `create` | serializable | one wallet per (owner, currency) |
//! | `update_status` | serializable | target row exists |
//! | `find_by`, `get_balance` | read committed | - |
//!
//! Balances are integer minor units (cents). There is no floating point
//! anywhere on the money path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::storage::ownership::OwnedResource;
use crate::storage::tx::{begin, finish, Isolation};
use crate::storage::{StorageError, StorageResult};

/// Wallet status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WalletStatus {
    /// Wallet is usable
    Active,
    /// Disabled by the owner
    Inactive,
    /// Disabled by support
    Blocked,
}

impl WalletStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletStatus::Active => "active",
            WalletStatus::Inactive => "inactive",
            WalletStatus::Blocked => "blocked",
        }
    }
}

impl Default for WalletStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl TryFrom<String> for WalletStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "active" => Ok(WalletStatus::Active),
            "inactive" => Ok(WalletStatus::Inactive),
            "blocked" => Ok(WalletStatus::Blocked),
            other => Err(format!("unknown wallet status: {other}")),
        }
    }
}

/// Supported wallet currencies (ISO 4217).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        }
    }
}

impl TryFrom<String> for Currency {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            _ => Err(format!("unsupported currency: {value}")),
        }
    }
}

/// A row of the `wallets` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    #[serde(skip)]
    pub id: i64,
    pub uuid: Uuid,
    #[serde(skip)]
    pub user_id: i64,
    /// Balance in minor units
    #[serde(rename = "balanceInCents")]
    pub balance: i64,
    #[sqlx(try_from = "String")]
    pub currency: Currency,
    #[sqlx(try_from = "String")]
    pub status: WalletStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OwnedResource for Wallet {
    fn owner_id(&self) -> i64 {
        self.user_id
    }

    fn resource_name() -> &'static str {
        "wallet"
    }
}

/// Balance snapshot of an active wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalance {
    #[serde(rename = "balanceInCents")]
    pub balance: i64,
    pub currency: Currency,
}

/// Closed set of columns a wallet can be looked up by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletLookup {
    Id(i64),
    Uuid(Uuid),
    /// Active wallets of an owner
    UserId(i64),
}

impl WalletLookup {
    fn predicate(&self) -> &'static str {
        match self {
            WalletLookup::Id(_) => "id = $1",
            WalletLookup::Uuid(_) => "uuid = $1",
            WalletLookup::UserId(_) => "user_id = $1 AND status = 'active'",
        }
    }
}

#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// Create an active, zero-balance wallet.
    ///
    /// Conflicts if the owner already has a wallet in `currency`, whatever its status.
    async fn create(&self, user_id: i64, currency: Currency) -> StorageResult<Wallet>;

    async fn update_status(&self, uuid: Uuid, status: WalletStatus) -> StorageResult<()>;

    async fn find_by(&self, lookup: WalletLookup) -> StorageResult<Wallet>;

    /// Balance of an active wallet. Inactive or blocked wallets read as not found.
    async fn get_balance(&self, uuid: Uuid) -> StorageResult<WalletBalance>;
}

pub(crate) fn duplicate_wallet(uuid: Uuid, status: &str) -> StorageError {
    StorageError::Conflict(format!(
        "user already has a wallet (uuid: {uuid}, status: {status}) for this currency, \
         update its status instead"
    ))
}

const WALLET_COLUMNS: &str = "id, uuid, user_id, balance, currency, status, created_at, updated_at";

/// Postgres-backed [`WalletRepository`].
#[derive(Clone)]
pub struct PgWalletRepository {
    pool: PgPool,
}

impl PgWalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn create_in(
        conn: &mut PgConnection,
        user_id: i64,
        currency: Currency,
    ) -> StorageResult<Wallet> {
        let existing: Option<(Uuid, String)> =
            sqlx::query_as("SELECT uuid, status FROM wallets WHERE user_id = $1 AND currency = $2")
                .bind(user_id)
                .bind(currency.as_str())
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| StorageError::database("wallet.create check existing", e))?;

        if let Some((uuid, status)) = existing {
            return Err(duplicate_wallet(uuid, &status));
        }

        let query = format!(
            "INSERT INTO wallets (uuid, user_id, balance, currency, status) \
             VALUES ($1, $2, 0, $3, $4) RETURNING {WALLET_COLUMNS}"
        );
        sqlx::query_as::<_, Wallet>(&query)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(currency.as_str())
            .bind(WalletStatus::Active.as_str())
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| StorageError::database("wallet.create insert", e))
    }

    async fn update_status_in(
        conn: &mut PgConnection,
        uuid: Uuid,
        status: WalletStatus,
    ) -> StorageResult<()> {
        let result =
            sqlx::query("UPDATE wallets SET status = $1, updated_at = NOW() WHERE uuid = $2")
                .bind(status.as_str())
                .bind(uuid)
                .execute(&mut *conn)
                .await
                .map_err(|e| StorageError::database("wallet.update_status", e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound("wallet not found".to_string()));
        }
        Ok(())
    }

    async fn find_by_in(conn: &mut PgConnection, lookup: WalletLookup) -> StorageResult<Wallet> {
        let query = format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE {}",
            lookup.predicate()
        );
        let query = sqlx::query_as::<_, Wallet>(&query);
        let query = match lookup {
            WalletLookup::Id(id) | WalletLookup::UserId(id) => query.bind(id),
            WalletLookup::Uuid(uuid) => query.bind(uuid),
        };
        query
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| StorageError::database("wallet.find_by", e))?
            .ok_or_else(|| StorageError::NotFound("wallet not found".to_string()))
    }

    async fn get_balance_in(conn: &mut PgConnection, uuid: Uuid) -> StorageResult<WalletBalance> {
        let row: Option<(i64, String)> = sqlx::query_as(
            "SELECT balance, currency FROM wallets WHERE uuid = $1 AND status = 'active'",
        )
        .bind(uuid)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| StorageError::database("wallet.get_balance", e))?;

        let (balance, currency) = row.ok_or_else(|| {
            StorageError::NotFound("wallet not found or wallet is not active".to_string())
        })?;
        let currency = Currency::try_from(currency).map_err(|e| StorageError::Database {
            operation: "wallet.get_balance",
            source: sqlx::Error::Decode(e.into()),
        })?;
        Ok(WalletBalance { balance, currency })
    }
}

#[async_trait]
impl WalletRepository for PgWalletRepository {
    async fn create(&self, user_id: i64, currency: Currency) -> StorageResult<Wallet> {
        let mut tx = begin(&self.pool, Isolation::Serializable).await?;
        let result = Self::create_in(&mut tx, user_id, currency).await;
        finish(tx, result, "wallet.create").await
    }

    async fn update_status(&self, uuid: Uuid, status: WalletStatus) -> StorageResult<()> {
        let mut tx = begin(&self.pool, Isolation::Serializable).await?;
        let result = Self::update_status_in(&mut tx, uuid, status).await;
        finish(tx, result, "wallet.update_status").await
    }

    async fn find_by(&self, lookup: WalletLookup) -> StorageResult<Wallet> {
        let mut tx = begin(&self.pool, Isolation::ReadCommitted).await?;
        let result = Self::find_by_in(&mut tx, lookup).await;
        finish(tx, result, "wallet.find_by").await
    }

    async fn get_balance(&self, uuid: Uuid) -> StorageResult<WalletBalance> {
        let mut tx = begin(&self.pool, Isolation::ReadCommitted).await?;
        let result = Self::get_balance_in(&mut tx, uuid).await;
        finish(tx, result, "wallet.get_balance").await
    }
}
