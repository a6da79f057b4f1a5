// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Card repository.
//!
//! ## Guarded Operations
//!
//! | Operation | Isolation | Invariant |
//! |-----------|-----------|-----------|
//! | `add_card_to_wallet` | serializable | one card row per (owner, provider, type) |
//! | `update` | serializable | target row exists (deleted rows included) |
//! | `delete` | serializable | target row exists and is not deleted |
//! | `find_by`, `find_any_status`, `list` | read committed | - |
//!
//! Deleting a card is a soft delete: the row stays with status `deleted`
//! and blocks new cards for the same key until it is reactivated through
//! `update`.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::crypto::CardProvider;
use crate::storage::ownership::OwnedResource;
use crate::storage::tx::{begin, finish, Isolation};
use crate::storage::{StorageError, StorageResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    Credit,
    Debit,
}

impl CardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Credit => "credit",
            CardType::Debit => "debit",
        }
    }
}

impl TryFrom<String> for CardType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "credit" => Ok(CardType::Credit),
            "debit" => Ok(CardType::Debit),
            other => Err(format!("unknown card type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    Active,
    Inactive,
    /// Soft-delete tombstone
    Deleted,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Active => "active",
            CardStatus::Inactive => "inactive",
            CardStatus::Deleted => "deleted",
        }
    }
}

impl TryFrom<String> for CardStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "active" => Ok(CardStatus::Active),
            "inactive" => Ok(CardStatus::Inactive),
            "deleted" => Ok(CardStatus::Deleted),
            other => Err(format!("unknown card status: {other}")),
        }
    }
}

/// A row of the `cards` table.
///
/// Not serializable on purpose: the encrypted number never leaves the
/// server in this shape.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Card {
    pub id: i64,
    pub uuid: Uuid,
    pub user_id: i64,
    pub wallet_id: i64,
    /// `nonce || ciphertext` from the card cipher
    pub encrypted_number: Vec<u8>,
    #[sqlx(try_from = "String")]
    pub provider: CardProvider,
    #[sqlx(try_from = "String")]
    pub card_type: CardType,
    pub last_four: String,
    pub expiry_date: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub status: CardStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OwnedResource for Card {
    fn owner_id(&self) -> i64 {
        self.user_id
    }

    fn resource_name() -> &'static str {
        "card"
    }
}

/// Input for [`CardRepository::add_card_to_wallet`].
#[derive(Debug, Clone)]
pub struct NewCard {
    pub user_id: i64,
    pub wallet_id: i64,
    pub encrypted_number: Vec<u8>,
    pub provider: CardProvider,
    pub card_type: CardType,
    pub last_four: String,
    pub expiry_date: DateTime<Utc>,
}

/// Partial update. At least one field must be set.
#[derive(Debug, Clone, Default)]
pub struct CardUpdate {
    pub expiry_date: Option<DateTime<Utc>>,
    pub status: Option<CardStatus>,
}

impl CardUpdate {
    pub fn is_empty(&self) -> bool {
        self.expiry_date.is_none() && self.status.is_none()
    }
}

/// Conjunctive list filters. Without `status`, deleted cards are hidden.
#[derive(Debug, Clone, Default)]
pub struct CardFilters {
    pub user_id: Option<i64>,
    pub wallet_id: Option<i64>,
    pub provider: Option<CardProvider>,
    pub status: Option<CardStatus>,
}

impl CardFilters {
    /// Whether a card passes these filters.
    pub fn matches(&self, card: &Card) -> bool {
        self.user_id.is_none_or(|id| card.user_id == id)
            && self.wallet_id.is_none_or(|id| card.wallet_id == id)
            && self.provider.is_none_or(|p| card.provider == p)
            && match self.status {
                Some(status) => card.status == status,
                None => card.status != CardStatus::Deleted,
            }
    }
}

/// Closed set of columns a card can be looked up by. Deleted cards are never returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardLookup {
    Id(i64),
    Uuid(Uuid),
    UserId(i64),
    WalletId(i64),
}

impl CardLookup {
    pub fn column(&self) -> &'static str {
        match self {
            CardLookup::Id(_) => "id",
            CardLookup::Uuid(_) => "uuid",
            CardLookup::UserId(_) => "user_id",
            CardLookup::WalletId(_) => "wallet_id",
        }
    }

    pub fn matches(&self, card: &Card) -> bool {
        match *self {
            CardLookup::Id(id) => card.id == id,
            CardLookup::Uuid(uuid) => card.uuid == uuid,
            CardLookup::UserId(id) => card.user_id == id,
            CardLookup::WalletId(id) => card.wallet_id == id,
        }
    }
}

/// Parse an `MM/YY` expiry into the last second of that month (UTC).
///
/// Expiries at or before `now` are rejected.
pub fn parse_expiry(value: &str, now: DateTime<Utc>) -> StorageResult<DateTime<Utc>> {
    let bad = || StorageError::BadInput("expiry date must be in MM/YY format".to_string());

    let (month, year) = value.split_once('/').ok_or_else(bad)?;
    if month.len() != 2 || year.len() != 2 {
        return Err(bad());
    }
    let month: u32 = month.parse().map_err(|_| bad())?;
    let year: i32 = year.parse().map_err(|_| bad())?;
    if !(1..=12).contains(&month) {
        return Err(bad());
    }

    let (next_year, next_month) = if month == 12 {
        (2000 + year + 1, 1)
    } else {
        (2000 + year, month + 1)
    };
    let expiry = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(bad)?
        .and_utc()
        - Duration::seconds(1);

    if expiry <= now {
        return Err(StorageError::BadInput("card is expired".to_string()));
    }
    Ok(expiry)
}

/// Render a stored expiry back as `MM/YY`.
pub fn format_expiry(expiry: DateTime<Utc>) -> String {
    format!("{:02}/{:02}", expiry.month(), expiry.year() % 100)
}

#[async_trait]
pub trait CardRepository: Send + Sync {
    /// Insert a card.
    ///
    /// Conflicts if any row exists for the same (owner, provider, type). A
    /// soft-deleted row yields a distinct message asking for reactivation.
    async fn add_card_to_wallet(&self, card: NewCard) -> StorageResult<Card>;

    async fn find_by(&self, lookup: CardLookup) -> StorageResult<Card>;

    /// Find a card by UUID whatever its status, for the reactivation path.
    async fn find_any_status(&self, uuid: Uuid) -> StorageResult<Card>;

    async fn update(&self, uuid: Uuid, update: CardUpdate) -> StorageResult<Card>;

    /// Soft delete.
    async fn delete(&self, uuid: Uuid) -> StorageResult<()>;

    /// Newest first.
    async fn list(&self, filters: CardFilters) -> StorageResult<Vec<Card>>;
}

pub(crate) const CONFLICT_DELETED: &str = "a deleted card of this type and provider exists, \
     update its status instead of adding a new one";
pub(crate) const CONFLICT_EXISTS: &str =
    "an active or inactive card of this type and provider already exists";

const CARD_COLUMNS: &str = "id, uuid, user_id, wallet_id, encrypted_number, provider, card_type, \
     last_four, expiry_date, status, created_at, updated_at";

/// Postgres-backed [`CardRepository`].
#[derive(Clone)]
pub struct PgCardRepository {
    pool: PgPool,
}

impl PgCardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn add_in(conn: &mut PgConnection, card: NewCard) -> StorageResult<Card> {
        let existing: Option<String> = sqlx::query_scalar(
            "SELECT status FROM cards WHERE user_id = $1 AND provider = $2 AND card_type = $3 LIMIT 1",
        )
        .bind(card.user_id)
        .bind(card.provider.as_str())
        .bind(card.card_type.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| StorageError::database("card.add check existing", e))?;

        match existing.as_deref() {
            Some("deleted") => return Err(StorageError::Conflict(CONFLICT_DELETED.to_string())),
            Some(_) => return Err(StorageError::Conflict(CONFLICT_EXISTS.to_string())),
            None => {}
        }

        let query = format!(
            "INSERT INTO cards (uuid, user_id, wallet_id, encrypted_number, provider, card_type, \
             last_four, expiry_date, status) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {CARD_COLUMNS}"
        );
        sqlx::query_as::<_, Card>(&query)
            .bind(Uuid::new_v4())
            .bind(card.user_id)
            .bind(card.wallet_id)
            .bind(&card.encrypted_number)
            .bind(card.provider.as_str())
            .bind(card.card_type.as_str())
            .bind(&card.last_four)
            .bind(card.expiry_date)
            .bind(CardStatus::Active.as_str())
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| StorageError::database("card.add insert", e))
    }

    async fn find_by_in(conn: &mut PgConnection, lookup: CardLookup) -> StorageResult<Card> {
        let query = format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE {} = $1 AND status <> 'deleted' \
             ORDER BY created_at DESC LIMIT 1",
            lookup.column()
        );
        let query = sqlx::query_as::<_, Card>(&query);
        let query = match lookup {
            CardLookup::Id(id) | CardLookup::UserId(id) | CardLookup::WalletId(id) => {
                query.bind(id)
            }
            CardLookup::Uuid(uuid) => query.bind(uuid),
        };
        query
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| StorageError::database("card.find_by", e))?
            .ok_or_else(|| StorageError::NotFound("card not found".to_string()))
    }

    async fn find_any_status_in(conn: &mut PgConnection, uuid: Uuid) -> StorageResult<Card> {
        let query = format!("SELECT {CARD_COLUMNS} FROM cards WHERE uuid = $1");
        sqlx::query_as::<_, Card>(&query)
            .bind(uuid)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| StorageError::database("card.find_any_status", e))?
            .ok_or_else(|| StorageError::NotFound("card not found".to_string()))
    }

    async fn update_in(
        conn: &mut PgConnection,
        uuid: Uuid,
        update: CardUpdate,
    ) -> StorageResult<Card> {
        if update.is_empty() {
            return Err(StorageError::BadInput("no card fields to update".to_string()));
        }

        // Deleted rows are included: this is how a tombstone comes back.
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM cards WHERE uuid = $1)")
            .bind(uuid)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| StorageError::database("card.update check existing", e))?;
        if !exists {
            return Err(StorageError::NotFound("card not found".to_string()));
        }

        let query = format!(
            "UPDATE cards SET expiry_date = COALESCE($1, expiry_date), \
             status = COALESCE($2, status), updated_at = NOW() \
             WHERE uuid = $3 RETURNING {CARD_COLUMNS}"
        );
        sqlx::query_as::<_, Card>(&query)
            .bind(update.expiry_date)
            .bind(update.status.map(|s| s.as_str()))
            .bind(uuid)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| StorageError::database("card.update", e))
    }

    async fn delete_in(conn: &mut PgConnection, uuid: Uuid) -> StorageResult<()> {
        let result = sqlx::query(
            "UPDATE cards SET status = 'deleted', updated_at = NOW() \
             WHERE uuid = $1 AND status <> 'deleted'",
        )
        .bind(uuid)
        .execute(&mut *conn)
        .await
        .map_err(|e| StorageError::database("card.delete", e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound("card not found".to_string()));
        }
        Ok(())
    }

    async fn list_in(conn: &mut PgConnection, filters: CardFilters) -> StorageResult<Vec<Card>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {CARD_COLUMNS} FROM cards WHERE TRUE"));
        if let Some(user_id) = filters.user_id {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(wallet_id) = filters.wallet_id {
            qb.push(" AND wallet_id = ").push_bind(wallet_id);
        }
        if let Some(provider) = filters.provider {
            qb.push(" AND provider = ").push_bind(provider.as_str());
        }
        match filters.status {
            Some(status) => {
                qb.push(" AND status = ").push_bind(status.as_str());
            }
            None => {
                qb.push(" AND status <> 'deleted'");
            }
        }
        qb.push(" ORDER BY created_at DESC");

        qb.build_query_as::<Card>()
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| StorageError::database("card.list", e))
    }
}

#[async_trait]
impl CardRepository for PgCardRepository {
    async fn add_card_to_wallet(&self, card: NewCard) -> StorageResult<Card> {
        let mut tx = begin(&self.pool, Isolation::Serializable).await?;
        let result = Self::add_in(&mut tx, card).await;
        finish(tx, result, "card.add").await
    }

    async fn find_by(&self, lookup: CardLookup) -> StorageResult<Card> {
        let mut tx = begin(&self.pool, Isolation::ReadCommitted).await?;
        let result = Self::find_by_in(&mut tx, lookup).await;
        finish(tx, result, "card.find_by").await
    }

    async fn find_any_status(&self, uuid: Uuid) -> StorageResult<Card> {
        let mut tx = begin(&self.pool, Isolation::ReadCommitted).await?;
        let result = Self::find_any_status_in(&mut tx, uuid).await;
        finish(tx, result, "card.find_any_status").await
    }

    async fn update(&self, uuid: Uuid, update: CardUpdate) -> StorageResult<Card> {
        let mut tx = begin(&self.pool, Isolation::Serializable).await?;
        let result = Self::update_in(&mut tx, uuid, update).await;
        finish(tx, result, "card.update").await
    }

    async fn delete(&self, uuid: Uuid) -> StorageResult<()> {
        let mut tx = begin(&self.pool, Isolation::Serializable).await?;
        let result = Self::delete_in(&mut tx, uuid).await;
        finish(tx, result, "card.delete").await
    }

    async fn list(&self, filters: CardFilters) -> StorageResult<Vec<Card>> {
        let mut tx = begin(&self.pool, Isolation::ReadCommitted).await?;
        let result = Self::list_in(&mut tx, filters).await;
        finish(tx, result, "card.list").await
    }
}
