// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory repositories.
//!
//! Same outcomes as the Postgres implementations, including conflict
//! messages and soft-delete visibility. One mutex per table makes each
//! check-then-write atomic, standing in for serializable isolation.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::repository::cards::{CONFLICT_DELETED, CONFLICT_EXISTS};
use super::repository::users::DUPLICATE_EMAIL;
use super::repository::wallets::duplicate_wallet;
use super::{
    Card, CardFilters, CardLookup, CardRepository, CardStatus, CardUpdate, Currency, NewCard,
    NewUser, StorageError, StorageResult, User, UserLookup, UserRepository, UserStatus, Wallet,
    WalletBalance, WalletLookup, WalletRepository, WalletStatus,
};

struct Table<T> {
    rows: Vec<T>,
    next_id: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            next_id: 1,
        }
    }
}

impl<T> Table<T> {
    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    table: Mutex<Table<User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Change a user's lifecycle status. Returns false if the user is unknown.
    pub async fn set_status(&self, uuid: Uuid, status: UserStatus) -> bool {
        let mut table = self.table.lock().await;
        match table.rows.iter_mut().find(|u| u.uuid == uuid) {
            Some(user) => {
                user.status = status;
                user.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: NewUser) -> StorageResult<User> {
        let mut table = self.table.lock().await;
        if table.rows.iter().any(|u| u.email == user.email) {
            return Err(StorageError::Conflict(DUPLICATE_EMAIL.to_string()));
        }

        let now = Utc::now();
        let row = User {
            id: table.allocate_id(),
            uuid: Uuid::new_v4(),
            full_name: user.full_name,
            email: user.email,
            password_hash: user.password_hash,
            status: UserStatus::Active,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        table.rows.push(row.clone());
        Ok(row)
    }

    async fn find_by(&self, lookup: UserLookup) -> StorageResult<User> {
        let table = self.table.lock().await;
        table
            .rows
            .iter()
            .find(|u| match &lookup {
                UserLookup::Id(id) => u.id == *id,
                UserLookup::Uuid(uuid) => u.uuid == *uuid,
                UserLookup::Email(email) => &u.email == email,
            })
            .cloned()
            .ok_or_else(|| StorageError::NotFound("user not found".to_string()))
    }
}

#[derive(Default)]
pub struct InMemoryWalletRepository {
    table: Mutex<Table<Wallet>>,
}

impl InMemoryWalletRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletRepository for InMemoryWalletRepository {
    async fn create(&self, user_id: i64, currency: Currency) -> StorageResult<Wallet> {
        let mut table = self.table.lock().await;
        if let Some(existing) = table
            .rows
            .iter()
            .find(|w| w.user_id == user_id && w.currency == currency)
        {
            return Err(duplicate_wallet(existing.uuid, existing.status.as_str()));
        }

        let now = Utc::now();
        let wallet = Wallet {
            id: table.allocate_id(),
            uuid: Uuid::new_v4(),
            user_id,
            balance: 0,
            currency,
            status: WalletStatus::Active,
            created_at: now,
            updated_at: now,
        };
        table.rows.push(wallet.clone());
        Ok(wallet)
    }

    async fn update_status(&self, uuid: Uuid, status: WalletStatus) -> StorageResult<()> {
        let mut table = self.table.lock().await;
        let wallet = table
            .rows
            .iter_mut()
            .find(|w| w.uuid == uuid)
            .ok_or_else(|| StorageError::NotFound("wallet not found".to_string()))?;
        wallet.status = status;
        wallet.updated_at = Utc::now();
        Ok(())
    }

    async fn find_by(&self, lookup: WalletLookup) -> StorageResult<Wallet> {
        let table = self.table.lock().await;
        table
            .rows
            .iter()
            .find(|w| match lookup {
                WalletLookup::Id(id) => w.id == id,
                WalletLookup::Uuid(uuid) => w.uuid == uuid,
                WalletLookup::UserId(id) => w.user_id == id && w.status == WalletStatus::Active,
            })
            .cloned()
            .ok_or_else(|| StorageError::NotFound("wallet not found".to_string()))
    }

    async fn get_balance(&self, uuid: Uuid) -> StorageResult<WalletBalance> {
        let table = self.table.lock().await;
        table
            .rows
            .iter()
            .find(|w| w.uuid == uuid && w.status == WalletStatus::Active)
            .map(|w| WalletBalance {
                balance: w.balance,
                currency: w.currency,
            })
            .ok_or_else(|| {
                StorageError::NotFound("wallet not found or wallet is not active".to_string())
            })
    }
}

#[derive(Default)]
pub struct InMemoryCardRepository {
    table: Mutex<Table<Card>>,
}

impl InMemoryCardRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CardRepository for InMemoryCardRepository {
    async fn add_card_to_wallet(&self, card: NewCard) -> StorageResult<Card> {
        let mut table = self.table.lock().await;
        if let Some(existing) = table.rows.iter().find(|c| {
            c.user_id == card.user_id && c.provider == card.provider && c.card_type == card.card_type
        }) {
            let message = if existing.status == CardStatus::Deleted {
                CONFLICT_DELETED
            } else {
                CONFLICT_EXISTS
            };
            return Err(StorageError::Conflict(message.to_string()));
        }

        let now = Utc::now();
        let row = Card {
            id: table.allocate_id(),
            uuid: Uuid::new_v4(),
            user_id: card.user_id,
            wallet_id: card.wallet_id,
            encrypted_number: card.encrypted_number,
            provider: card.provider,
            card_type: card.card_type,
            last_four: card.last_four,
            expiry_date: card.expiry_date,
            status: CardStatus::Active,
            created_at: now,
            updated_at: now,
        };
        table.rows.push(row.clone());
        Ok(row)
    }

    async fn find_by(&self, lookup: CardLookup) -> StorageResult<Card> {
        let table = self.table.lock().await;
        table
            .rows
            .iter()
            .rev()
            .find(|c| c.status != CardStatus::Deleted && lookup.matches(c))
            .cloned()
            .ok_or_else(|| StorageError::NotFound("card not found".to_string()))
    }

    async fn find_any_status(&self, uuid: Uuid) -> StorageResult<Card> {
        let table = self.table.lock().await;
        table
            .rows
            .iter()
            .find(|c| c.uuid == uuid)
            .cloned()
            .ok_or_else(|| StorageError::NotFound("card not found".to_string()))
    }

    async fn update(&self, uuid: Uuid, update: CardUpdate) -> StorageResult<Card> {
        if update.is_empty() {
            return Err(StorageError::BadInput("no card fields to update".to_string()));
        }
        let mut table = self.table.lock().await;
        let card = table
            .rows
            .iter_mut()
            .find(|c| c.uuid == uuid)
            .ok_or_else(|| StorageError::NotFound("card not found".to_string()))?;
        if let Some(expiry) = update.expiry_date {
            card.expiry_date = expiry;
        }
        if let Some(status) = update.status {
            card.status = status;
        }
        card.updated_at = Utc::now();
        Ok(card.clone())
    }

    async fn delete(&self, uuid: Uuid) -> StorageResult<()> {
        let mut table = self.table.lock().await;
        let card = table
            .rows
            .iter_mut()
            .find(|c| c.uuid == uuid && c.status != CardStatus::Deleted)
            .ok_or_else(|| StorageError::NotFound("card not found".to_string()))?;
        card.status = CardStatus::Deleted;
        card.updated_at = Utc::now();
        Ok(())
    }

    async fn list(&self, filters: CardFilters) -> StorageResult<Vec<Card>> {
        let table = self.table.lock().await;
        // Rows are appended in creation order.
        Ok(table
            .rows
            .iter()
            .rev()
            .filter(|c| filters.matches(c))
            .cloned()
            .collect())
    }
}
