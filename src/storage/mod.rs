// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Postgres persistence for users, wallets and cards.
//!
//! ## Consistency Model
//!
//! - Guarded writes run in `SERIALIZABLE` transactions: the pre-check and
//!   the write cannot interleave with another writer on the same keys
//! - Reads run in `READ COMMITTED`
//! - A transaction is committed only by [`tx::finish`]; every other exit
//!   path (error, timeout, panic) rolls it back
//!
//! ## Layout
//!
//! ```text
//! users    (id, uuid, full_name, email UNIQUE, password_hash, status, role)
//! wallets  (id, uuid, user_id, balance, currency, status)  UNIQUE (user_id, currency)
//! cards    (id, uuid, user_id, wallet_id, encrypted_number, provider,
//!           card_type, last_four, expiry_date, status)     UNIQUE (user_id, provider, card_type)
//! ```

pub mod error;
pub mod memory;
pub mod ownership;
pub mod repository;
pub mod tx;

pub use error::{StorageError, StorageResult};
pub use memory::{InMemoryCardRepository, InMemoryUserRepository, InMemoryWalletRepository};
pub use ownership::{OwnedResource, OwnershipCheck, OwnershipEnforcer};
pub use repository::{
    format_expiry, parse_expiry, Card, CardFilters, CardLookup, CardRepository, CardStatus,
    CardType, CardUpdate, Currency, NewCard, NewUser, PgCardRepository, PgUserRepository,
    PgWalletRepository, User, UserLookup, UserRepository, UserStatus, Wallet, WalletBalance,
    WalletLookup, WalletRepository, WalletStatus,
};
