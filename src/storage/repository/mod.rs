// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed, transaction-guarded access to Postgres.
//!
//! Each repository is a trait with a Postgres implementation here and an
//! in-memory implementation in [`crate::storage::memory`].

pub mod cards;
pub mod users;
pub mod wallets;

pub use cards::{
    format_expiry, parse_expiry, Card, CardFilters, CardLookup, CardRepository, CardStatus,
    CardType, CardUpdate, NewCard, PgCardRepository,
};
pub use users::{NewUser, PgUserRepository, User, UserLookup, UserRepository, UserStatus};
pub use wallets::{
    Currency, PgWalletRepository, Wallet, WalletBalance, WalletLookup, WalletRepository,
    WalletStatus,
};
