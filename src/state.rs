// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{PermissionResolver, TokenService};
use crate::config::Timeouts;
use crate::crypto::CardCipher;
use crate::storage::{
    CardRepository, InMemoryCardRepository, InMemoryUserRepository, InMemoryWalletRepository,
    UserRepository, WalletRepository,
};

/// Everything a handler or the authorization gate needs, built once at startup.
///
/// Repositories are trait objects so the same router runs against Postgres
/// or the in-memory fakes.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub wallets: Arc<dyn WalletRepository>,
    pub cards: Arc<dyn CardRepository>,
    pub tokens: Arc<TokenService>,
    pub permissions: Arc<PermissionResolver>,
    pub cipher: Arc<CardCipher>,
    pub timeouts: Timeouts,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserRepository>,
        wallets: Arc<dyn WalletRepository>,
        cards: Arc<dyn CardRepository>,
        tokens: TokenService,
        permissions: PermissionResolver,
        cipher: CardCipher,
    ) -> Self {
        Self {
            users,
            wallets,
            cards,
            tokens: Arc::new(tokens),
            permissions: Arc::new(permissions),
            cipher: Arc::new(cipher),
            timeouts: Timeouts::default(),
        }
    }

    /// State backed by fresh in-memory repositories.
    pub fn in_memory(
        tokens: TokenService,
        permissions: PermissionResolver,
        cipher: CardCipher,
    ) -> Self {
        Self::new(
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(InMemoryWalletRepository::new()),
            Arc::new(InMemoryCardRepository::new()),
            tokens,
            permissions,
            cipher,
        )
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}
