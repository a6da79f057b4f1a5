// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Symmetric protection of card data.

pub mod card_cipher;

pub use card_cipher::{luhn_valid, CardCipher, CardProvider, CipherError};
