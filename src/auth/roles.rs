// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Principal roles and the role-elevation rule.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Principal roles for authorization.
///
/// ## Role Hierarchy
///
/// - `Admin` - Every action in the policy, may create principals of any role
/// - `Agent` - Support operations, may create `user` and `merchant` principals
/// - `User` - Manages own wallets and cards
/// - `Merchant` - Same surface as `User`
///
/// What each role may do on which route lives in the policy document, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full administrative access
    Admin,
    /// Regular account holder
    User,
    /// Support agent
    Agent,
    /// Merchant account holder
    Merchant,
}

/// A role name outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::User, Role::Agent, Role::Merchant];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Agent => "agent",
            Role::Merchant => "merchant",
        }
    }

    /// Whether a principal with this role may create a principal with `target`.
    ///
    /// Applied on top of the permission table: a creator that passed the
    /// generic `CreateUserWithRole` check is still limited to this allow-list.
    pub fn can_create(&self, target: Role) -> bool {
        match (self, target) {
            (Role::Admin, _) => true,
            (Role::Agent, Role::User | Role::Merchant) => true,
            _ => false,
        }
    }
}

impl Default for Role {
    /// Self-registered principals are plain users.
    fn default() -> Self {
        Role::User
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            "agent" => Ok(Role::Agent),
            "merchant" => Ok(Role::Merchant),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
