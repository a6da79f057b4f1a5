// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ownership enforcement for sub-resources.
//!
//! Role permissions say *what* a principal may do. Ownership says *on
//! whose rows*. Every wallet and card handler passes the loaded row
//! through [`OwnershipCheck::verify_owner`] before acting on it, for every
//! role.

use crate::auth::Principal;

use super::{StorageError, StorageResult};

/// A row owned by exactly one principal.
pub trait OwnedResource {
    /// Internal id of the owning user.
    fn owner_id(&self) -> i64;

    /// Name used in the denial message.
    fn resource_name() -> &'static str
    where
        Self: Sized,
    {
        "resource"
    }
}

pub trait OwnershipEnforcer {
    /// # Errors
    /// Returns `StorageError::PermissionDenied` if the principal doesn't own the resource.
    fn verify_ownership(&self, principal: &Principal) -> StorageResult<()>;
}

impl<T: OwnedResource> OwnershipEnforcer for T {
    fn verify_ownership(&self, principal: &Principal) -> StorageResult<()> {
        if self.owner_id() == principal.id {
            Ok(())
        } else {
            tracing::warn!(
                user_uuid = %principal.uuid,
                resource = T::resource_name(),
                "ownership check failed"
            );
            Err(StorageError::PermissionDenied {
                resource: T::resource_name(),
            })
        }
    }
}

/// Ownership check chained onto a repository lookup.
pub trait OwnershipCheck<T> {
    fn verify_owner(self, principal: &Principal) -> StorageResult<T>;
}

impl<T: OwnedResource> OwnershipCheck<T> for StorageResult<T> {
    fn verify_owner(self, principal: &Principal) -> StorageResult<T> {
        let resource = self?;
        resource.verify_ownership(principal)?;
        Ok(resource)
    }
}
