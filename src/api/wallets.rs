// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet endpoints.
//!
//! Every route is scoped to `{user_uuid}`, which must be the caller
//! ([`Owner`]). Routes naming a wallet also check that the wallet row
//! belongs to the caller.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{bounded, MessageResponse};
use crate::auth::{Owner, Principal};
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::{
    Currency, OwnershipCheck, Wallet, WalletBalance, WalletLookup, WalletStatus,
};

/// `{wallet_uuid}` from the path. `{user_uuid}` is read by [`Owner`].
#[derive(Debug, Deserialize)]
pub struct WalletPath {
    pub wallet_uuid: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateWalletRequest {
    /// One of `USD`, `EUR`, `GBP`
    #[schema(example = "USD")]
    pub currency: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateWalletResponse {
    pub wallet: Wallet,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateWalletStatusRequest {
    /// One of `active`, `inactive`, `blocked`
    #[schema(example = "inactive")]
    pub status: String,
}

/// Load a wallet and check that `principal` owns it.
pub(crate) async fn owned_wallet(
    state: &AppState,
    principal: &Principal,
    wallet_uuid: Uuid,
) -> Result<Wallet, ApiError> {
    bounded(state.timeouts.read, "wallet.find", async {
        state
            .wallets
            .find_by(WalletLookup::Uuid(wallet_uuid))
            .await
            .verify_owner(principal)
    })
    .await
}

/// Open a zero-balance wallet in a currency.
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_uuid}/wallets",
    tag = "Wallets",
    security(("bearer_auth" = [])),
    params(("user_uuid" = Uuid, Path, description = "Owner UUID")),
    request_body = CreateWalletRequest,
    responses(
        (status = 201, description = "Wallet created", body = CreateWalletResponse),
        (status = 400, description = "Unsupported currency"),
        (status = 403, description = "Not the owner"),
        (status = 409, description = "Owner already has a wallet in this currency"),
    )
)]
pub async fn create_wallet(
    State(state): State<AppState>,
    Owner(principal): Owner,
    Json(req): Json<CreateWalletRequest>,
) -> Result<(StatusCode, Json<CreateWalletResponse>), ApiError> {
    let currency = Currency::try_from(req.currency).map_err(ApiError::bad_request)?;

    let wallet = bounded(
        state.timeouts.write,
        "wallet.create",
        state.wallets.create(principal.id, currency),
    )
    .await?;

    tracing::info!(
        user_uuid = %principal.uuid,
        wallet_uuid = %wallet.uuid,
        currency = currency.as_str(),
        "wallet created"
    );
    Ok((StatusCode::CREATED, Json(CreateWalletResponse { wallet })))
}

/// Balance of an active wallet.
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_uuid}/wallets/{wallet_uuid}/balance",
    tag = "Wallets",
    security(("bearer_auth" = [])),
    params(
        ("user_uuid" = Uuid, Path, description = "Owner UUID"),
        ("wallet_uuid" = Uuid, Path, description = "Wallet UUID"),
    ),
    responses(
        (status = 200, description = "Wallet balance", body = WalletBalance),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Wallet not found or not active"),
    )
)]
pub async fn get_wallet_balance(
    State(state): State<AppState>,
    Owner(principal): Owner,
    Path(path): Path<WalletPath>,
) -> Result<Json<WalletBalance>, ApiError> {
    owned_wallet(&state, &principal, path.wallet_uuid).await?;

    let balance = bounded(
        state.timeouts.read,
        "wallet.balance",
        state.wallets.get_balance(path.wallet_uuid),
    )
    .await?;
    Ok(Json(balance))
}

/// Change a wallet's status.
#[utoipa::path(
    patch,
    path = "/api/v1/users/{user_uuid}/wallets/{wallet_uuid}/status",
    tag = "Wallets",
    security(("bearer_auth" = [])),
    params(
        ("user_uuid" = Uuid, Path, description = "Owner UUID"),
        ("wallet_uuid" = Uuid, Path, description = "Wallet UUID"),
    ),
    request_body = UpdateWalletStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = MessageResponse),
        (status = 400, description = "Unknown status"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Wallet not found"),
    )
)]
pub async fn update_wallet_status(
    State(state): State<AppState>,
    Owner(principal): Owner,
    Path(path): Path<WalletPath>,
    Json(req): Json<UpdateWalletStatusRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let status = WalletStatus::try_from(req.status.to_ascii_lowercase())
        .map_err(ApiError::bad_request)?;
    owned_wallet(&state, &principal, path.wallet_uuid).await?;

    bounded(
        state.timeouts.write,
        "wallet.update_status",
        state.wallets.update_status(path.wallet_uuid, status),
    )
    .await?;

    tracing::info!(
        user_uuid = %principal.uuid,
        wallet_uuid = %path.wallet_uuid,
        status = status.as_str(),
        "wallet status updated"
    );
    Ok(Json(MessageResponse::new("wallet status updated successfully")))
}
