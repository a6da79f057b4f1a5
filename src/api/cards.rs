// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Card endpoints.
//!
//! Cards hang off a wallet. Every route checks path ownership, wallet
//! ownership and, for routes naming a card, that the card belongs to both
//! the caller and the wallet in the path. A card under another wallet
//! reads as not found.
//!
//! The full number is only ever returned by the reveal route. The CVV is
//! validated and discarded.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{bounded, validation::is_digits, wallets::owned_wallet, MessageResponse};
use crate::auth::{Owner, Principal};
use crate::crypto::{luhn_valid, CardProvider};
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::{
    format_expiry, parse_expiry, Card, CardFilters, CardLookup, CardStatus, CardType, CardUpdate,
    NewCard, OwnershipEnforcer, Wallet,
};

const CARD_NUMBER_LEN: std::ops::RangeInclusive<usize> = 13..=19;

#[derive(Debug, Deserialize)]
pub struct WalletCardsPath {
    pub wallet_uuid: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CardPath {
    pub wallet_uuid: Uuid,
    pub card_uuid: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddCardRequest {
    /// 13 to 19 digits
    #[schema(example = "4111111111111111")]
    pub card_number: String,
    /// `visa`, `mastercard` or `amex`; must match the number
    pub provider: String,
    /// `credit` or `debit`
    #[serde(rename = "type")]
    pub card_type: String,
    /// `MM/YY`, in the future
    #[schema(example = "12/30")]
    pub expiry_date: String,
    /// 3 or 4 digits, never stored
    pub cvv: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCardRequest {
    /// `MM/YY`, in the future
    pub expiry_date: Option<String>,
    /// `active` or `inactive`
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CardListQuery {
    pub provider: Option<String>,
    pub status: Option<String>,
}

/// A card without its number.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CardResponse {
    pub uuid: Uuid,
    pub provider: CardProvider,
    #[serde(rename = "type")]
    pub card_type: CardType,
    pub last_four: String,
    /// `MM/YY`
    pub expiry_date: String,
    pub status: CardStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Card> for CardResponse {
    fn from(card: Card) -> Self {
        Self {
            uuid: card.uuid,
            provider: card.provider,
            card_type: card.card_type,
            last_four: card.last_four,
            expiry_date: format_expiry(card.expiry_date),
            status: card.status,
            created_at: card.created_at,
            updated_at: card.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AddCardResponse {
    pub card: CardResponse,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CardListResponse {
    pub cards: Vec<CardResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CardNumberResponse {
    pub card_number: String,
}

/// Validate an add-card request into its typed parts.
fn parse_new_card(
    req: &AddCardRequest,
    now: DateTime<Utc>,
) -> Result<(CardProvider, CardType, DateTime<Utc>), ApiError> {
    let number = req.card_number.as_str();
    if !is_digits(number) || !CARD_NUMBER_LEN.contains(&number.len()) || !luhn_valid(number) {
        return Err(ApiError::bad_request("card number is invalid"));
    }

    let declared: CardProvider = req
        .provider
        .to_ascii_lowercase()
        .parse()
        .map_err(ApiError::bad_request)?;
    match CardProvider::detect(number) {
        Some(detected) if detected == declared => {}
        Some(detected) => {
            return Err(ApiError::bad_request(format!(
                "card number is a {detected} number, not {declared}"
            )))
        }
        None => return Err(ApiError::bad_request("card provider is not supported")),
    }

    let card_type =
        CardType::try_from(req.card_type.to_ascii_lowercase()).map_err(ApiError::bad_request)?;

    if !is_digits(&req.cvv) || !(3..=4).contains(&req.cvv.len()) {
        return Err(ApiError::bad_request("cvv must be 3 or 4 digits"));
    }

    let expiry = parse_expiry(&req.expiry_date, now)?;
    Ok((declared, card_type, expiry))
}

fn parse_update(req: UpdateCardRequest, now: DateTime<Utc>) -> Result<CardUpdate, ApiError> {
    let status = match req.status.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => None,
        Some("active") => Some(CardStatus::Active),
        Some("inactive") => Some(CardStatus::Inactive),
        Some(_) => return Err(ApiError::bad_request("status must be active or inactive")),
    };
    let expiry_date = req
        .expiry_date
        .as_deref()
        .map(|e| parse_expiry(e, now))
        .transpose()?;

    let update = CardUpdate {
        expiry_date,
        status,
    };
    if update.is_empty() {
        return Err(ApiError::bad_request("no card fields to update"));
    }
    Ok(update)
}

fn parse_filters(
    query: CardListQuery,
    principal: &Principal,
    wallet: &Wallet,
) -> Result<CardFilters, ApiError> {
    let provider = query
        .provider
        .map(|p| p.to_ascii_lowercase().parse::<CardProvider>())
        .transpose()
        .map_err(ApiError::bad_request)?;
    let status = query
        .status
        .map(|s| CardStatus::try_from(s.to_ascii_lowercase()))
        .transpose()
        .map_err(ApiError::bad_request)?;

    Ok(CardFilters {
        user_id: Some(principal.id),
        wallet_id: Some(wallet.id),
        provider,
        status,
    })
}

/// Check that `card` is the caller's and sits under `wallet`.
fn check_card(card: Card, principal: &Principal, wallet: &Wallet) -> Result<Card, ApiError> {
    card.verify_ownership(principal)?;
    if card.wallet_id != wallet.id {
        return Err(ApiError::not_found("card not found"));
    }
    Ok(card)
}

async fn owned_card(
    state: &AppState,
    principal: &Principal,
    path: &CardPath,
) -> Result<Card, ApiError> {
    let wallet = owned_wallet(state, principal, path.wallet_uuid).await?;
    let card = bounded(
        state.timeouts.read,
        "card.find",
        state.cards.find_by(CardLookup::Uuid(path.card_uuid)),
    )
    .await?;
    check_card(card, principal, &wallet)
}

/// Attach a card to a wallet.
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_uuid}/wallets/{wallet_uuid}/cards",
    tag = "Cards",
    security(("bearer_auth" = [])),
    params(
        ("user_uuid" = Uuid, Path, description = "Owner UUID"),
        ("wallet_uuid" = Uuid, Path, description = "Wallet UUID"),
    ),
    request_body = AddCardRequest,
    responses(
        (status = 201, description = "Card added", body = AddCardResponse),
        (status = 400, description = "Invalid card data"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Wallet not found"),
        (status = 409, description = "Card of this provider and type already exists"),
    )
)]
pub async fn add_card(
    State(state): State<AppState>,
    Owner(principal): Owner,
    Path(path): Path<WalletCardsPath>,
    Json(req): Json<AddCardRequest>,
) -> Result<(StatusCode, Json<AddCardResponse>), ApiError> {
    let (provider, card_type, expiry_date) = parse_new_card(&req, Utc::now())?;
    let wallet = owned_wallet(&state, &principal, path.wallet_uuid).await?;

    let encrypted_number = state.cipher.encrypt(&req.card_number).map_err(ApiError::internal)?;
    let last_four = req.card_number[req.card_number.len() - 4..].to_string();

    let card = bounded(
        state.timeouts.write,
        "card.add",
        state.cards.add_card_to_wallet(NewCard {
            user_id: principal.id,
            wallet_id: wallet.id,
            encrypted_number,
            provider,
            card_type,
            last_four,
            expiry_date,
        }),
    )
    .await?;

    tracing::info!(
        user_uuid = %principal.uuid,
        wallet_uuid = %wallet.uuid,
        card_uuid = %card.uuid,
        provider = provider.as_str(),
        "card added"
    );
    Ok((StatusCode::CREATED, Json(AddCardResponse { card: card.into() })))
}

/// Cards of a wallet, newest first.
///
/// Deleted cards are only listed when `status=deleted` is asked for.
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_uuid}/wallets/{wallet_uuid}/cards",
    tag = "Cards",
    security(("bearer_auth" = [])),
    params(
        ("user_uuid" = Uuid, Path, description = "Owner UUID"),
        ("wallet_uuid" = Uuid, Path, description = "Wallet UUID"),
        CardListQuery,
    ),
    responses(
        (status = 200, description = "Cards", body = CardListResponse),
        (status = 400, description = "Unknown filter value"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Wallet not found"),
    )
)]
pub async fn list_cards(
    State(state): State<AppState>,
    Owner(principal): Owner,
    Path(path): Path<WalletCardsPath>,
    Query(query): Query<CardListQuery>,
) -> Result<Json<CardListResponse>, ApiError> {
    let wallet = owned_wallet(&state, &principal, path.wallet_uuid).await?;
    let filters = parse_filters(query, &principal, &wallet)?;

    let cards = bounded(state.timeouts.read, "card.list", state.cards.list(filters)).await?;
    Ok(Json(CardListResponse {
        cards: cards.into_iter().map(CardResponse::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{user_uuid}/wallets/{wallet_uuid}/cards/{card_uuid}",
    tag = "Cards",
    security(("bearer_auth" = [])),
    params(
        ("user_uuid" = Uuid, Path, description = "Owner UUID"),
        ("wallet_uuid" = Uuid, Path, description = "Wallet UUID"),
        ("card_uuid" = Uuid, Path, description = "Card UUID"),
    ),
    responses(
        (status = 200, description = "Card", body = CardResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Card not found"),
    )
)]
pub async fn get_card(
    State(state): State<AppState>,
    Owner(principal): Owner,
    Path(path): Path<CardPath>,
) -> Result<Json<CardResponse>, ApiError> {
    let card = owned_card(&state, &principal, &path).await?;
    Ok(Json(card.into()))
}

/// Change a card's expiry or status.
///
/// Also reaches soft-deleted cards: setting `status` is how a deleted card
/// is reactivated.
#[utoipa::path(
    patch,
    path = "/api/v1/users/{user_uuid}/wallets/{wallet_uuid}/cards/{card_uuid}",
    tag = "Cards",
    security(("bearer_auth" = [])),
    params(
        ("user_uuid" = Uuid, Path, description = "Owner UUID"),
        ("wallet_uuid" = Uuid, Path, description = "Wallet UUID"),
        ("card_uuid" = Uuid, Path, description = "Card UUID"),
    ),
    request_body = UpdateCardRequest,
    responses(
        (status = 200, description = "Card updated", body = MessageResponse),
        (status = 400, description = "Invalid update"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Card not found"),
    )
)]
pub async fn update_card(
    State(state): State<AppState>,
    Owner(principal): Owner,
    Path(path): Path<CardPath>,
    Json(req): Json<UpdateCardRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let update = parse_update(req, Utc::now())?;
    let wallet = owned_wallet(&state, &principal, path.wallet_uuid).await?;

    let card = bounded(
        state.timeouts.read,
        "card.find",
        state.cards.find_any_status(path.card_uuid),
    )
    .await?;
    let card = check_card(card, &principal, &wallet)?;

    let updated = bounded(
        state.timeouts.write,
        "card.update",
        state.cards.update(card.uuid, update),
    )
    .await?;

    tracing::info!(
        user_uuid = %principal.uuid,
        card_uuid = %updated.uuid,
        from = card.status.as_str(),
        to = updated.status.as_str(),
        "card updated"
    );
    Ok(Json(MessageResponse::new("card updated successfully")))
}

/// Soft delete a card.
#[utoipa::path(
    delete,
    path = "/api/v1/users/{user_uuid}/wallets/{wallet_uuid}/cards/{card_uuid}",
    tag = "Cards",
    security(("bearer_auth" = [])),
    params(
        ("user_uuid" = Uuid, Path, description = "Owner UUID"),
        ("wallet_uuid" = Uuid, Path, description = "Wallet UUID"),
        ("card_uuid" = Uuid, Path, description = "Card UUID"),
    ),
    responses(
        (status = 200, description = "Card deleted", body = MessageResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Card not found"),
    )
)]
pub async fn delete_card(
    State(state): State<AppState>,
    Owner(principal): Owner,
    Path(path): Path<CardPath>,
) -> Result<Json<MessageResponse>, ApiError> {
    let card = owned_card(&state, &principal, &path).await?;
    bounded(state.timeouts.write, "card.delete", state.cards.delete(card.uuid)).await?;

    tracing::info!(user_uuid = %principal.uuid, card_uuid = %card.uuid, "card deleted");
    Ok(Json(MessageResponse::new("card deleted successfully")))
}

/// Decrypt and return the full card number.
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_uuid}/wallets/{wallet_uuid}/cards/{card_uuid}/number",
    tag = "Cards",
    security(("bearer_auth" = [])),
    params(
        ("user_uuid" = Uuid, Path, description = "Owner UUID"),
        ("wallet_uuid" = Uuid, Path, description = "Wallet UUID"),
        ("card_uuid" = Uuid, Path, description = "Card UUID"),
    ),
    responses(
        (status = 200, description = "Card number", body = CardNumberResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Card not found"),
        (status = 500, description = "Stored number could not be decrypted"),
    )
)]
pub async fn reveal_card_number(
    State(state): State<AppState>,
    Owner(principal): Owner,
    Path(path): Path<CardPath>,
) -> Result<Json<CardNumberResponse>, ApiError> {
    let card = owned_card(&state, &principal, &path).await?;
    let card_number = state.cipher.decrypt(&card.encrypted_number).map_err(|e| {
        ApiError::internal(format!("card {} could not be decrypted: {e}", card.uuid))
    })?;

    tracing::info!(user_uuid = %principal.uuid, card_uuid = %card.uuid, "card number revealed");
    Ok(Json(CardNumberResponse { card_number }))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn request() -> AddCardRequest {
        AddCardRequest {
            card_number: "4111111111111111".to_string(),
            provider: "visa".to_string(),
            card_type: "credit".to_string(),
            expiry_date: "12/30".to_string(),
            cvv: "123".to_string(),
        }
    }

    #[test]
    fn accepts_valid_card() {
        let (provider, card_type, expiry) = parse_new_card(&request(), now()).unwrap();
        assert_eq!(provider, CardProvider::Visa);
        assert_eq!(card_type, CardType::Credit);
        assert_eq!(format_expiry(expiry), "12/30");
    }

    #[test]
    fn rejects_bad_numbers() {
        for number in ["4111111111111112", "4111-1111-1111-1111", "411111111111", ""] {
            let mut req = request();
            req.card_number = number.to_string();
            let err = parse_new_card(&req, now()).unwrap_err();
            assert_eq!(err.status, StatusCode::BAD_REQUEST, "{number}");
        }
    }

    #[test]
    fn declared_provider_must_match_number() {
        let mut req = request();
        req.provider = "mastercard".to_string();
        let err = parse_new_card(&req, now()).unwrap_err();
        assert!(err.message.contains("visa"));

        req.card_number = "5555555555554444".to_string();
        assert!(parse_new_card(&req, now()).is_ok());
    }

    #[test]
    fn rejects_bad_cvv_type_and_expiry() {
        let mut req = request();
        req.cvv = "12".to_string();
        assert!(parse_new_card(&req, now()).is_err());

        let mut req = request();
        req.card_type = "prepaid".to_string();
        assert!(parse_new_card(&req, now()).is_err());

        let mut req = request();
        req.expiry_date = "09/26".to_string();
        let err = parse_new_card(&req, now()).unwrap_err();
        assert_eq!(err.message, "card is expired");
    }

    #[test]
    fn update_accepts_only_active_or_inactive() {
        let update = parse_update(
            UpdateCardRequest {
                status: Some("Active".to_string()),
                ..Default::default()
            },
            now(),
        )
        .unwrap();
        assert_eq!(update.status, Some(CardStatus::Active));

        for bad in ["deleted", "frozen"] {
            let req = UpdateCardRequest {
                status: Some(bad.to_string()),
                ..Default::default()
            };
            assert!(parse_update(req, now()).is_err(), "{bad}");
        }
        assert!(parse_update(UpdateCardRequest::default(), now()).is_err());
    }

    #[test]
    fn card_response_omits_number() {
        let at = now();
        let card = Card {
            id: 1,
            uuid: Uuid::new_v4(),
            user_id: 2,
            wallet_id: 3,
            encrypted_number: vec![1, 2, 3],
            provider: CardProvider::Amex,
            card_type: CardType::Debit,
            last_four: "0005".to_string(),
            expiry_date: parse_expiry("01/29", at).unwrap(),
            status: CardStatus::Inactive,
            created_at: at,
            updated_at: at,
        };
        let json = serde_json::to_value(CardResponse::from(card)).unwrap();
        assert_eq!(json["type"], "debit");
        assert_eq!(json["lastFour"], "0005");
        assert_eq!(json["expiryDate"], "01/29");
        assert!(json.get("encryptedNumber").is_none());
    }
}
