// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::future::Future;
use std::time::Duration;

use axum::{
    http::HeaderName,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi, ToSchema,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{authorize, Principal, Role},
    crypto::CardProvider,
    error::ApiError,
    state::AppState,
    storage::{CardStatus, CardType, Currency, StorageResult, Wallet, WalletBalance, WalletStatus},
};

pub mod auth;
pub mod cards;
pub mod health;
pub mod users;
pub mod validation;
pub mod wallets;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Plain confirmation body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Run a repository call under a deadline.
///
/// On timeout the future is dropped, which drops any open transaction and
/// rolls it back.
pub(crate) async fn bounded<T, F>(
    limit: Duration,
    operation: &'static str,
    future: F,
) -> Result<T, ApiError>
where
    F: Future<Output = StorageResult<T>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(_) => Err(ApiError::timeout(operation)),
    }
}

/// Run CPU-bound work off the async workers under a deadline.
///
/// A timed-out task keeps running to completion on the blocking pool; only
/// the response stops waiting for it.
pub(crate) async fn blocking<T, F>(
    limit: Duration,
    operation: &'static str,
    work: F,
) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(work)).await {
        Ok(joined) => joined.map_err(ApiError::internal),
        Err(_) => Err(ApiError::timeout(operation)),
    }
}

/// Build the application router.
///
/// Protected routes are registered with full paths (no nesting) so the
/// gate sees the same path the policy templates describe.
pub fn router(state: AppState) -> Router {
    const WALLETS: &str = "/api/v1/users/{user_uuid}/wallets";
    const WALLET: &str = "/api/v1/users/{user_uuid}/wallets/{wallet_uuid}";
    const CARDS: &str = "/api/v1/users/{user_uuid}/wallets/{wallet_uuid}/cards";
    const CARD: &str = "/api/v1/users/{user_uuid}/wallets/{wallet_uuid}/cards/{card_uuid}";

    let protected = Router::new()
        .route("/api/v1/users", post(users::create_user_with_role))
        .route("/api/v1/users/me", get(users::get_current_user))
        .route(WALLETS, post(wallets::create_wallet))
        .route(&format!("{WALLET}/balance"), get(wallets::get_wallet_balance))
        .route(&format!("{WALLET}/status"), patch(wallets::update_wallet_status))
        .route(CARDS, post(cards::add_card).get(cards::list_cards))
        .route(
            CARD,
            get(cards::get_card)
                .patch(cards::update_card)
                .delete(cards::delete_card),
        )
        .route(&format!("{CARD}/number"), get(cards::reveal_card_number))
        .route_layer(from_fn_with_state(state.clone(), authorize));

    let public = Router::new()
        .route("/api/v1/register", post(auth::register))
        .route("/api/v1/login", post(auth::login))
        .route("/api/v1/ping", get(health::ping))
        .route("/health", get(health::health));

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .merge(protected)
        .merge(public)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register,
        auth::login,
        users::create_user_with_role,
        users::get_current_user,
        wallets::create_wallet,
        wallets::get_wallet_balance,
        wallets::update_wallet_status,
        cards::add_card,
        cards::list_cards,
        cards::get_card,
        cards::update_card,
        cards::delete_card,
        cards::reveal_card_number,
        health::ping,
        health::health
    ),
    components(
        schemas(
            MessageResponse,
            Principal,
            Role,
            Wallet,
            WalletBalance,
            WalletStatus,
            Currency,
            CardProvider,
            CardStatus,
            CardType,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::TokenResponse,
            users::CreateUserRequest,
            users::UserResponse,
            wallets::CreateWalletRequest,
            wallets::CreateWalletResponse,
            wallets::UpdateWalletStatusRequest,
            cards::AddCardRequest,
            cards::UpdateCardRequest,
            cards::CardResponse,
            cards::AddCardResponse,
            cards::CardListResponse,
            cards::CardNumberResponse,
            health::ReadyResponse,
            health::HealthChecks
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Auth", description = "Registration and login"),
        (name = "Users", description = "Principal management"),
        (name = "Wallets", description = "Wallet management"),
        (name = "Cards", description = "Payment cards attached to wallets"),
        (name = "Health", description = "Liveness and readiness")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::storage::StorageError;

    #[tokio::test]
    async fn bounded_maps_timeout_to_504() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, StorageError>(())
        };
        let err = bounded(Duration::from_millis(10), "test.slow", slow)
            .await
            .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn bounded_passes_storage_errors_through() {
        let err = bounded(Duration::from_secs(1), "test.conflict", async {
            Err::<(), _>(StorageError::Conflict("taken".to_string()))
        })
        .await
        .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::CONFLICT);
        assert_eq!(err.message, "taken");
    }

    #[tokio::test]
    async fn blocking_work_has_a_deadline() {
        let err = blocking(Duration::from_millis(10), "test.hash", || {
            std::thread::sleep(Duration::from_millis(200));
        })
        .await
        .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::GATEWAY_TIMEOUT);

        let value = blocking(Duration::from_secs(1), "test.fast", || 7).await.unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn openapi_lists_protected_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths
            .iter()
            .any(|p| p.as_str() == "/api/v1/users/{user_uuid}/wallets/{wallet_uuid}/cards"));
        assert!(doc
            .components
            .as_ref()
            .is_some_and(|c| c.security_schemes.contains_key("bearer_auth")));
    }
}
