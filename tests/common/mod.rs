// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use p256::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use paycore_server::{
    api::router,
    auth::{password::hash_password, PermissionResolver, Policy, Role, TokenService},
    crypto::CardCipher,
    state::AppState,
    storage::NewUser,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "correct horse battery";
pub const VISA: &str = "4111111111111111";
pub const MASTERCARD: &str = "5555555555554444";

/// PEM key pair derived from a fixed scalar.
pub fn key_pair(seed: u8) -> (String, String) {
    let secret = p256::SecretKey::from_slice(&[seed; 32]).unwrap();
    let private_pem = secret.to_pkcs8_pem(LineEnding::LF).unwrap().as_str().to_owned();
    let public_pem = secret.public_key().to_public_key_pem(LineEnding::LF).unwrap();
    (private_pem, public_pem)
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub struct Session {
    pub uuid: Uuid,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        let (private_pem, public_pem) = key_pair(3);
        let tokens =
            TokenService::from_pem(private_pem.as_bytes(), public_pem.as_bytes(), 1800).unwrap();
        let policy = Policy::embedded().unwrap();
        let state = AppState::in_memory(
            tokens,
            PermissionResolver::new(&policy).unwrap(),
            CardCipher::new(&[42u8; 32]).unwrap(),
        );
        Self {
            router: router(state.clone()),
            state,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Register through the public endpoint.
    pub async fn register(&self, email: &str) -> Session {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/register",
                None,
                Some(serde_json::json!({
                    "fullName": "Test Person",
                    "email": email,
                    "password": PASSWORD,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        Session {
            uuid: body["user"]["uuid"].as_str().unwrap().parse().unwrap(),
            token: body["accessToken"].as_str().unwrap().to_string(),
        }
    }

    /// Seed a principal with any role straight into the repository.
    pub async fn seed(&self, email: &str, role: Role) -> Session {
        let user = self
            .state
            .users
            .create(NewUser {
                full_name: "Seeded Person".to_string(),
                email: email.to_string(),
                password_hash: hash_password(PASSWORD).unwrap(),
                role,
            })
            .await
            .unwrap();
        Session {
            uuid: user.uuid,
            token: self.state.tokens.issue(&user.uuid.to_string()).unwrap(),
        }
    }

    pub async fn create_wallet(&self, who: &Session, currency: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            &format!("/api/v1/users/{}/wallets", who.uuid),
            Some(&who.token),
            Some(serde_json::json!({ "currency": currency })),
        )
        .await
    }

    pub async fn wallet(&self, who: &Session, currency: &str) -> Uuid {
        let (status, body) = self.create_wallet(who, currency).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["wallet"]["uuid"].as_str().unwrap().parse().unwrap()
    }

    pub fn cards_uri(&self, who: &Session, wallet: Uuid) -> String {
        format!("/api/v1/users/{}/wallets/{wallet}/cards", who.uuid)
    }

    pub async fn add_card(
        &self,
        who: &Session,
        wallet: Uuid,
        number: &str,
        provider: &str,
    ) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            &self.cards_uri(who, wallet),
            Some(&who.token),
            Some(serde_json::json!({
                "cardNumber": number,
                "provider": provider,
                "type": "credit",
                "expiryDate": "12/49",
                "cvv": "123",
            })),
        )
        .await
    }
}
