// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! End-to-end flows through the full router backed by in-memory storage.

mod common;

use axum::http::{Method, StatusCode};
use paycore_server::auth::Role;
use serde_json::json;

use common::{TestApp, MASTERCARD, PASSWORD, VISA};

#[tokio::test]
async fn register_login_and_me() {
    let app = TestApp::new();
    let session = app.register("ada@example.com").await;

    let (status, body) = app
        .send(Method::GET, "/api/v1/users/me", Some(&session.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["role"], "user");
    assert!(body.get("id").is_none());

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/login",
            None,
            Some(json!({ "email": "ADA@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tokenType"], "Bearer");
    assert!(body["accessToken"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = TestApp::new();
    app.register("grace@example.com").await;

    let (wrong_status, wrong_body) = app
        .send(
            Method::POST,
            "/api/v1/login",
            None,
            Some(json!({ "email": "grace@example.com", "password": "not the password" })),
        )
        .await;
    let (unknown_status, unknown_body) = app
        .send(
            Method::POST,
            "/api/v1/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": PASSWORD })),
        )
        .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
}

async fn failed_logins(app: &TestApp, email: &str) -> std::time::Duration {
    let started = std::time::Instant::now();
    for _ in 0..3 {
        let (status, _) = app
            .send(
                Method::POST,
                "/api/v1/login",
                None,
                Some(json!({ "email": email, "password": "not the password" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    started.elapsed()
}

#[tokio::test]
async fn unknown_email_login_costs_a_password_verification() {
    let app = TestApp::new();
    app.register("hedy@example.com").await;

    let unknown = failed_logins(&app, "nobody@example.com").await;
    let wrong = failed_logins(&app, "hedy@example.com").await;
    assert!(
        unknown * 4 >= wrong,
        "unknown email {unknown:?} vs wrong password {wrong:?}"
    );
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = TestApp::new();
    app.register("linus@example.com").await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/register",
            None,
            Some(json!({
                "fullName": "Someone Else",
                "email": "linus@example.com",
                "password": PASSWORD,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn gate_rejects_missing_and_forged_tokens() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/v1/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "missing_auth_header");

    // Signed by a different key.
    let (private_pem, public_pem) = common::key_pair(9);
    let other = paycore_server::auth::TokenService::from_pem(
        private_pem.as_bytes(),
        public_pem.as_bytes(),
        1800,
    )
    .unwrap();
    let session = app.register("mallory@example.com").await;
    let forged = other.issue(&session.uuid.to_string()).unwrap();

    let (status, body) = app
        .send(Method::GET, "/api/v1/users/me", Some(&forged), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "invalid_token");
}

#[tokio::test]
async fn public_routes_bypass_the_gate() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/v1/ping", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "pong");

    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["database"], "ok");
}

#[tokio::test]
async fn role_elevation_rules() {
    let app = TestApp::new();
    let user = app.register("plain@example.com").await;
    let agent = app.seed("agent@example.com", Role::Agent).await;
    let admin = app.seed("admin@example.com", Role::Admin).await;

    let new_user = |email: &str, role: &str| {
        json!({
            "fullName": "Created Person",
            "email": email,
            "password": PASSWORD,
            "role": role,
        })
    };

    // Users have no CreateUserWithRole grant at all.
    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/users",
            Some(&user.token),
            Some(new_user("u1@example.com", "user")),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error_code"], "insufficient_permissions");

    // Agents may create merchants but not admins.
    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/users",
            Some(&agent.token),
            Some(new_user("m1@example.com", "merchant")),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "merchant");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/users",
            Some(&agent.token),
            Some(new_user("a1@example.com", "admin")),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/users",
            Some(&admin.token),
            Some(new_user("a2@example.com", "admin")),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn agent_cannot_create_wallets() {
    let app = TestApp::new();
    let agent = app.seed("agent@example.com", Role::Agent).await;

    let (status, body) = app.create_wallet(&agent, "USD").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error_code"], "insufficient_permissions");
}

#[tokio::test]
async fn peers_cannot_touch_each_others_wallets() {
    let app = TestApp::new();
    let alice = app.register("alice@example.com").await;
    let bob = app.register("bob@example.com").await;
    let alice_wallet = app.wallet(&alice, "USD").await;

    // Bob names Alice in the path.
    let (status, body) = app.create_wallet(
        &common::Session {
            uuid: alice.uuid,
            token: bob.token.clone(),
        },
        "EUR",
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error_code"], "not_owner");

    // Bob names himself in the path but Alice's wallet.
    let (status, _) = app
        .send(
            Method::GET,
            &format!("/api/v1/users/{}/wallets/{alice_wallet}/balance", bob.uuid),
            Some(&bob.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/users/{}/wallets/{alice_wallet}/balance", alice.uuid),
            Some(&alice.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balanceInCents"], 0);
    assert_eq!(body["currency"], "USD");
}

#[tokio::test]
async fn inactive_wallet_has_no_balance() {
    let app = TestApp::new();
    let alice = app.register("alice@example.com").await;
    let wallet = app.wallet(&alice, "GBP").await;
    let base = format!("/api/v1/users/{}/wallets/{wallet}", alice.uuid);

    let (status, _) = app
        .send(
            Method::PATCH,
            &format!("{base}/status"),
            Some(&alice.token),
            Some(json!({ "status": "inactive" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(Method::GET, &format!("{base}/balance"), Some(&alice.token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(
            Method::PATCH,
            &format!("{base}/status"),
            Some(&alice.token),
            Some(json!({ "status": "frozen" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn concurrent_wallet_creation_yields_one_conflict() {
    let app = TestApp::new();
    let alice = app.register("alice@example.com").await;

    let ((a, _), (b, _)) = tokio::join!(
        app.create_wallet(&alice, "EUR"),
        app.create_wallet(&alice, "EUR")
    );
    let mut statuses = [a, b];
    statuses.sort_by_key(|s| s.as_u16());
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::CONFLICT]);

    // A different currency is a different wallet.
    let (status, _) = app.create_wallet(&alice, "USD").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn concurrent_card_creation_yields_one_conflict() {
    let app = TestApp::new();
    let alice = app.register("alice@example.com").await;
    let wallet = app.wallet(&alice, "USD").await;

    let ((a, _), (b, _)) = tokio::join!(
        app.add_card(&alice, wallet, VISA, "visa"),
        app.add_card(&alice, wallet, VISA, "visa")
    );
    let mut statuses = [a, b];
    statuses.sort_by_key(|s| s.as_u16());
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::CONFLICT]);
}

#[tokio::test]
async fn card_lifecycle_with_soft_delete() {
    let app = TestApp::new();
    let alice = app.register("alice@example.com").await;
    let wallet = app.wallet(&alice, "USD").await;
    let cards = app.cards_uri(&alice, wallet);

    let (status, body) = app.add_card(&alice, wallet, VISA, "visa").await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["card"]["lastFour"], "1111");
    assert_eq!(body["card"]["expiryDate"], "12/49");
    assert!(body["card"].get("cardNumber").is_none());
    let card = body["card"]["uuid"].as_str().unwrap().to_string();
    let card_uri = format!("{cards}/{card}");

    let (status, body) = app
        .send(Method::GET, &format!("{card_uri}/number"), Some(&alice.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cardNumber"], VISA);

    let (status, _) = app
        .send(Method::DELETE, &card_uri, Some(&alice.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    // Hidden from the default listing and from direct reads.
    let (_, body) = app.send(Method::GET, &cards, Some(&alice.token), None).await;
    assert_eq!(body["cards"].as_array().unwrap().len(), 0);
    let (status, _) = app.send(Method::GET, &card_uri, Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Listed when asked for explicitly.
    let (_, body) = app
        .send(Method::GET, &format!("{cards}?status=deleted"), Some(&alice.token), None)
        .await;
    assert_eq!(body["cards"].as_array().unwrap().len(), 1);

    // Re-adding is refused with a reactivation hint.
    let (status, body) = app.add_card(&alice, wallet, VISA, "visa").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("deleted"));

    // Reactivation goes through update.
    let (status, _) = app
        .send(
            Method::PATCH,
            &card_uri,
            Some(&alice.token),
            Some(json!({ "status": "active" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.send(Method::GET, &cards, Some(&alice.token), None).await;
    assert_eq!(body["cards"][0]["status"], "active");
}

#[tokio::test]
async fn card_validation_and_filters() {
    let app = TestApp::new();
    let alice = app.register("alice@example.com").await;
    let wallet = app.wallet(&alice, "USD").await;
    let cards = app.cards_uri(&alice, wallet);

    // Declared provider disagrees with the number.
    let (status, _) = app.add_card(&alice, wallet, VISA, "mastercard").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    // Fails the checksum.
    let (status, _) = app.add_card(&alice, wallet, "4111111111111112", "visa").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.add_card(&alice, wallet, VISA, "visa").await;
    app.add_card(&alice, wallet, MASTERCARD, "mastercard").await;

    let (_, body) = app
        .send(Method::GET, &format!("{cards}?provider=mastercard"), Some(&alice.token), None)
        .await;
    let listed = body["cards"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["lastFour"], "4444");

    let (status, _) = app
        .send(Method::GET, &format!("{cards}?provider=discover"), Some(&alice.token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn card_under_another_wallet_reads_as_not_found() {
    let app = TestApp::new();
    let alice = app.register("alice@example.com").await;
    let usd = app.wallet(&alice, "USD").await;
    let eur = app.wallet(&alice, "EUR").await;

    let (_, body) = app.add_card(&alice, usd, VISA, "visa").await;
    let card = body["card"]["uuid"].as_str().unwrap();

    let (status, _) = app
        .send(
            Method::GET,
            &format!("{}/{card}", app.cards_uri(&alice, eur)),
            Some(&alice.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn agent_reads_but_cannot_reveal_or_add_cards() {
    let app = TestApp::new();
    let agent = app.seed("agent@example.com", Role::Agent).await;
    let fake_wallet = uuid::Uuid::new_v4();
    let cards = app.cards_uri(&agent, fake_wallet);

    let (status, _) = app.add_card(&agent, fake_wallet, VISA, "visa").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            Method::GET,
            &format!("{cards}/{}/number", uuid::Uuid::new_v4()),
            Some(&agent.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Permitted by policy; the wallet simply does not exist.
    let (status, _) = app.send(Method::GET, &cards, Some(&agent.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = TestApp::new();
    let response = tower::ServiceExt::oneshot(
        app.router.clone(),
        axum::http::Request::builder()
            .uri("/api/v1/ping")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}
