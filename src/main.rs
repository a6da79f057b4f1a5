// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{fmt::Display, net::SocketAddr, sync::Arc};

use axum::middleware::from_fn_with_state;
use paycore_server::{
    api::router,
    auth::{PermissionResolver, Policy, TokenService},
    config::{AppConfig, TIMEOUTS},
    crypto::CardCipher,
    rate_limit::{ip_rate_limiter, limit_by_ip},
    state::AppState,
    storage::{PgCardRepository, PgUserRepository, PgWalletRepository},
    telemetry::init_tracing,
};
use sqlx::postgres::PgPoolOptions;
use tokio::{signal, sync::oneshot};

/// Startup failures abort the process.
fn fatal(context: &str, err: impl Display) -> ! {
    tracing::error!(error = %err, "{context}");
    std::process::exit(1)
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = AppConfig::from_env().unwrap_or_else(|e| fatal("invalid configuration", e));
    tracing::info!(?config, "starting paycore server");

    // Key material and policy are checked before anything touches the network.
    let tokens = TokenService::from_pem(
        &config.jwt_private_pem,
        &config.jwt_public_pem,
        config.jwt_ttl_secs,
    )
    .unwrap_or_else(|e| fatal("failed to load token signing keys", e));
    let cipher =
        CardCipher::new(&config.card_key).unwrap_or_else(|e| fatal("failed to build card cipher", e));
    let policy = Policy::load(config.policy_path.as_deref())
        .unwrap_or_else(|e| fatal("failed to load access policy", e));
    let permissions =
        PermissionResolver::new(&policy).unwrap_or_else(|e| fatal("invalid access policy", e));
    tracing::info!(card_key_bits = cipher.key_bits(), "crypto initialised");

    let pool = tokio::time::timeout(TIMEOUTS.startup, async {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(config.db_acquire_timeout)
            .connect(&config.database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok::<_, Box<dyn std::error::Error + Send + Sync>>(pool)
    })
    .await
    .unwrap_or_else(|_| fatal("database startup", "timed out"))
    .unwrap_or_else(|e| fatal("database startup failed", e));
    tracing::info!("database connected and migrated");

    let state = AppState::new(
        Arc::new(PgUserRepository::new(pool.clone())),
        Arc::new(PgWalletRepository::new(pool.clone())),
        Arc::new(PgCardRepository::new(pool.clone())),
        tokens,
        permissions,
        cipher,
    );
    let limiter = ip_rate_limiter(
        config.rate_limit_per_second,
        config.rate_limit_burst,
        config.trusted_proxy_hops,
    );
    let app = router(state).layer(from_fn_with_state(limiter, limit_by_ip));

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .unwrap_or_else(|e| fatal("failed to bind listener", e));
    let addr = listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| config.bind_addr());
    tracing::info!(address = %addr, "listening (docs at /docs)");

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = stop_rx.await;
        })
        .await
    });

    tokio::select! {
        _ = shutdown_signal() => {
            let _ = stop_tx.send(());
            match tokio::time::timeout(TIMEOUTS.shutdown, &mut server).await {
                Ok(Ok(Ok(()))) => tracing::info!("in-flight requests drained"),
                Ok(Ok(Err(e))) => tracing::error!(error = %e, "server error during shutdown"),
                Ok(Err(e)) => tracing::error!(error = %e, "server task failed"),
                Err(_) => {
                    tracing::warn!(
                        timeout_secs = TIMEOUTS.shutdown.as_secs(),
                        "drain window elapsed, aborting remaining requests"
                    );
                    server.abort();
                }
            }
        }
        result = &mut server => {
            match result {
                Ok(Ok(())) => tracing::warn!("server stopped unexpectedly"),
                Ok(Err(e)) => tracing::error!(error = %e, "server failed"),
                Err(e) => tracing::error!(error = %e, "server task failed"),
            }
        }
    }

    pool.close().await;
    tracing::info!("shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("received SIGTERM, starting graceful shutdown"),
    }
}
