// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-IP rate limiting.
//!
//! State for an address is created on first sight in a concurrent
//! dashmap-backed store. Callers are keyed by the connection peer.
//! `x-forwarded-for` is read only when the service sits behind a known
//! number of trusted proxies; the client is then the hop that many entries
//! from the right, which the caller cannot forge.

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};

use crate::error::ApiError;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

type KeyedLimiter = RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>;

/// Keyed limiter plus how far to trust `x-forwarded-for`.
#[derive(Clone)]
pub struct IpRateLimiter {
    limiter: Arc<KeyedLimiter>,
    /// Reverse proxies in front of the service; 0 ignores the header.
    trusted_proxy_hops: usize,
}

/// Build a limiter replenishing `per_second` cells with bursts of `burst`.
pub fn ip_rate_limiter(per_second: u32, burst: u32, trusted_proxy_hops: usize) -> IpRateLimiter {
    let per_second = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst).unwrap_or(per_second);
    IpRateLimiter {
        limiter: Arc::new(RateLimiter::dashmap(
            Quota::per_second(per_second).allow_burst(burst),
        )),
        trusted_proxy_hops,
    }
}

/// Middleware rejecting callers over quota with `429`.
pub async fn limit_by_ip(
    State(limiter): State<IpRateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let Some(ip) = client_ip(&request, limiter.trusted_proxy_hops) else {
        tracing::warn!("could not determine client IP for rate limiting");
        return next.run(request).await;
    };

    match limiter.limiter.check_key(&ip) {
        Ok(()) => next.run(request).await,
        Err(negative) => {
            let wait = negative.wait_time_from(DefaultClock::default().now());
            tracing::debug!(%ip, wait_ms = wait.as_millis() as u64, "rate limit exceeded");
            let mut response =
                ApiError::new(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response();
            if let Ok(value) = HeaderValue::from_str(&wait.as_secs().max(1).to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
            response
        }
    }
}

fn client_ip(request: &Request, trusted_proxy_hops: usize) -> Option<IpAddr> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    if trusted_proxy_hops == 0 {
        return peer;
    }
    forwarded_ip(request.headers(), trusted_proxy_hops).or(peer)
}

/// The entry `trusted_proxy_hops` positions from the right of the combined
/// `x-forwarded-for` list. Entries further left are client supplied.
fn forwarded_ip(headers: &HeaderMap, trusted_proxy_hops: usize) -> Option<IpAddr> {
    let hops: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .collect();
    let index = hops.len().checked_sub(trusted_proxy_hops)?;
    hops.get(index)?.parse().ok()
}
