//! Per-tier rate limiting middleware.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{net::SocketAddr, sync::Arc};
use tracing::info;

use super::handlers::extract_client_ip;
use crate::auth::{AuthError, RateLimitDecision, RateLimiter};

/// Middleware state: one tier plus how to identify the client.
#[derive(Clone)]
pub struct ClientRateLimit {
    limiter: Arc<dyn RateLimiter>,
    trust_proxy_headers: bool,
}

impl ClientRateLimit {
    #[must_use]
    pub fn new(limiter: Arc<dyn RateLimiter>, trust_proxy_headers: bool) -> Self {
        Self {
            limiter,
            trust_proxy_headers,
        }
    }
}

/// Reject the request with 429 when the client key is over budget.
pub async fn enforce(
    State(state): State<ClientRateLimit>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = extract_client_ip(request.headers(), peer, state.trust_proxy_headers);

    if state.limiter.check(&client) == RateLimitDecision::Limited {
        info!(%client, path = %request.uri().path(), "rate limited");
        return AuthError::RateLimitExceeded.into_response();
    }

    next.run(request).await
}
