pub mod health;
pub mod login;
pub mod logout;
pub mod register;
pub mod session;
pub mod types;

// common functions for the handlers
use axum::{
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use regex::Regex;
use std::net::SocketAddr;
use tracing::error;

use crate::auth::AuthError;
use types::ErrorResponse;

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .is_ok_and(|re| re.is_match(email))
}

#[must_use]
pub fn valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}

/// Client identity for rate limiting.
///
/// The peer address is used unless `trust_proxy_headers` is set, in which
/// case the first `X-Forwarded-For` hop wins, then `X-Real-IP`, then the
/// peer. Without any of them the key is `unknown`.
#[must_use]
pub fn extract_client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy_headers: bool,
) -> String {
    let peer_key = || peer.map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string());

    if !trust_proxy_headers {
        return peer_key();
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(forwarded) = forwarded {
        return forwarded.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(real_ip) = real_ip {
        return real_ip.to_string();
    }

    peer_key()
}

#[must_use]
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

pub fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::StoreUnavailable(ref source) | Self::Internal(ref source) = self {
            error!("{self}: {source:#}");
        }
        error_response(self.status_code(), self.public_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn email_validation() {
        assert!(valid_email("a@x.com"));
        assert!(valid_email("first.last+tag@sub.example.org"));
        assert!(!valid_email("a@x"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("a b@x.com"));
        assert!(!valid_email(""));
    }

    #[test]
    fn password_length() {
        assert!(!valid_password("short"));
        assert!(!valid_password("1234567"));
        assert!(valid_password("12345678"));
    }

    #[test]
    fn extract_client_ip_ignores_headers_unless_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4"));
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        let peer: SocketAddr = ([10, 0, 0, 7], 41000).into();

        assert_eq!(extract_client_ip(&headers, Some(peer), false), "10.0.0.7");
        assert_eq!(extract_client_ip(&headers, None, false), "unknown");
    }

    #[test]
    fn extract_client_ip_prefers_forwarded_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 5.6.7.8"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers, None, true), "1.2.3.4");
    }

    #[test]
    fn extract_client_ip_falls_back_to_real_ip_then_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers, None, true), "9.9.9.9");

        let peer: SocketAddr = ([10, 0, 0, 7], 41000).into();
        assert_eq!(extract_client_ip(&HeaderMap::new(), Some(peer), true), "10.0.0.7");
        assert_eq!(extract_client_ip(&HeaderMap::new(), None, true), "unknown");
    }

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("abc.def.ghi"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_bearer_token(&headers), None);
    }
}
