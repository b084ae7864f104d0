//! Outcome taxonomy for the authentication engine.

use axum::http::StatusCode;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown email or wrong password; the two are never distinguished.
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("account is locked due to too many failed attempts")]
    AccountLocked,
    #[error("email already registered")]
    DuplicateEmail,
    #[error("invalid token")]
    TokenMalformed,
    #[error("token has expired")]
    TokenExpired,
    #[error("invalid token")]
    SessionRevokedOrUnknown,
    #[error("too many requests")]
    RateLimitExceeded,
    #[error("store unavailable")]
    StoreUnavailable(#[source] anyhow::Error),
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl AuthError {
    /// Recommended transport status for this outcome.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials
            | Self::TokenMalformed
            | Self::TokenExpired
            | Self::SessionRevokedOrUnknown => StatusCode::UNAUTHORIZED,
            Self::AccountLocked => StatusCode::FORBIDDEN,
            Self::DuplicateEmail => StatusCode::CONFLICT,
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::StoreUnavailable(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to a client.
    ///
    /// Every token failure collapses into the same text so callers cannot
    /// tell malformed, expired, revoked and unknown tokens apart.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Invalid email or password",
            Self::AccountLocked => "Account is locked due to too many failed attempts",
            Self::DuplicateEmail => "Email already registered",
            Self::TokenMalformed | Self::TokenExpired | Self::SessionRevokedOrUnknown => {
                "Invalid token"
            }
            Self::RateLimitExceeded => "Too many requests",
            Self::StoreUnavailable(_) | Self::Internal(_) => "Internal server error",
        }
    }

    /// True for policy outcomes, false for infrastructure failures.
    #[must_use]
    pub fn is_policy(&self) -> bool {
        !matches!(self, Self::StoreUnavailable(_) | Self::Internal(_))
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => Self::DuplicateEmail,
            StoreError::Unavailable(source) => Self::StoreUnavailable(source),
            // Session-level outcomes are interpreted by the registry; reaching here is a bug.
            other @ (StoreError::DuplicateSession | StoreError::SessionNotFound) => {
                Self::Internal(anyhow::Error::new(other))
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
