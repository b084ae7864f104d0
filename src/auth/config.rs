//! Engine configuration.

use secrecy::SecretString;
use std::time::Duration;

use super::lockout::DEFAULT_LOCKOUT_THRESHOLD;
use super::rate_limit::{RateLimitTier, DEFAULT_LENIENT_LIMIT, DEFAULT_STRICT_LIMIT, DEFAULT_WINDOW};
use super::token::DEFAULT_TOKEN_TTL_SECONDS;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    jwt_secret: SecretString,
    token_ttl_seconds: i64,
    lockout_threshold: u32,
    strict_rate_limit: u32,
    lenient_rate_limit: u32,
    rate_limit_window: Duration,
}

impl AuthConfig {
    #[must_use]
    pub fn new(jwt_secret: SecretString) -> Self {
        Self {
            jwt_secret,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            lockout_threshold: DEFAULT_LOCKOUT_THRESHOLD,
            strict_rate_limit: DEFAULT_STRICT_LIMIT,
            lenient_rate_limit: DEFAULT_LENIENT_LIMIT,
            rate_limit_window: DEFAULT_WINDOW,
        }
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_lockout_threshold(mut self, threshold: u32) -> Self {
        self.lockout_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_strict_rate_limit(mut self, limit: u32) -> Self {
        self.strict_rate_limit = limit;
        self
    }

    #[must_use]
    pub fn with_lenient_rate_limit(mut self, limit: u32) -> Self {
        self.lenient_rate_limit = limit;
        self
    }

    #[must_use]
    pub fn with_rate_limit_window(mut self, window: Duration) -> Self {
        self.rate_limit_window = window;
        self
    }

    #[must_use]
    pub fn jwt_secret(&self) -> &SecretString {
        &self.jwt_secret
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    #[must_use]
    pub fn lockout_threshold(&self) -> u32 {
        self.lockout_threshold
    }

    #[must_use]
    pub fn strict_tier(&self) -> RateLimitTier {
        RateLimitTier::new(self.strict_rate_limit, self.rate_limit_window)
    }

    #[must_use]
    pub fn lenient_tier(&self) -> RateLimitTier {
        RateLimitTier::new(self.lenient_rate_limit, self.rate_limit_window)
    }
}
