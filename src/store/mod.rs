//! Persistence contracts for accounts and sessions.
//!
//! The engine only talks to these traits. `postgres` is the durable
//! implementation used by the server; `memory` backs the tests and can run
//! the engine without a database.
//!
//! Implementations must keep the lockout update atomic: the failed-attempt
//! counter and the `active` flag change in one step, and a locked account
//! never has its counter moved by a racing failure.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("session already exists")]
    DuplicateSession,
    #[error("session not found")]
    SessionNotFound,
    #[error("store unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub failed_attempts: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Counter state right after an atomic failure increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureCount {
    pub count: i32,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub token_id: String,
    pub account_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl SessionRecord {
    /// Live means not revoked and strictly before expiry.
    #[must_use]
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now < self.expires_at
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn create_account(&self, email: &str, password_hash: &str) -> StoreResult<Account>;

    async fn get_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    /// Increment the failure counter and clear `active` once the new count
    /// reaches `threshold`, as one atomic operation.
    ///
    /// An account that is already inactive is left untouched and reported
    /// with its current counter.
    async fn increment_failures(&self, account_id: Uuid, threshold: i32)
        -> StoreResult<FailureCount>;

    /// Zero the failure counter and stamp `last_login`, only while the
    /// account is still active. Returns `false` when the account was locked.
    async fn reset_failures_and_stamp_login(&self, account_id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(
        &self,
        account_id: Uuid,
        token_id: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<SessionRecord>;

    /// Mark a session revoked. Revoking twice is not an error; only a
    /// `token_id` that never existed yields `SessionNotFound`.
    async fn revoke_session(&self, token_id: &str) -> StoreResult<()>;

    async fn find_session(&self, token_id: &str) -> StoreResult<Option<SessionRecord>>;
}

/// Liveness check used by `/health`.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;
}
