//! Server-side liveness records that make bearer tokens revocable.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use super::error::AuthError;
use crate::store::{SessionRecord, SessionStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session already exists")]
    DuplicateSession,
    #[error("session not found")]
    SessionNotFound,
    #[error("store unavailable")]
    StoreUnavailable(#[source] anyhow::Error),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateSession => Self::DuplicateSession,
            StoreError::SessionNotFound => Self::SessionNotFound,
            StoreError::Unavailable(source) => Self::StoreUnavailable(source),
            other @ StoreError::DuplicateEmail => Self::StoreUnavailable(anyhow::Error::new(other)),
        }
    }
}

impl From<SessionError> for AuthError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::SessionNotFound => Self::SessionRevokedOrUnknown,
            SessionError::StoreUnavailable(source) => Self::StoreUnavailable(source),
            SessionError::DuplicateSession => Self::Internal(anyhow::Error::new(err)),
        }
    }
}

#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Insert a liveness record for a freshly issued token.
    ///
    /// # Errors
    /// `DuplicateSession` if `token_id` is already registered; the existing
    /// record is left untouched.
    pub async fn create(
        &self,
        account_id: Uuid,
        token_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, SessionError> {
        let record = self
            .store
            .create_session(account_id, token_id, expires_at)
            .await
            .map_err(|err| {
                let err = SessionError::from(err);
                if matches!(err, SessionError::DuplicateSession) {
                    error!(%account_id, "token id collision while creating session");
                }
                err
            })?;
        debug!(%account_id, %expires_at, "session created");
        Ok(record)
    }

    /// Mark the session revoked. Revoking an already revoked session succeeds.
    ///
    /// # Errors
    /// `SessionNotFound` only when no session with `token_id` ever existed.
    pub async fn revoke(&self, token_id: &str) -> Result<(), SessionError> {
        self.store.revoke_session(token_id).await?;
        debug!("session revoked");
        Ok(())
    }

    /// # Errors
    /// `StoreUnavailable` when the store cannot answer.
    pub async fn is_valid(&self, token_id: &str) -> Result<bool, SessionError> {
        self.is_valid_at(token_id, Utc::now()).await
    }

    /// True iff the session exists, is not revoked and `now < expires_at`.
    /// Unknown, revoked and expired all read as `false`.
    ///
    /// # Errors
    /// `StoreUnavailable` when the store cannot answer.
    pub async fn is_valid_at(
        &self,
        token_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, SessionError> {
        let record = self.store.find_session(token_id).await?;
        Ok(record.is_some_and(|record| record.is_live_at(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use anyhow::Result;
    use chrono::Duration;

    fn registry() -> (Arc<MemoryStore>, SessionRegistry) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), SessionRegistry::new(store))
    }

    #[tokio::test]
    async fn created_session_is_valid_until_expiry() -> Result<()> {
        let (_store, registry) = registry();
        let now = Utc::now();
        let expires_at = now + Duration::minutes(5);
        registry.create(Uuid::new_v4(), "jti", expires_at).await?;

        assert!(registry.is_valid_at("jti", now).await?);
        assert!(!registry.is_valid_at("jti", expires_at).await?);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_session_is_invalid_not_error() -> Result<()> {
        let (_store, registry) = registry();
        assert!(!registry.is_valid("never-issued").await?);
        Ok(())
    }

    #[tokio::test]
    async fn revoked_session_is_invalid_and_revoke_is_idempotent() -> Result<()> {
        let (_store, registry) = registry();
        registry
            .create(Uuid::new_v4(), "jti", Utc::now() + Duration::hours(1))
            .await?;

        registry.revoke("jti").await?;
        assert!(!registry.is_valid("jti").await?);
        registry.revoke("jti").await?;
        assert!(!registry.is_valid("jti").await?);
        Ok(())
    }

    #[tokio::test]
    async fn revoking_unknown_session_is_not_found() {
        let (_store, registry) = registry();
        assert!(matches!(
            registry.revoke("never-issued").await,
            Err(SessionError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn duplicate_token_id_is_reported() -> Result<()> {
        let (_store, registry) = registry();
        let expires_at = Utc::now() + Duration::hours(1);
        registry.create(Uuid::new_v4(), "jti", expires_at).await?;
        assert!(matches!(
            registry.create(Uuid::new_v4(), "jti", expires_at).await,
            Err(SessionError::DuplicateSession)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn store_failure_is_not_a_negative_answer() -> Result<()> {
        let (store, registry) = registry();
        registry
            .create(Uuid::new_v4(), "jti", Utc::now() + Duration::hours(1))
            .await?;
        store.set_unavailable(true);
        assert!(matches!(
            registry.is_valid("jti").await,
            Err(SessionError::StoreUnavailable(_))
        ));
        Ok(())
    }

    #[test]
    fn session_errors_map_to_auth_errors() {
        assert!(matches!(
            AuthError::from(SessionError::SessionNotFound),
            AuthError::SessionRevokedOrUnknown
        ));
        assert!(matches!(
            AuthError::from(SessionError::DuplicateSession),
            AuthError::Internal(_)
        ));
    }
}
