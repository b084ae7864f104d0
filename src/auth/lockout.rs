//! Consecutive-failure lockout.
//!
//! Per account: `Active(n)` for `n < threshold` failures, `Locked` once the
//! threshold-th failure lands. A success while active resets to `Active(0)`.
//! `Locked` is terminal here; unlocking is an administrative action outside
//! this engine.

use tracing::{info, warn};
use uuid::Uuid;

use super::error::Result;
use crate::store::{Account, AccountStore};

pub const DEFAULT_LOCKOUT_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Active(u32),
    Locked,
}

impl LockState {
    /// Current state of a stored account.
    #[must_use]
    pub fn of(account: &Account, threshold: u32) -> Self {
        let failures = u32::try_from(account.failed_attempts).unwrap_or(0);
        if !account.active || failures >= threshold {
            Self::Locked
        } else {
            Self::Active(failures)
        }
    }

    #[must_use]
    pub fn is_locked(self) -> bool {
        matches!(self, Self::Locked)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    threshold: u32,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_LOCKOUT_THRESHOLD)
    }
}

impl LockoutPolicy {
    /// A zero threshold would lock accounts that never failed; it is clamped to one.
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
        }
    }

    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    #[must_use]
    pub fn state_of(&self, account: &Account) -> LockState {
        LockState::of(account, self.threshold)
    }

    /// Count one failed verification against the account.
    ///
    /// The increment and the lock flip happen in a single store operation.
    ///
    /// # Errors
    /// Returns `AuthError::StoreUnavailable` when the store cannot be reached.
    pub async fn record_failure(
        &self,
        store: &dyn AccountStore,
        account_id: Uuid,
    ) -> Result<LockState> {
        let threshold = i32::try_from(self.threshold).unwrap_or(i32::MAX);
        let count = store.increment_failures(account_id, threshold).await?;

        if count.active {
            let failures = u32::try_from(count.count).unwrap_or(0);
            info!(%account_id, failures, "failed login attempt recorded");
            Ok(LockState::Active(failures))
        } else {
            warn!(%account_id, failures = count.count, "account locked");
            Ok(LockState::Locked)
        }
    }

    /// Reset the failure counter and stamp the last login.
    ///
    /// Reports `Locked` without touching the account if a racing failure
    /// locked it after the password was checked.
    ///
    /// # Errors
    /// Returns `AuthError::StoreUnavailable` when the store cannot be reached.
    pub async fn record_success(
        &self,
        store: &dyn AccountStore,
        account_id: Uuid,
    ) -> Result<LockState> {
        if store.reset_failures_and_stamp_login(account_id).await? {
            Ok(LockState::Active(0))
        } else {
            warn!(%account_id, "successful verification on a locked account");
            Ok(LockState::Locked)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use anyhow::{Context, Result};
    use std::sync::Arc;

    #[test]
    fn state_of_stored_account() {
        let mut account = Account {
            id: Uuid::nil(),
            email: "a@x.com".to_string(),
            password_hash: String::new(),
            failed_attempts: 3,
            active: true,
            created_at: chrono::Utc::now(),
            last_login: None,
        };
        assert_eq!(LockState::of(&account, 5), LockState::Active(3));

        account.active = false;
        assert_eq!(LockState::of(&account, 5), LockState::Locked);

        account.active = true;
        account.failed_attempts = 5;
        assert_eq!(LockState::of(&account, 5), LockState::Locked);
    }

    #[test]
    fn zero_threshold_is_clamped() {
        assert_eq!(LockoutPolicy::new(0).threshold(), 1);
        assert_eq!(LockoutPolicy::default().threshold(), 5);
    }

    #[tokio::test]
    async fn fifth_failure_locks() -> Result<()> {
        let store = MemoryStore::new();
        let account = store.create_account("a@x.com", "hash").await?;
        let policy = LockoutPolicy::default();

        for n in 1..5 {
            assert_eq!(
                policy.record_failure(&store, account.id).await?,
                LockState::Active(n)
            );
        }
        assert_eq!(
            policy.record_failure(&store, account.id).await?,
            LockState::Locked
        );

        let stored = store.account(account.id).await.context("account missing")?;
        assert!(!stored.active);
        assert_eq!(stored.failed_attempts, 5);
        Ok(())
    }

    #[tokio::test]
    async fn success_resets_counter() -> Result<()> {
        let store = MemoryStore::new();
        let account = store.create_account("a@x.com", "hash").await?;
        let policy = LockoutPolicy::default();

        for _ in 0..4 {
            policy.record_failure(&store, account.id).await?;
        }
        assert_eq!(
            policy.record_success(&store, account.id).await?,
            LockState::Active(0)
        );
        for n in 1..5 {
            assert_eq!(
                policy.record_failure(&store, account.id).await?,
                LockState::Active(n)
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn success_never_unlocks() -> Result<()> {
        let store = MemoryStore::new();
        let account = store.create_account("a@x.com", "hash").await?;
        let policy = LockoutPolicy::new(1);

        assert_eq!(
            policy.record_failure(&store, account.id).await?,
            LockState::Locked
        );
        assert_eq!(
            policy.record_success(&store, account.id).await?,
            LockState::Locked
        );

        let stored = store.account(account.id).await.context("account missing")?;
        assert_eq!(stored.failed_attempts, 1);
        assert!(stored.last_login.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn parallel_failures_lock_once_without_overcounting() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let account = store.create_account("a@x.com", "hash").await?;
        let policy = LockoutPolicy::default();

        let mut handles = Vec::new();
        for _ in 0..12 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                policy.record_failure(store.as_ref(), account.id).await
            }));
        }

        let mut active_counts = Vec::new();
        for handle in handles {
            if let LockState::Active(n) = handle.await?? {
                active_counts.push(n);
            }
        }
        active_counts.sort_unstable();
        assert_eq!(active_counts, vec![1, 2, 3, 4]);

        let stored = store.account(account.id).await.context("account missing")?;
        assert_eq!(stored.failed_attempts, 5);
        assert!(!stored.active);
        Ok(())
    }
}
