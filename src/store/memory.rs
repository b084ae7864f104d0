//! In-memory account and session store.
//!
//! Every operation holds the store mutex for its whole read-modify-write, so
//! the same atomicity the Postgres store gets from conditional updates holds
//! here too.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    Account, AccountStore, FailureCount, HealthCheck, SessionRecord, SessionStore, StoreError,
    StoreResult,
};

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    emails: HashMap<String, Uuid>,
    sessions: HashMap<String, SessionRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable(anyhow!("memory store marked unavailable")))
        } else {
            Ok(())
        }
    }

    pub async fn account(&self, account_id: Uuid) -> Option<Account> {
        self.tables.lock().await.accounts.get(&account_id).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.tables.lock().await.sessions.len()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create_account(&self, email: &str, password_hash: &str) -> StoreResult<Account> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        if tables.emails.contains_key(email) {
            return Err(StoreError::DuplicateEmail);
        }

        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            failed_attempts: 0,
            active: true,
            created_at: Utc::now(),
            last_login: None,
        };
        tables.emails.insert(account.email.clone(), account.id);
        tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .emails
            .get(email)
            .and_then(|id| tables.accounts.get(id))
            .cloned())
    }

    async fn increment_failures(
        &self,
        account_id: Uuid,
        threshold: i32,
    ) -> StoreResult<FailureCount> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let account = tables
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| StoreError::Unavailable(anyhow!("account {account_id} vanished")))?;

        if account.active {
            account.failed_attempts += 1;
            account.active = account.failed_attempts < threshold;
        }

        Ok(FailureCount {
            count: account.failed_attempts,
            active: account.active,
        })
    }

    async fn reset_failures_and_stamp_login(&self, account_id: Uuid) -> StoreResult<bool> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let account = tables
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| StoreError::Unavailable(anyhow!("account {account_id} vanished")))?;
        if !account.active {
            return Ok(false);
        }
        account.failed_attempts = 0;
        account.last_login = Some(Utc::now());
        Ok(true)
    }
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.check_available()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(
        &self,
        account_id: Uuid,
        token_id: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<SessionRecord> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        if tables.sessions.contains_key(token_id) {
            return Err(StoreError::DuplicateSession);
        }

        let record = SessionRecord {
            token_id: token_id.to_string(),
            account_id,
            created_at: Utc::now(),
            expires_at,
            revoked: false,
        };
        tables.sessions.insert(record.token_id.clone(), record.clone());
        Ok(record)
    }

    async fn revoke_session(&self, token_id: &str) -> StoreResult<()> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let session = tables
            .sessions
            .get_mut(token_id)
            .ok_or(StoreError::SessionNotFound)?;
        session.revoked = true;
        Ok(())
    }

    async fn find_session(&self, token_id: &str) -> StoreResult<Option<SessionRecord>> {
        self.check_available()?;
        Ok(self.tables.lock().await.sessions.get(token_id).cloned())
    }
}
