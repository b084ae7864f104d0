//! Postgres-backed account and session store.
//!
//! The lockout transition is a single conditional `UPDATE ... RETURNING`, so
//! concurrent failures are serialized by the row lock and can never push the
//! counter past the threshold or leave a locked account reading as active.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Connection, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::{
    Account, AccountStore, FailureCount, HealthCheck, SessionRecord, SessionStore, StoreError,
    StoreResult,
};

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_span(operation: &'static str, statement: &'static str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn unavailable(err: sqlx::Error, what: &'static str) -> StoreError {
    StoreError::Unavailable(anyhow::Error::new(err).context(what))
}

fn account_from_row(row: &PgRow) -> Account {
    Account {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        failed_attempts: row.get("failed_login_attempts"),
        active: row.get("is_active"),
        created_at: row.get("created_at"),
        last_login: row.get("last_login"),
    }
}

fn session_from_row(row: &PgRow) -> SessionRecord {
    SessionRecord {
        token_id: row.get("token_id"),
        account_id: row.get("user_id"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
        revoked: row.get("is_revoked"),
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn create_account(&self, email: &str, password_hash: &str) -> StoreResult<Account> {
        let query = r"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id, email, password_hash, failed_login_attempts, is_active, created_at, last_login
        ";
        let result = sqlx::query(query)
            .bind(email)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", query))
            .await;

        match result {
            Ok(row) => Ok(account_from_row(&row)),
            Err(err) if is_unique_violation(&err) => Err(StoreError::DuplicateEmail),
            Err(err) => Err(unavailable(err, "failed to insert user")),
        }
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let query = r"
            SELECT id, email, password_hash, failed_login_attempts, is_active, created_at, last_login
            FROM users
            WHERE email = $1
        ";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .map_err(|err| unavailable(err, "failed to lookup user"))?;

        Ok(row.as_ref().map(account_from_row))
    }

    async fn increment_failures(
        &self,
        account_id: Uuid,
        threshold: i32,
    ) -> StoreResult<FailureCount> {
        // Only active rows move; a row locked by a concurrent failure is read back unchanged.
        let query = r"
            UPDATE users
            SET failed_login_attempts = failed_login_attempts + 1,
                is_active = failed_login_attempts + 1 < $2
            WHERE id = $1 AND is_active
            RETURNING failed_login_attempts, is_active
        ";
        let row = sqlx::query(query)
            .bind(account_id)
            .bind(threshold)
            .fetch_optional(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .map_err(|err| unavailable(err, "failed to increment failed attempts"))?;

        let row = match row {
            Some(row) => row,
            None => {
                let query = "SELECT failed_login_attempts, is_active FROM users WHERE id = $1";
                sqlx::query(query)
                    .bind(account_id)
                    .fetch_optional(&self.pool)
                    .instrument(db_span("SELECT", query))
                    .await
                    .map_err(|err| unavailable(err, "failed to read failed attempts"))?
                    .ok_or_else(|| {
                        StoreError::Unavailable(anyhow!("user {account_id} not found"))
                    })?
            }
        };

        Ok(FailureCount {
            count: row.get("failed_login_attempts"),
            active: row.get("is_active"),
        })
    }

    async fn reset_failures_and_stamp_login(&self, account_id: Uuid) -> StoreResult<bool> {
        let query = r"
            UPDATE users
            SET last_login = NOW(),
                failed_login_attempts = 0
            WHERE id = $1 AND is_active
        ";
        let result = sqlx::query(query)
            .bind(account_id)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .map_err(|err| unavailable(err, "failed to update last login"))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl HealthCheck for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        let acquire_span = tracing::info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .map_err(|err| unavailable(err, "failed to acquire database connection"))?;

        let ping_span = tracing::info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .map_err(|err| unavailable(err, "failed to ping database"))
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(
        &self,
        account_id: Uuid,
        token_id: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<SessionRecord> {
        let query = r"
            INSERT INTO sessions (user_id, token_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING token_id, user_id, created_at, expires_at, is_revoked
        ";
        let result = sqlx::query(query)
            .bind(account_id)
            .bind(token_id)
            .bind(expires_at)
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", query))
            .await;

        match result {
            Ok(row) => Ok(session_from_row(&row)),
            Err(err) if is_unique_violation(&err) => Err(StoreError::DuplicateSession),
            Err(err) => Err(unavailable(err, "failed to insert session")),
        }
    }

    async fn revoke_session(&self, token_id: &str) -> StoreResult<()> {
        // Matching an already revoked row still counts as affected, which keeps revoke idempotent.
        let query = "UPDATE sessions SET is_revoked = TRUE WHERE token_id = $1";
        let result = sqlx::query(query)
            .bind(token_id)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .map_err(|err| unavailable(err, "failed to revoke session"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::SessionNotFound);
        }
        Ok(())
    }

    async fn find_session(&self, token_id: &str) -> StoreResult<Option<SessionRecord>> {
        let query = r"
            SELECT token_id, user_id, created_at, expires_at, is_revoked
            FROM sessions
            WHERE token_id = $1
        ";
        let row = sqlx::query(query)
            .bind(token_id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .map_err(|err| unavailable(err, "failed to lookup session"))?;

        Ok(row.as_ref().map(session_from_row))
    }
}
