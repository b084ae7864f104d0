//! Authentication orchestrator.
//!
//! Composes the hasher, lockout policy, token issuer and session registry
//! into the four lifecycle operations: register, login, validate, logout.

use anyhow::anyhow;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    config::AuthConfig,
    error::{AuthError, Result},
    lockout::{LockState, LockoutPolicy},
    password::PasswordHasher,
    session::SessionRegistry,
    token::{Claims, TokenIssuer},
};
use crate::store::{Account, AccountStore, SessionStore};

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub claims: Claims,
    pub account_id: Uuid,
}

#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    sessions: SessionRegistry,
    issuer: TokenIssuer,
    hasher: Arc<PasswordHasher>,
    lockout: LockoutPolicy,
}

impl AuthService {
    #[must_use]
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        sessions: Arc<dyn SessionStore>,
        hasher: PasswordHasher,
        config: &AuthConfig,
    ) -> Self {
        Self {
            accounts,
            sessions: SessionRegistry::new(sessions),
            issuer: TokenIssuer::new(config.jwt_secret(), config.token_ttl_seconds()),
            hasher: Arc::new(hasher),
            lockout: LockoutPolicy::new(config.lockout_threshold()),
        }
    }

    #[must_use]
    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    #[must_use]
    pub fn lockout(&self) -> LockoutPolicy {
        self.lockout
    }

    /// Create an account with a freshly hashed password.
    ///
    /// Input shape (email syntax, password length) is checked by the caller.
    ///
    /// # Errors
    /// `DuplicateEmail` if the email is taken, `StoreUnavailable` otherwise.
    #[instrument(skip(self, password))]
    pub async fn register(&self, email: &str, password: &str) -> Result<Account> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let digest = blocking(move || hasher.hash(&password)).await?;

        let account = self
            .accounts
            .create_account(email, &digest)
            .await
            .map_err(|err| {
                let err = AuthError::from(err);
                if matches!(err, AuthError::DuplicateEmail) {
                    debug!("registration rejected: email taken");
                }
                err
            })?;

        info!(account_id = %account.id, "account registered");
        Ok(account)
    }

    /// Authenticate and open a session.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown email or wrong password,
    /// `AccountLocked` once the account is locked (including by this very
    /// attempt), `StoreUnavailable` when the store cannot answer.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let Some(account) = self.accounts.get_by_email(email).await? else {
            let hasher = self.hasher.clone();
            let password = password.to_string();
            blocking(move || {
                hasher.verify_dummy(&password);
                Ok(())
            })
            .await?;
            debug!("login rejected: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if self.lockout.state_of(&account).is_locked() {
            info!(account_id = %account.id, "login rejected: account locked");
            return Err(AuthError::AccountLocked);
        }

        let hasher = self.hasher.clone();
        let digest = account.password_hash.clone();
        let password = password.to_string();
        let matches = blocking(move || hasher.verify(&digest, &password)).await?;

        if !matches {
            return match self
                .lockout
                .record_failure(self.accounts.as_ref(), account.id)
                .await?
            {
                LockState::Locked => Err(AuthError::AccountLocked),
                LockState::Active(_) => Err(AuthError::InvalidCredentials),
            };
        }

        if self
            .lockout
            .record_success(self.accounts.as_ref(), account.id)
            .await?
            .is_locked()
        {
            return Err(AuthError::AccountLocked);
        }

        let issued = self.issuer.issue(&account)?;
        let expires_at = issued.claims.expires_at()?;
        self.sessions
            .create(account.id, &issued.claims.jti, expires_at)
            .await?;

        info!(account_id = %account.id, "login succeeded");
        Ok(LoginOutcome {
            token: issued.token,
            claims: issued.claims,
            account_id: account.id,
        })
    }

    /// Structural validation followed by a session liveness check.
    ///
    /// # Errors
    /// `TokenMalformed`, `TokenExpired` or `SessionRevokedOrUnknown`; all
    /// three are meant to be reported identically to the client.
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &str) -> Result<Claims> {
        let claims = self.issuer.validate(token)?;

        if !self.sessions.is_valid(&claims.jti).await? {
            debug!(sub = %claims.sub, "token has no live session");
            return Err(AuthError::SessionRevokedOrUnknown);
        }

        Ok(claims)
    }

    /// Revoke the session behind `token`. Logging out twice with the same
    /// unexpired token succeeds both times.
    ///
    /// # Errors
    /// `TokenMalformed` or `TokenExpired` for tokens that fail structural
    /// validation, `SessionRevokedOrUnknown` if no session was ever issued
    /// for the token.
    #[instrument(skip_all)]
    pub async fn logout(&self, token: &str) -> Result<()> {
        let claims = self.issuer.validate(token)?;
        self.sessions.revoke(&claims.jti).await.map_err(|err| {
            let err = AuthError::from(err);
            if matches!(err, AuthError::SessionRevokedOrUnknown) {
                warn!(sub = %claims.sub, "logout for a token without a session");
            }
            err
        })?;

        info!(sub = %claims.sub, "logged out");
        Ok(())
    }
}

async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| AuthError::Internal(anyhow!("password task failed: {err}")))?
}
