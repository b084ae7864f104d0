//! Signed bearer tokens.
//!
//! Tokens are compact HS256 JWTs. The `jti` claim is the revocation handle:
//! the session registry keys on it, so it must never repeat.

use anyhow::anyhow;
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::error::{AuthError, Result};
use crate::store::Account;

pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
pub const MAX_TOKEN_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    /// Token id, unique per issued token.
    pub jti: String,
}

impl Claims {
    /// # Errors
    /// Returns `AuthError::TokenMalformed` if `sub` is not an account id.
    pub fn account_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::TokenMalformed)
    }

    /// # Errors
    /// Returns `AuthError::TokenMalformed` if `exp` is out of range.
    pub fn expires_at(&self) -> Result<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .ok_or(AuthError::TokenMalformed)
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_seconds: i64,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secret: &SecretString, ttl_seconds: i64) -> Self {
        let bytes = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(TOKEN_ALGORITHM);
        // Expiry is checked by `validate_at` so the boundary is exclusive and has no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            validation,
            ttl_seconds,
        }
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Expiry for a token issued at `now`, if representable.
    fn expiry_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        Duration::try_seconds(self.ttl_seconds).and_then(|ttl| now.checked_add_signed(ttl))
    }

    /// # Errors
    /// Returns `AuthError::Internal` if randomness or signing fails.
    pub fn issue(&self, account: &Account) -> Result<IssuedToken> {
        self.issue_at(account, Utc::now())
    }

    /// # Errors
    /// Returns `AuthError::Internal` if the expiry overflows, or if
    /// randomness or signing fails.
    pub fn issue_at(&self, account: &Account, now: DateTime<Utc>) -> Result<IssuedToken> {
        let expires_at = self.expiry_from(now).ok_or_else(|| {
            AuthError::Internal(anyhow!(
                "token lifetime of {}s overflows the expiry timestamp",
                self.ttl_seconds
            ))
        })?;

        let claims = Claims {
            sub: account.id.to_string(),
            email: account.email.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: generate_token_id()?,
        };

        let token = encode(&Header::new(TOKEN_ALGORITHM), &claims, &self.encoding)
            .map_err(|err| AuthError::Internal(anyhow!("failed to sign token: {err}")))?;

        Ok(IssuedToken { token, claims })
    }

    /// # Errors
    /// Returns `AuthError::TokenMalformed` or `AuthError::TokenExpired`.
    pub fn validate(&self, token: &str) -> Result<Claims> {
        self.validate_at(token, Utc::now())
    }

    /// Verify signature, algorithm and expiry as of `now`.
    ///
    /// A token is expired from its `exp` second onward. Revocation is not
    /// checked here.
    ///
    /// # Errors
    /// Returns `AuthError::TokenMalformed` for any structural, signature or
    /// algorithm failure and `AuthError::TokenExpired` when `now >= exp`.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|err| {
            debug!("token rejected: {err}");
            AuthError::TokenMalformed
        })?;

        let claims = data.claims;
        claims.account_id()?;

        if now.timestamp() >= claims.exp {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }
}

/// 256 random bits, URL-safe base64 without padding.
///
/// # Errors
/// Returns `AuthError::Internal` if the OS RNG fails.
pub fn generate_token_id() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| AuthError::Internal(anyhow!("failed to generate token id: {err}")))?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::collections::HashSet;

    const TEST_SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&SecretString::from(TEST_SECRET.to_string()), DEFAULT_TOKEN_TTL_SECONDS)
    }

    fn account() -> Account {
        Account {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            password_hash: String::new(),
            failed_attempts: 0,
            active: true,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn issue_then_validate_round_trips_subject() -> Result<()> {
        let issuer = issuer();
        let account = account();
        let issued = issuer.issue(&account)?;

        let claims = issuer.validate(&issued.token)?;
        assert_eq!(claims.account_id()?, account.id);
        assert_eq!(claims, issued.claims);
        assert_eq!(claims.exp - claims.iat, DEFAULT_TOKEN_TTL_SECONDS);
        Ok(())
    }

    #[test]
    fn expiry_is_exclusive() -> Result<()> {
        let issuer = issuer();
        let now = Utc::now();
        let issued = issuer.issue_at(&account(), now)?;
        let expires_at = issued.claims.expires_at()?;

        assert!(issuer
            .validate_at(&issued.token, expires_at - Duration::seconds(1))
            .is_ok());
        assert!(matches!(
            issuer.validate_at(&issued.token, expires_at),
            Err(AuthError::TokenExpired)
        ));
        assert!(matches!(
            issuer.validate_at(&issued.token, expires_at + Duration::hours(1)),
            Err(AuthError::TokenExpired)
        ));
        Ok(())
    }

    #[test]
    fn wrong_secret_is_malformed() -> Result<()> {
        let issued = issuer().issue(&account())?;
        let other = TokenIssuer::new(
            &SecretString::from("another-secret-key-for-jwt-testing-32-chars".to_string()),
            DEFAULT_TOKEN_TTL_SECONDS,
        );
        assert!(matches!(
            other.validate(&issued.token),
            Err(AuthError::TokenMalformed)
        ));
        Ok(())
    }

    #[test]
    fn other_algorithm_is_rejected() -> Result<()> {
        let issuer = issuer();
        let now = Utc::now();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "a@x.com".to_string(),
            iat: now.timestamp(),
            exp: now.timestamp() + 60,
            jti: generate_token_id()?,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )?;
        assert!(matches!(
            issuer.validate(&token),
            Err(AuthError::TokenMalformed)
        ));
        Ok(())
    }

    #[test]
    fn unsigned_token_is_rejected() -> Result<()> {
        let issuer = issuer();
        let issued = issuer.issue(&account())?;
        let payload = issued
            .token
            .split('.')
            .nth(1)
            .map(str::to_string)
            .unwrap_or_default();
        let header = Base64UrlUnpadded::encode_string(br#"{"alg":"none","typ":"JWT"}"#);
        let token = format!("{header}.{payload}.");
        assert!(matches!(
            issuer.validate(&token),
            Err(AuthError::TokenMalformed)
        ));
        Ok(())
    }

    #[test]
    fn garbage_is_malformed() {
        let issuer = issuer();
        for token in ["", "abc", "invalid.token.here", "a.b.c.d"] {
            assert!(matches!(
                issuer.validate(token),
                Err(AuthError::TokenMalformed)
            ));
        }
    }

    #[test]
    fn tampered_payload_is_malformed() -> Result<()> {
        let issuer = issuer();
        let issued = issuer.issue(&account())?;
        let mut parts: Vec<String> = issued.token.split('.').map(str::to_string).collect();
        let forged = Claims {
            sub: Uuid::new_v4().to_string(),
            ..issued.claims.clone()
        };
        parts[1] = Base64UrlUnpadded::encode_string(serde_json::to_string(&forged)?.as_bytes());
        assert!(matches!(
            issuer.validate(&parts.join(".")),
            Err(AuthError::TokenMalformed)
        ));
        Ok(())
    }

    #[test]
    fn oversized_ttl_is_an_error_not_a_panic() {
        let secret = SecretString::from(TEST_SECRET.to_string());
        for ttl in [10_000_000_000_000, i64::MAX] {
            let issuer = TokenIssuer::new(&secret, ttl);
            assert!(matches!(
                issuer.issue(&account()),
                Err(AuthError::Internal(_))
            ));
        }
    }

    #[test]
    fn longest_configurable_ttl_issues() -> Result<()> {
        let secret = SecretString::from(TEST_SECRET.to_string());
        let issued = TokenIssuer::new(&secret, MAX_TOKEN_TTL_SECONDS).issue(&account())?;
        assert_eq!(issued.claims.exp - issued.claims.iat, MAX_TOKEN_TTL_SECONDS);
        Ok(())
    }

    #[test]
    fn token_ids_do_not_repeat() -> Result<()> {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let id = generate_token_id()?;
            assert_eq!(id.len(), 43);
            assert!(seen.insert(id));
        }
        Ok(())
    }
}
