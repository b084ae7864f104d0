//! Salted, adaptive password hashing.
//!
//! Digests are PHC strings (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`), so the
//! salt and cost travel with the digest and verification needs no other state.

use anyhow::anyhow;
use argon2::{
    password_hash::{
        self, rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

use super::error::{AuthError, Result};

#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    // Verified against when the account does not exist, to keep timing flat.
    dummy_digest: String,
}

impl PasswordHasher {
    /// Argon2id with the crate's default cost (m=19 MiB, t=2, p=1).
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if the reference digest cannot be computed.
    pub fn new() -> Result<Self> {
        Self::with_params(Params::default())
    }

    /// # Errors
    /// Returns `AuthError::Internal` if the reference digest cannot be computed.
    pub fn with_params(params: Params) -> Result<Self> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_digest = hash_with(&argon2, "portiere-dummy-password")?;
        Ok(Self {
            argon2,
            dummy_digest,
        })
    }

    /// Cheapest accepted parameters; for tests only.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if argon2 rejects the parameters.
    pub fn insecure_fast() -> Result<Self> {
        let params = Params::new(Params::MIN_M_COST, Params::MIN_T_COST, 1, None)
            .map_err(|err| AuthError::Internal(anyhow!("invalid argon2 params: {err}")))?;
        Self::with_params(params)
    }

    /// # Errors
    /// Returns `AuthError::Internal` when hashing fails.
    pub fn hash(&self, plaintext: &str) -> Result<String> {
        hash_with(&self.argon2, plaintext)
    }

    /// Compare `plaintext` against `digest`.
    ///
    /// A mismatch is `Ok(false)`; only a digest that cannot be parsed is an error.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` for malformed digests.
    pub fn verify(&self, digest: &str, plaintext: &str) -> Result<bool> {
        let parsed = PasswordHash::new(digest)
            .map_err(|err| AuthError::Internal(anyhow!("malformed password digest: {err}")))?;

        match self.argon2.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(err) => Err(AuthError::Internal(anyhow!(
                "password verification failed: {err}"
            ))),
        }
    }

    /// Spend the same work as a real verification and always report a mismatch.
    pub fn verify_dummy(&self, plaintext: &str) {
        // The result is irrelevant; only the cost matters.
        let _ = self.verify(&self.dummy_digest, plaintext);
    }
}

fn hash_with(argon2: &Argon2<'static>, plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Internal(anyhow!("password hashing failed: {err}")))
}
