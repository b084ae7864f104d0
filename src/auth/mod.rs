//! Authentication and session lifecycle engine.
//!
//! ## Flow
//! - **Register:** the password is hashed (argon2id, PHC string) and the
//!   account is created; a taken email is `DuplicateEmail`.
//! - **Login:** unknown emails and wrong passwords both answer
//!   `InvalidCredentials`. Consecutive failures are counted atomically per
//!   account and the threshold-th failure locks it. A locked account answers
//!   `AccountLocked` before any password comparison.
//! - **Session:** a successful login issues an HS256 JWT whose `jti` keys a
//!   server-side session record. A token is accepted only while both its
//!   signature/expiry and its session are valid.
//! - **Logout:** revokes the session; the token stops working immediately.
//!
//! Malformed, expired, revoked and unknown tokens are reported to clients
//! identically.

pub mod config;
pub mod error;
pub mod lockout;
pub mod password;
pub mod rate_limit;
pub mod service;
pub mod session;
pub mod token;

pub use config::AuthConfig;
pub use error::AuthError;
pub use lockout::{LockState, LockoutPolicy};
pub use password::PasswordHasher;
pub use rate_limit::{
    NoopRateLimiter, RateLimitDecision, RateLimitTier, RateLimiter, RateLimiters,
    WindowRateLimiter,
};
pub use service::{AuthService, LoginOutcome};
pub use session::{SessionError, SessionRegistry};
pub use token::{Claims, IssuedToken, TokenIssuer};
