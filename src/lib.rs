//! # Portiere
//!
//! Account registration, password login with consecutive-failure lockout,
//! revocable bearer tokens and per-client rate limiting, served over HTTP.
//!
//! The engine lives in [`auth`] and talks to persistence only through the
//! [`store`] traits. [`api`] is the axum boundary and [`cli`] wires the
//! binary together.

pub mod api;
pub mod auth;
pub mod cli;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
