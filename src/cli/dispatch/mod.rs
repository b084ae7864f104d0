use crate::cli::{
    actions::{server::Args, Action},
    commands::{
        ARG_DSN, ARG_JWT_SECRET, ARG_LENIENT_RATE_LIMIT, ARG_LOCKOUT_THRESHOLD,
        ARG_MAX_CONNECTIONS, ARG_PORT, ARG_RATE_LIMIT_WINDOW_SECONDS, ARG_REQUEST_TIMEOUT_SECONDS,
        ARG_STRICT_RATE_LIMIT, ARG_TOKEN_TTL_SECONDS, ARG_TRUST_PROXY_HEADERS,
    },
};
use anyhow::{Context, Result};
use secrecy::SecretString;

fn required<T: Clone + Send + Sync + 'static>(matches: &clap::ArgMatches, id: &str) -> Result<T> {
    matches
        .get_one::<T>(id)
        .cloned()
        .with_context(|| format!("missing required argument: --{id}"))
}

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Server(Args {
        port: matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080),
        dsn: required(matches, ARG_DSN)?,
        jwt_secret: SecretString::from(required::<String>(matches, ARG_JWT_SECRET)?),
        token_ttl_seconds: required(matches, ARG_TOKEN_TTL_SECONDS)?,
        lockout_threshold: required(matches, ARG_LOCKOUT_THRESHOLD)?,
        strict_rate_limit: required(matches, ARG_STRICT_RATE_LIMIT)?,
        lenient_rate_limit: required(matches, ARG_LENIENT_RATE_LIMIT)?,
        rate_limit_window_seconds: required(matches, ARG_RATE_LIMIT_WINDOW_SECONDS)?,
        max_connections: required(matches, ARG_MAX_CONNECTIONS)?,
        request_timeout_seconds: required(matches, ARG_REQUEST_TIMEOUT_SECONDS)?,
        trust_proxy_headers: matches.get_flag(ARG_TRUST_PROXY_HEADERS),
    }))
}
