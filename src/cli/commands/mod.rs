use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

use crate::{api::DEFAULT_REQUEST_TIMEOUT, auth::token::MAX_TOKEN_TTL_SECONDS};

pub const ARG_PORT: &str = "port";
pub const ARG_DSN: &str = "dsn";
pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_LOCKOUT_THRESHOLD: &str = "lockout-threshold";
pub const ARG_STRICT_RATE_LIMIT: &str = "strict-rate-limit";
pub const ARG_LENIENT_RATE_LIMIT: &str = "lenient-rate-limit";
pub const ARG_RATE_LIMIT_WINDOW_SECONDS: &str = "rate-limit-window-seconds";
pub const ARG_MAX_CONNECTIONS: &str = "max-connections";
pub const ARG_REQUEST_TIMEOUT_SECONDS: &str = "request-timeout-seconds";
pub const ARG_TRUST_PROXY_HEADERS: &str = "trust-proxy-headers";
pub const ARG_VERBOSITY: &str = "verbosity";

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("portiere")
        .about("Authentication and session lifecycle service")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("PORTIERE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .env("PORTIERE_DSN")
                .required(true),
        )
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long("jwt-secret")
                .help("HMAC secret used to sign bearer tokens")
                .env("PORTIERE_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long("token-ttl-seconds")
                .help("Bearer token and session lifetime in seconds")
                .default_value("86400")
                .env("PORTIERE_TOKEN_TTL_SECONDS")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TOKEN_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_LOCKOUT_THRESHOLD)
                .long("lockout-threshold")
                .help("Consecutive failed logins that lock an account")
                .default_value("5")
                .env("PORTIERE_LOCKOUT_THRESHOLD")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_STRICT_RATE_LIMIT)
                .long("strict-rate-limit")
                .help("Requests per window per client on /auth/register and /auth/login")
                .default_value("10")
                .env("PORTIERE_STRICT_RATE_LIMIT")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_LENIENT_RATE_LIMIT)
                .long("lenient-rate-limit")
                .help("Requests per window per client on every endpoint")
                .default_value("100")
                .env("PORTIERE_LENIENT_RATE_LIMIT")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_WINDOW_SECONDS)
                .long("rate-limit-window-seconds")
                .help("Rate limit window length in seconds")
                .default_value("60")
                .env("PORTIERE_RATE_LIMIT_WINDOW_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_MAX_CONNECTIONS)
                .long("max-connections")
                .help("Maximum database pool connections")
                .default_value("25")
                .env("PORTIERE_MAX_CONNECTIONS")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_REQUEST_TIMEOUT_SECONDS)
                .long("request-timeout-seconds")
                .help("Deadline for handling a single request, in seconds")
                .default_value("15")
                .env("PORTIERE_REQUEST_TIMEOUT_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_TRUST_PROXY_HEADERS)
                .long("trust-proxy-headers")
                .help("Key rate limits on X-Forwarded-For / X-Real-IP instead of the peer address")
                .env("PORTIERE_TRUST_PROXY_HEADERS")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("PORTIERE_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
