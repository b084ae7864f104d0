use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{AuthConfig, AuthService, PasswordHasher, RateLimiters},
    store::{HealthCheck, PgStore},
};

pub mod handlers;
pub mod openapi;
pub mod rate_limit;

pub use openapi::ApiDoc;
pub use rate_limit::ClientRateLimit;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Settings of the HTTP boundary itself, as opposed to the auth engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    request_timeout: Duration,
    trust_proxy_headers: bool,
}

impl HttpConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            trust_proxy_headers: false,
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Key rate limits on `X-Forwarded-For` / `X-Real-IP`. Only enable this
    /// behind a proxy that overwrites those headers.
    #[must_use]
    pub fn with_trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub fn trust_proxy_headers(&self) -> bool {
        self.trust_proxy_headers
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the application router.
///
/// Every route goes through the lenient tier; register and login also go
/// through the strict tier. Requests that outlive the configured timeout are
/// answered with 408.
pub fn router(
    service: AuthService,
    limiters: &RateLimiters,
    health: Arc<dyn HealthCheck>,
    http: &HttpConfig,
) -> Router {
    let trust = http.trust_proxy_headers();

    let credentials = Router::new()
        .route("/auth/register", post(handlers::register::register))
        .route("/auth/login", post(handlers::login::login))
        .route_layer(middleware::from_fn_with_state(
            ClientRateLimit::new(limiters.strict.clone(), trust),
            rate_limit::enforce,
        ));

    let sessions = Router::new()
        .route("/auth/logout", post(handlers::logout::logout))
        .route("/auth/session", get(handlers::session::session))
        .route(
            "/health",
            get(handlers::health::health).options(handlers::health::health),
        );

    credentials
        .merge(sessions)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn_with_state(
            ClientRateLimit::new(limiters.lenient.clone(), trust),
            rate_limit::enforce,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(TimeoutLayer::new(http.request_timeout()))
                .layer(Extension(service))
                .layer(Extension(health)),
        )
}

#[derive(Debug, Clone)]
pub struct ServerArgs {
    pub port: u16,
    pub dsn: String,
    pub max_connections: u32,
    pub http: HttpConfig,
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(args: ServerArgs, config: AuthConfig) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(args.max_connections)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&args.dsn)
        .await
        .context("Failed to connect to database")?;

    let store = Arc::new(PgStore::new(pool));
    let hasher = PasswordHasher::new().context("Failed to initialize password hasher")?;
    let service = AuthService::new(store.clone(), store.clone(), hasher, &config);
    let limiters = RateLimiters::new(config.strict_tier(), config.lenient_tier());

    let app = router(service, &limiters, store, &args.http);

    if args.http.trust_proxy_headers() {
        info!("Rate limits keyed on proxy headers");
    }

    let listener = TcpListener::bind(format!("::0:{}", args.port)).await?;

    info!("Listening on [::]:{}", args.port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
