use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use tracing::instrument;

use super::{
    extract_bearer_token,
    types::{ErrorResponse, SessionResponse},
};
use crate::auth::{AuthError, AuthService};

#[utoipa::path(
    get,
    path= "/auth/session",
    responses (
        (status = 200, description = "Token and session are valid", body = SessionResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn session(service: Extension<AuthService>, headers: HeaderMap) -> impl IntoResponse {
    let Some(token) = extract_bearer_token(&headers) else {
        return AuthError::TokenMalformed.into_response();
    };

    let claims = match service.validate(&token).await {
        Ok(claims) => claims,
        Err(err) => return err.into_response(),
    };

    match (claims.account_id(), claims.expires_at()) {
        (Ok(account_id), Ok(expires_at)) => (
            StatusCode::OK,
            Json(SessionResponse {
                account_id,
                email: claims.email,
                expires_at,
            }),
        )
            .into_response(),
        (Err(err), _) | (_, Err(err)) => err.into_response(),
    }
}
