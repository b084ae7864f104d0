use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use tracing::instrument;

use super::{
    extract_bearer_token,
    types::{ErrorResponse, MessageResponse},
};
use crate::auth::{AuthError, AuthService};

#[utoipa::path(
    post,
    path= "/auth/logout",
    responses (
        (status = 200, description = "Session revoked", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn logout(service: Extension<AuthService>, headers: HeaderMap) -> impl IntoResponse {
    let Some(token) = extract_bearer_token(&headers) else {
        return AuthError::TokenMalformed.into_response();
    };

    match service.logout(&token).await {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Logged out successfully".to_string(),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
