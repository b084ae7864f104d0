use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::{error, instrument};

use super::{
    error_response,
    types::{Credentials, ErrorResponse, LoginResponse},
};
use crate::auth::AuthService;

#[utoipa::path(
    post,
    path= "/auth/login",
    request_body = Credentials,
    responses (
        (status = 200, description = "Login successful", body = LoginResponse, content_type = "application/json"),
        (status = 400, description = "Missing payload", body = ErrorResponse),
        (status = 401, description = "Invalid email or password", body = ErrorResponse),
        (status = 403, description = "Account locked", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse),
    ),
    tag= "auth"
)]
#[instrument(skip(service))]
pub async fn login(
    service: Extension<AuthService>,
    payload: Option<Json<Credentials>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid request body");
    };

    let outcome = match service.login(request.email.trim(), &request.password).await {
        Ok(outcome) => outcome,
        Err(err) => return err.into_response(),
    };

    let expires_at = match outcome.claims.expires_at() {
        Ok(expires_at) => expires_at,
        Err(err) => {
            error!("issued token carries an invalid expiry");
            return err.into_response();
        }
    };

    (
        StatusCode::OK,
        Json(LoginResponse {
            token: outcome.token,
            expires_at,
        }),
    )
        .into_response()
}
