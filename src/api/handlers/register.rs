use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::instrument;

use super::{
    error_response,
    types::{Credentials, ErrorResponse, RegisterResponse},
    valid_email, valid_password,
};
use crate::auth::AuthService;

#[utoipa::path(
    post,
    path= "/auth/register",
    request_body = Credentials,
    responses (
        (status = 201, description = "Registration successful", body = RegisterResponse, content_type = "application/json"),
        (status = 400, description = "Missing payload, invalid email or password too short", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse),
    ),
    tag= "auth"
)]
#[instrument(skip(service))]
pub async fn register(
    service: Extension<AuthService>,
    payload: Option<Json<Credentials>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid request body");
    };

    let email = request.email.trim();
    if email.is_empty() || request.password.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Email and password are required");
    }
    if !valid_email(email) {
        return error_response(StatusCode::BAD_REQUEST, "Invalid email format");
    }
    if !valid_password(&request.password) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters long",
        );
    }

    match service.register(email, &request.password).await {
        Ok(account) => (
            StatusCode::CREATED,
            Json(RegisterResponse {
                message: "User registered successfully".to_string(),
                email: account.email,
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
