//! Login and logout endpoints.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::header::{SET_COOKIE, USER_AGENT};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use tracing::error;

use super::principal::{
    attach_session_headers, clear_session_cookie, extract_client_ip, extract_geo,
    extract_session_token,
};
use super::types::{LoginRequest, LoginResponse};
use crate::api::state::SecurityState;
use crate::auth::{valid_email, LoginOutcome, LoginRequestContext};
use crate::session::hash_session_token;

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in, or a second factor is required", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many failed attempts; retry after the lockout")
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    state: Extension<Arc<SecurityState>>,
    payload: Option<Json<LoginRequest>>,
) -> axum::response::Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    let email = request.email.trim().to_lowercase();
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email address").into_response();
    }

    let (country, city) = extract_geo(&headers);
    let context = LoginRequestContext {
        email,
        password: request.password,
        two_factor_code: request.two_factor_code,
        ip: extract_client_ip(&headers),
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        country,
        city,
    };

    match state.coordinator().login(context).await {
        Ok(LoginOutcome::TwoFactorRequired) => {
            (StatusCode::OK, Json(LoginResponse::requires_2fa())).into_response()
        }
        Ok(LoginOutcome::Success(success)) => {
            let mut response_headers = HeaderMap::new();
            if let Err(err) =
                attach_session_headers(&mut response_headers, state.config(), &success.token)
            {
                error!("Failed to set session cookie: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
            (
                StatusCode::OK,
                response_headers,
                Json(LoginResponse::signed_in(success.user_id, success.session.id)),
            )
                .into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session ended and cookie cleared")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    state: Extension<Arc<SecurityState>>,
) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        let token_hash = hash_session_token(&token);
        if let Some(session) = state.sessions().find_active_by_token_hash(&token_hash) {
            state.sessions().end_session(session.id);
        }
    }

    // Always clear the cookie, even if no session record matched.
    let mut response_headers = HeaderMap::new();
    match clear_session_cookie(state.config()) {
        Ok(cookie) => {
            response_headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build clearing cookie: {err}"),
    }
    (StatusCode::NO_CONTENT, response_headers)
}
