//! Session listing and revocation endpoints.

use std::sync::Arc;

use axum::extract::{Extension, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

use super::principal::require_session;
use super::types::{RevokeParams, RevokedResponse, SessionsResponse};
use crate::api::state::SecurityState;

#[utoipa::path(
    get,
    path = "/v1/auth/sessions",
    responses(
        (status = 200, description = "Active sessions for the caller", body = SessionsResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "sessions"
)]
pub async fn list_sessions(
    headers: HeaderMap,
    state: Extension<Arc<SecurityState>>,
) -> axum::response::Response {
    let principal = match require_session(&headers, &state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };
    let sessions = state
        .sessions()
        .list(principal.user_id, Some(principal.session_id));
    Json(SessionsResponse { sessions }).into_response()
}

#[utoipa::path(
    delete,
    path = "/v1/auth/sessions",
    params(
        ("id" = Option<Uuid>, Query, description = "Session to revoke"),
        ("all" = Option<bool>, Query, description = "Revoke all sessions except the current one")
    ),
    responses(
        (status = 200, description = "Count of revoked sessions", body = RevokedResponse),
        (status = 204, description = "Session revoked"),
        (status = 400, description = "Missing or conflicting parameters"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Session not found")
    ),
    tag = "sessions"
)]
pub async fn revoke_sessions(
    headers: HeaderMap,
    state: Extension<Arc<SecurityState>>,
    params: Query<RevokeParams>,
) -> axum::response::Response {
    let principal = match require_session(&headers, &state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    if params.all == Some(true) {
        let revoked = state
            .sessions()
            .revoke_all_others(principal.user_id, principal.session_id);
        return Json(RevokedResponse { revoked }).into_response();
    }

    let Some(session_id) = params.id else {
        return (StatusCode::BAD_REQUEST, "Missing ?id or ?all=true").into_response();
    };

    match state
        .sessions()
        .revoke(principal.user_id, session_id, principal.session_id)
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}
