//! Two-factor authentication endpoints.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use super::principal::require_session;
use super::types::{TwoFactorAction, TwoFactorSetupResponse};
use crate::api::state::SecurityState;
use crate::totp::TwoFactorStatus;

#[utoipa::path(
    get,
    path = "/v1/auth/2fa",
    responses(
        (status = 200, description = "Two-factor state for the caller", body = TwoFactorStatus),
        (status = 401, description = "Unauthorized")
    ),
    tag = "2fa"
)]
pub async fn two_factor_status(
    headers: HeaderMap,
    state: Extension<Arc<SecurityState>>,
) -> axum::response::Response {
    let principal = match require_session(&headers, &state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };
    Json(state.totp().status(principal.user_id)).into_response()
}

#[utoipa::path(
    post,
    path = "/v1/auth/2fa",
    request_body = TwoFactorAction,
    responses(
        (status = 200, description = "Setup artifacts and one-time backup codes", body = TwoFactorSetupResponse),
        (status = 204, description = "Enabled or disabled"),
        (status = 400, description = "Invalid code or state"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Two-factor auth already enabled")
    ),
    tag = "2fa"
)]
pub async fn two_factor_manage(
    headers: HeaderMap,
    state: Extension<Arc<SecurityState>>,
    payload: Option<Json<TwoFactorAction>>,
) -> axum::response::Response {
    let principal = match require_session(&headers, &state) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };
    let Some(Json(action)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    match action {
        TwoFactorAction::Setup => {
            // The otpauth label is the account email, looked up fresh so a
            // stale session cannot enroll a deleted account.
            let Some(account) = state.accounts().find_active_by_id(principal.user_id) else {
                return StatusCode::UNAUTHORIZED.into_response();
            };
            match state.totp().setup(principal.user_id, &account.email) {
                Ok(setup) => {
                    (StatusCode::OK, Json(TwoFactorSetupResponse::from(setup))).into_response()
                }
                Err(err) => err.into_response(),
            }
        }
        TwoFactorAction::Enable { code } => {
            match state.totp().enable(principal.user_id, &code) {
                Ok(()) => StatusCode::NO_CONTENT.into_response(),
                Err(err) => err.into_response(),
            }
        }
        TwoFactorAction::Disable { code } => {
            match state.totp().disable(principal.user_id, &code) {
                Ok(()) => StatusCode::NO_CONTENT.into_response(),
                Err(err) => err.into_response(),
            }
        }
    }
}
