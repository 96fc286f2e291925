//! Domain errors for the account security core.
//!
//! Anything that could aid account enumeration (user-not-found vs wrong
//! password, which part of a code failed) is collapsed before it reaches the
//! client. Only lockout state and the remaining-attempt count are surfaced,
//! because honest UX needs them.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::attempts::format_lockout_duration;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong password and unknown account share this message on purpose.
    #[error("Invalid email or password")]
    AuthenticationFailed { remaining_attempts: u32 },

    #[error(
        "Too many failed login attempts. Try again in {}",
        format_lockout_duration(*retry_after_ms)
    )]
    LoginLocked {
        locked_until_ms: u64,
        retry_after_ms: u64,
    },

    /// Password-less account: point at the external provider without
    /// confirming anything else about the account.
    #[error("This account signs in with an external identity provider")]
    FederatedSignIn,

    #[error("Two-factor code required")]
    TwoFactorRequired,

    #[error("Invalid two-factor code")]
    InvalidTotpCode,

    #[error("Invalid backup code")]
    InvalidBackupCode,

    #[error("Two-factor authentication is already enabled")]
    TwoFactorAlreadyEnabled,

    #[error("Two-factor authentication is not enabled")]
    TwoFactorNotEnabled,

    #[error("Session not found")]
    SessionNotFound,

    #[error("The current session cannot be revoked; sign out instead")]
    CannotRevokeCurrentSession,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::AuthenticationFailed { .. } | Self::FederatedSignIn => StatusCode::UNAUTHORIZED,
            Self::LoginLocked { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::TwoFactorRequired => StatusCode::UNAUTHORIZED,
            Self::InvalidTotpCode
            | Self::InvalidBackupCode
            | Self::TwoFactorNotEnabled
            | Self::CannotRevokeCurrentSession => StatusCode::BAD_REQUEST,
            Self::TwoFactorAlreadyEnabled => StatusCode::CONFLICT,
            Self::SessionNotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::AuthenticationFailed { remaining_attempts } => json!({
                "message": self.to_string(),
                "details": { "remaining_attempts": remaining_attempts },
            }),
            Self::LoginLocked {
                locked_until_ms, ..
            } => json!({
                "message": self.to_string(),
                "details": {
                    "remaining_attempts": 0,
                    "locked_until_ms": locked_until_ms,
                },
            }),
            Self::Internal(err) => {
                error!("Internal error: {err:#}");
                json!({ "message": "Internal server error" })
            }
            _ => json!({ "message": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_errors_do_not_distinguish_lookup_from_password() {
        let failed = AuthError::AuthenticationFailed {
            remaining_attempts: 3,
        };
        assert_eq!(failed.to_string(), "Invalid email or password");
        assert_eq!(failed.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn locked_message_carries_rounded_retry() {
        let locked = AuthError::LoginLocked {
            locked_until_ms: 90_000,
            retry_after_ms: 90_000,
        };
        assert_eq!(
            locked.to_string(),
            "Too many failed login attempts. Try again in 2 minutes"
        );
        assert_eq!(locked.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn status_mapping_is_stable() {
        assert_eq!(
            AuthError::TwoFactorAlreadyEnabled.status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AuthError::TwoFactorNotEnabled.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AuthError::SessionNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AuthError::CannotRevokeCurrentSession.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
