//! Request/response types for the auth endpoints.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::session::SessionView;
use crate::totp::TwoFactorSetup;

#[derive(ToSchema, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    #[schema(value_type = String)]
    pub password: SecretString,
    pub two_factor_code: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct LoginResponse {
    pub requires_2fa: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

impl LoginResponse {
    pub(crate) fn requires_2fa() -> Self {
        Self {
            requires_2fa: true,
            user_id: None,
            session_id: None,
        }
    }

    pub(crate) fn signed_in(user_id: Uuid, session_id: Uuid) -> Self {
        Self {
            requires_2fa: false,
            user_id: Some(user_id),
            session_id: Some(session_id),
        }
    }
}

/// Tagged two-factor management action.
#[derive(ToSchema, Deserialize, Debug)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TwoFactorAction {
    Setup,
    Enable { code: String },
    Disable { code: String },
}

#[derive(ToSchema, Serialize, Debug)]
pub struct TwoFactorSetupResponse {
    pub secret_base32: String,
    pub otpauth_url: String,
    pub qr_code_data_url: String,
    pub backup_codes: Vec<String>,
}

impl From<TwoFactorSetup> for TwoFactorSetupResponse {
    fn from(setup: TwoFactorSetup) -> Self {
        Self {
            secret_base32: setup.secret_base32,
            otpauth_url: setup.otpauth_url,
            qr_code_data_url: setup.qr_code_data_url,
            backup_codes: setup.backup_codes,
        }
    }
}

#[derive(ToSchema, Serialize, Debug)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionView>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct RevokedResponse {
    pub revoked: usize,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct RevokeParams {
    pub id: Option<Uuid>,
    pub all: Option<bool>,
}
