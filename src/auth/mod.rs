//! Login orchestration and brute-force accounting.
//!
//! Flow overview (the route every login request takes):
//! 1) Check the attempt key; a locked key short-circuits before any lookup.
//! 2) Verify credentials against the account store.
//! 3) If two-factor auth is enabled, require and verify a second factor.
//! 4) Only then clear the attempt key and create the session record.
//!
//! Security boundaries:
//! - The lockout check is never bypassed, for any caller.
//! - Attempt state is only cleared after every required step succeeded.
//! - Unknown accounts are charged against the same attempt key as wrong
//!   passwords so error shape and timing match.

pub mod attempts;
pub mod verifier;

use std::sync::Arc;

use regex::Regex;
use secrecy::SecretString;
use tracing::{info, warn};
use uuid::Uuid;

use crate::device;
use crate::error::AuthError;
use crate::session::{
    generate_session_token, hash_session_token, NetworkInfo, Session, SessionRegistry,
};
use crate::totp::TotpEngine;
use attempts::{AttemptKey, AttemptTracker, LoginCheck};
use verifier::{CredentialOutcome, CredentialVerifier};

/// Normalize an email for lookups and attempt keys.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic shape check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

const UNKNOWN_IP: &str = "unknown";

/// Per-request context assembled by the HTTP layer.
#[derive(Debug)]
pub struct LoginRequestContext {
    pub email: String,
    pub password: SecretString,
    pub two_factor_code: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

/// Artifacts of a fully verified login. `token` goes to the outer
/// cookie/bearer mechanism and is never stored raw.
#[derive(Debug)]
pub struct LoginSuccess {
    pub user_id: Uuid,
    pub email: String,
    pub session: Session,
    pub token: String,
}

/// What a login request resolved to, lockouts and bad credentials aside.
#[derive(Debug)]
pub enum LoginOutcome {
    Success(Box<LoginSuccess>),
    /// Credentials were valid but the second factor is missing or wrong.
    TwoFactorRequired,
}

pub struct AuthenticationCoordinator {
    attempts: AttemptTracker,
    verifier: CredentialVerifier,
    totp: Arc<TotpEngine>,
    sessions: Arc<SessionRegistry>,
}

impl AuthenticationCoordinator {
    #[must_use]
    pub fn new(
        attempts: AttemptTracker,
        verifier: CredentialVerifier,
        totp: Arc<TotpEngine>,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            attempts,
            verifier,
            totp,
            sessions,
        }
    }

    /// Run one login request through the full gate.
    pub async fn login(&self, request: LoginRequestContext) -> Result<LoginOutcome, AuthError> {
        let email = normalize_email(&request.email);
        let ip = request.ip.as_deref().unwrap_or(UNKNOWN_IP);
        let key = AttemptKey::new(ip, &email);

        let check = self.attempts.check_login_allowed(&key);
        if !check.allowed {
            return Err(locked_error(&check));
        }

        let account = match self.verifier.verify(&email, &request.password).await? {
            CredentialOutcome::Verified(account) => account,
            CredentialOutcome::FederatedOnly => return Err(AuthError::FederatedSignIn),
            CredentialOutcome::Invalid => return Err(self.register_failure(&key)),
        };

        if self.totp.is_enabled(account.id) {
            let code = request
                .two_factor_code
                .as_deref()
                .map(str::trim)
                .filter(|code| !code.is_empty());
            let Some(code) = code else {
                return Ok(LoginOutcome::TwoFactorRequired);
            };
            match self.totp.verify(account.id, code) {
                Ok(()) => {}
                Err(AuthError::InvalidTotpCode | AuthError::InvalidBackupCode) => {
                    // A wrong second factor is a failed login attempt; it is
                    // reported through the same flow branch as a missing one.
                    let err = self.register_failure(&key);
                    if matches!(err, AuthError::LoginLocked { .. }) {
                        return Err(err);
                    }
                    return Ok(LoginOutcome::TwoFactorRequired);
                }
                Err(err) => return Err(err),
            }
        }

        self.attempts.clear_login_attempts(&key);

        let fingerprint = device::parse(request.user_agent.as_deref());
        let token = generate_session_token()?;
        let session = self.sessions.create(
            account.id,
            &fingerprint,
            NetworkInfo {
                ip: request.ip.clone(),
                country: request.country.clone(),
                city: request.city.clone(),
            },
            hash_session_token(&token),
        );

        info!(user_id = %account.id, session_id = %session.id, "login verified");
        Ok(LoginOutcome::Success(Box::new(LoginSuccess {
            user_id: account.id,
            email: account.email,
            session,
            token,
        })))
    }

    fn register_failure(&self, key: &AttemptKey) -> AuthError {
        let outcome = self.attempts.record_failed_attempt(key);
        warn!(
            remaining = outcome.remaining_attempts,
            locked = outcome.locked,
            "failed login attempt"
        );
        if outcome.locked {
            AuthError::LoginLocked {
                locked_until_ms: outcome.locked_until_ms.unwrap_or_default(),
                retry_after_ms: outcome.lockout_duration_ms.unwrap_or_default(),
            }
        } else {
            AuthError::AuthenticationFailed {
                remaining_attempts: outcome.remaining_attempts,
            }
        }
    }
}

fn locked_error(check: &LoginCheck) -> AuthError {
    AuthError::LoginLocked {
        locked_until_ms: check.locked_until_ms.unwrap_or_default(),
        retry_after_ms: check.retry_after_ms.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }
}
