//! Service configuration and shared request state.

use std::sync::Arc;

use crate::auth::attempts::AttemptTracker;
use crate::auth::verifier::{AccountStore, CredentialVerifier};
use crate::auth::AuthenticationCoordinator;
use crate::clock::Clock;
use crate::session::SessionRegistry;
use crate::totp::{TotpConfig, TotpEngine};

const DEFAULT_SESSION_TTL_SECONDS: u64 = 12 * 60 * 60;
const DEFAULT_TOTP_ISSUER: &str = "JobTrail";

#[derive(Clone, Debug)]
pub struct SecurityConfig {
    frontend_base_url: String,
    session_ttl_seconds: u64,
    totp_issuer: String,
    backup_code_pepper: Option<Arc<[u8]>>,
}

impl SecurityConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            totp_issuer: DEFAULT_TOTP_ISSUER.to_string(),
            backup_code_pepper: None,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_totp_issuer(mut self, issuer: String) -> Self {
        self.totp_issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_backup_code_pepper(mut self, pepper: Arc<[u8]>) -> Self {
        self.backup_code_pepper = Some(pepper);
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds
    }

    pub(crate) fn session_ttl_ms(&self) -> u64 {
        self.session_ttl_seconds.saturating_mul(1_000)
    }

    /// Only mark cookies secure when the frontend is served over HTTPS.
    pub(crate) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

/// Everything the auth handlers share, wired once at startup.
pub struct SecurityState {
    config: SecurityConfig,
    coordinator: AuthenticationCoordinator,
    totp: Arc<TotpEngine>,
    sessions: Arc<SessionRegistry>,
    accounts: Arc<dyn AccountStore>,
}

impl SecurityState {
    #[must_use]
    pub fn new(
        config: SecurityConfig,
        clock: Arc<dyn Clock>,
        accounts: Arc<dyn AccountStore>,
    ) -> Self {
        let mut totp_config = TotpConfig::new(config.totp_issuer.clone());
        if let Some(pepper) = &config.backup_code_pepper {
            totp_config = totp_config.with_pepper(pepper.clone());
        }
        let totp = Arc::new(TotpEngine::new(totp_config, clock.clone()));
        let sessions = Arc::new(SessionRegistry::new(config.session_ttl_ms(), clock.clone()));
        let coordinator = AuthenticationCoordinator::new(
            AttemptTracker::in_memory(clock),
            CredentialVerifier::new(accounts.clone()),
            totp.clone(),
            sessions.clone(),
        );
        Self {
            config,
            coordinator,
            totp,
            sessions,
            accounts,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    #[must_use]
    pub fn coordinator(&self) -> &AuthenticationCoordinator {
        &self.coordinator
    }

    #[must_use]
    pub fn totp(&self) -> &TotpEngine {
        &self.totp
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    #[must_use]
    pub fn accounts(&self) -> &dyn AccountStore {
        self.accounts.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_and_overrides() {
        let config = SecurityConfig::new("https://app.jobtrail.dev".to_string());
        assert_eq!(config.session_ttl_seconds(), DEFAULT_SESSION_TTL_SECONDS);
        assert!(config.session_cookie_secure());

        let config = config
            .with_session_ttl_seconds(3_600)
            .with_totp_issuer("JobTrail Staging".to_string());
        assert_eq!(config.session_ttl_seconds(), 3_600);
        assert_eq!(config.session_ttl_ms(), 3_600_000);
    }

    #[test]
    fn plain_http_frontend_gets_insecure_cookies() {
        let config = SecurityConfig::new("http://localhost:3000".to_string());
        assert!(!config.session_cookie_secure());
    }
}
