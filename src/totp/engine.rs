//! TOTP secret lifecycle and code verification.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::anyhow;
use totp_rs::{Algorithm, Secret, TOTP};
use tracing::info;
use uuid::Uuid;

use super::backup;
use super::models::{
    BackupCode, EnabledSecret, PendingSecret, TwoFactorRecord, TwoFactorSetup, TwoFactorStatus,
};
use crate::clock::Clock;
use crate::error::AuthError;

const TOTP_DIGITS: usize = 6;
const TOTP_STEP_SECONDS: u64 = 30;
/// Accepted clock drift, in steps, on either side of now. Widening this
/// weakens brute-force resistance; it must never change silently.
const TOTP_SKEW_STEPS: i64 = 1;

#[derive(Clone, Debug)]
pub struct TotpConfig {
    issuer: String,
    pepper: Option<Arc<[u8]>>,
}

impl TotpConfig {
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            pepper: None,
        }
    }

    /// Server-side pepper mixed into backup-code hashes.
    #[must_use]
    pub fn with_pepper(mut self, pepper: Arc<[u8]>) -> Self {
        self.pepper = Some(pepper);
        self
    }

    fn pepper(&self) -> Option<&[u8]> {
        self.pepper.as_deref()
    }
}

/// Two-factor state machine: `Unset -> Pending -> Enabled -> Unset`.
///
/// Exactly one record exists per user; re-setup from `Enabled` requires a
/// disable first.
pub struct TotpEngine {
    config: TotpConfig,
    clock: Arc<dyn Clock>,
    records: RwLock<HashMap<Uuid, TwoFactorRecord>>,
}

impl TotpEngine {
    #[must_use]
    pub fn new(config: TotpConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            records: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn status(&self, user_id: Uuid) -> TwoFactorStatus {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        match records.get(&user_id) {
            Some(TwoFactorRecord::Enabled(enabled)) => TwoFactorStatus {
                enabled: true,
                pending: false,
                backup_codes_remaining: enabled.backup_codes_remaining(),
            },
            Some(TwoFactorRecord::Pending(_)) => TwoFactorStatus {
                enabled: false,
                pending: true,
                backup_codes_remaining: 0,
            },
            None => TwoFactorStatus {
                enabled: false,
                pending: false,
                backup_codes_remaining: 0,
            },
        }
    }

    #[must_use]
    pub fn is_enabled(&self, user_id: Uuid) -> bool {
        self.status(user_id).enabled
    }

    /// Begin enrollment: mint a secret, park it as pending, and return the
    /// provisioning artifacts plus the only copy of the backup codes.
    /// A prior pending secret is replaced; an enabled one is refused.
    pub fn setup(&self, user_id: Uuid, account_name: &str) -> Result<TwoFactorSetup, AuthError> {
        {
            let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
            if matches!(records.get(&user_id), Some(TwoFactorRecord::Enabled(_))) {
                return Err(AuthError::TwoFactorAlreadyEnabled);
            }
        }

        let secret_bytes = Secret::generate_secret()
            .to_bytes()
            .map_err(|err| anyhow!("failed to generate TOTP secret: {err:?}"))?;
        let totp = self.build_totp(secret_bytes.clone(), account_name)?;

        let qr = totp
            .get_qr_base64()
            .map_err(|err| anyhow!("failed to render provisioning code: {err}"))?;
        let codes = backup::generate(self.config.pepper())?;

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if matches!(records.get(&user_id), Some(TwoFactorRecord::Enabled(_))) {
            return Err(AuthError::TwoFactorAlreadyEnabled);
        }
        records.insert(
            user_id,
            TwoFactorRecord::Pending(PendingSecret {
                secret: secret_bytes,
                backup_hashes: codes.hashes,
            }),
        );

        Ok(TwoFactorSetup {
            secret_base32: totp.get_secret_base32(),
            otpauth_url: totp.get_url(),
            qr_code_data_url: format!("data:image/png;base64,{qr}"),
            backup_codes: codes.codes,
        })
    }

    /// Confirm enrollment with a first valid code. Promotes the pending
    /// secret and persists the backup-code hashes; on a bad code the state
    /// is left untouched.
    pub fn enable(&self, user_id: Uuid, code: &str) -> Result<(), AuthError> {
        let now_secs = self.clock.now_secs();
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let record = records.get_mut(&user_id);
        let Some(record) = record else {
            return Err(AuthError::TwoFactorNotEnabled);
        };

        let pending = match record {
            TwoFactorRecord::Enabled(_) => return Err(AuthError::TwoFactorAlreadyEnabled),
            TwoFactorRecord::Pending(pending) => pending,
        };

        let totp = self.build_totp(pending.secret.clone(), "account")?;
        let Some(step) = matched_step(&totp, code, now_secs) else {
            return Err(AuthError::InvalidTotpCode);
        };

        let secret = pending.secret.clone();
        let backup_codes: Vec<BackupCode> = pending
            .backup_hashes
            .iter()
            .map(|hash| BackupCode {
                hash: hash.clone(),
                consumed: false,
            })
            .collect();
        *record = TwoFactorRecord::Enabled(EnabledSecret {
            secret,
            backup_codes,
            // The enable code is spent; it must not authenticate a login too.
            last_used_step: Some(step),
        });
        info!(user_id = %user_id, "two-factor authentication enabled");
        Ok(())
    }

    /// Verify a second factor: a 6-digit TOTP code or a backup code.
    pub fn verify(&self, user_id: Uuid, code: &str) -> Result<(), AuthError> {
        let trimmed = code.trim();
        if is_totp_shaped(trimmed) {
            self.verify_totp(user_id, trimmed)
        } else {
            self.consume_backup_code(user_id, trimmed)
        }
    }

    /// Tear down two-factor auth. Requires a fresh successful `verify`;
    /// repeated calls after the first report "not enabled".
    pub fn disable(&self, user_id: Uuid, code: &str) -> Result<(), AuthError> {
        self.verify(user_id, code)?;
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.remove(&user_id);
        info!(user_id = %user_id, "two-factor authentication disabled");
        Ok(())
    }

    fn verify_totp(&self, user_id: Uuid, code: &str) -> Result<(), AuthError> {
        let now_secs = self.clock.now_secs();
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let Some(TwoFactorRecord::Enabled(enabled)) = records.get_mut(&user_id) else {
            return Err(AuthError::TwoFactorNotEnabled);
        };

        let totp = self.build_totp(enabled.secret.clone(), "account")?;
        let Some(step) = matched_step(&totp, code, now_secs) else {
            return Err(AuthError::InvalidTotpCode);
        };
        // A code authenticates at most once: refuse anything at or before
        // the last accepted step.
        if enabled.last_used_step.is_some_and(|used| step <= used) {
            return Err(AuthError::InvalidTotpCode);
        }
        enabled.last_used_step = Some(step);
        Ok(())
    }

    fn consume_backup_code(&self, user_id: Uuid, code: &str) -> Result<(), AuthError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let Some(TwoFactorRecord::Enabled(enabled)) = records.get_mut(&user_id) else {
            return Err(AuthError::TwoFactorNotEnabled);
        };

        for backup_code in &mut enabled.backup_codes {
            if backup_code.consumed {
                continue;
            }
            if backup::verify(code, &backup_code.hash, self.config.pepper())? {
                backup_code.consumed = true;
                info!(user_id = %user_id, "backup code consumed");
                return Ok(());
            }
        }
        Err(AuthError::InvalidBackupCode)
    }

    fn build_totp(&self, secret: Vec<u8>, account_name: &str) -> Result<TOTP, AuthError> {
        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            1,
            TOTP_STEP_SECONDS,
            secret,
            Some(self.config.issuer.clone()),
            account_name.to_string(),
        )
        .map_err(|err| AuthError::Internal(anyhow!("failed to build TOTP: {err}")))
    }
}

fn is_totp_shaped(code: &str) -> bool {
    code.len() == TOTP_DIGITS && code.bytes().all(|byte| byte.is_ascii_digit())
}

/// Find the time step within the drift tolerance whose code matches, oldest
/// first. Candidate generation is explicit so the acceptance window is
/// exactly ±`TOTP_SKEW_STEPS` steps.
fn matched_step(totp: &TOTP, code: &str, now_secs: u64) -> Option<u64> {
    let current = now_secs / TOTP_STEP_SECONDS;
    for offset in -TOTP_SKEW_STEPS..=TOTP_SKEW_STEPS {
        let Some(step) = current.checked_add_signed(offset) else {
            continue;
        };
        let expected = totp.generate(step * TOTP_STEP_SECONDS);
        if constant_time_eq(expected.as_bytes(), code.as_bytes()) {
            return Some(step);
        }
    }
    None
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const NOW_MS: u64 = 1_700_000_000_000;

    fn engine() -> (TotpEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(NOW_MS));
        let config = TotpConfig::new("JobTrail").with_pepper(Arc::from(&b"pepper"[..]));
        (TotpEngine::new(config, clock.clone()), clock)
    }

    fn code_for(setup: &TwoFactorSetup, at_secs: u64) -> String {
        let secret = Secret::Encoded(setup.secret_base32.clone())
            .to_bytes()
            .unwrap();
        let totp = TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            1,
            TOTP_STEP_SECONDS,
            secret,
            Some("JobTrail".to_string()),
            "account".to_string(),
        )
        .unwrap();
        totp.generate(at_secs)
    }

    fn enabled_engine() -> (TotpEngine, Arc<ManualClock>, Uuid, TwoFactorSetup) {
        let (engine, clock) = engine();
        let user_id = Uuid::new_v4();
        let setup = engine.setup(user_id, "user@example.com").unwrap();
        let code = code_for(&setup, clock.now_ms() / 1_000);
        engine.enable(user_id, &code).unwrap();
        (engine, clock, user_id, setup)
    }

    #[test]
    fn setup_returns_artifacts_and_parks_pending() {
        let (engine, _clock) = engine();
        let user_id = Uuid::new_v4();

        let setup = engine.setup(user_id, "user@example.com").unwrap();
        assert!(setup.otpauth_url.starts_with("otpauth://totp/"));
        assert!(setup.qr_code_data_url.starts_with("data:image/png;base64,"));
        assert_eq!(setup.backup_codes.len(), backup::BACKUP_CODE_COUNT);

        let status = engine.status(user_id);
        assert!(status.pending);
        assert!(!status.enabled);
    }

    #[test]
    fn setup_replaces_pending_but_not_enabled() {
        let (engine, clock) = engine();
        let user_id = Uuid::new_v4();

        let first = engine.setup(user_id, "user@example.com").unwrap();
        let second = engine.setup(user_id, "user@example.com").unwrap();
        assert_ne!(first.secret_base32, second.secret_base32);

        // A code for the replaced secret no longer enables.
        let stale = code_for(&first, clock.now_ms() / 1_000);
        let fresh = code_for(&second, clock.now_ms() / 1_000);
        if stale != fresh {
            assert!(matches!(
                engine.enable(user_id, &stale),
                Err(AuthError::InvalidTotpCode)
            ));
        }
        engine.enable(user_id, &fresh).unwrap();

        assert!(matches!(
            engine.setup(user_id, "user@example.com"),
            Err(AuthError::TwoFactorAlreadyEnabled)
        ));
    }

    #[test]
    fn enable_requires_valid_code_and_flips_state() {
        let (engine, clock) = engine();
        let user_id = Uuid::new_v4();
        let setup = engine.setup(user_id, "user@example.com").unwrap();

        assert!(matches!(
            engine.enable(user_id, "000000"),
            Err(AuthError::InvalidTotpCode)
        ));
        assert!(engine.status(user_id).pending);

        let code = code_for(&setup, clock.now_ms() / 1_000);
        engine.enable(user_id, &code).unwrap();

        let status = engine.status(user_id);
        assert!(status.enabled);
        assert_eq!(status.backup_codes_remaining, backup::BACKUP_CODE_COUNT);
    }

    #[test]
    fn enable_without_setup_reports_not_enabled() {
        let (engine, _clock) = engine();
        assert!(matches!(
            engine.enable(Uuid::new_v4(), "123456"),
            Err(AuthError::TwoFactorNotEnabled)
        ));
    }

    #[test]
    fn verify_accepts_drift_of_one_step() {
        let (engine, clock, user_id, setup) = enabled_engine();
        let now_secs = clock.now_ms() / 1_000;

        // Client clock one step ahead of the server.
        clock.advance_ms(TOTP_STEP_SECONDS * 1_000);
        let ahead = code_for(&setup, now_secs + 2 * TOTP_STEP_SECONDS);
        engine.verify(user_id, &ahead).unwrap();
    }

    #[test]
    fn verify_rejects_two_steps_of_drift() {
        let (engine, clock, user_id, setup) = enabled_engine();
        let now_secs = clock.now_ms() / 1_000;
        clock.advance_ms(10 * TOTP_STEP_SECONDS * 1_000);

        let stale = code_for(&setup, now_secs + 7 * TOTP_STEP_SECONDS);
        assert!(matches!(
            engine.verify(user_id, &stale),
            Err(AuthError::InvalidTotpCode)
        ));
    }

    #[test]
    fn same_code_never_authenticates_twice() {
        let (engine, clock, user_id, setup) = enabled_engine();

        clock.advance_ms(TOTP_STEP_SECONDS * 1_000);
        let code = code_for(&setup, clock.now_ms() / 1_000);
        engine.verify(user_id, &code).unwrap();
        assert!(matches!(
            engine.verify(user_id, &code),
            Err(AuthError::InvalidTotpCode)
        ));
    }

    #[test]
    fn enable_code_cannot_be_replayed_at_login() {
        let (engine, clock) = engine();
        let user_id = Uuid::new_v4();
        let setup = engine.setup(user_id, "user@example.com").unwrap();
        let code = code_for(&setup, clock.now_ms() / 1_000);
        engine.enable(user_id, &code).unwrap();

        assert!(matches!(
            engine.verify(user_id, &code),
            Err(AuthError::InvalidTotpCode)
        ));
    }

    #[test]
    fn backup_codes_are_single_use() {
        let (engine, _clock, user_id, setup) = enabled_engine();
        let code = setup.backup_codes[0].clone();

        engine.verify(user_id, &code).unwrap();
        assert_eq!(
            engine.status(user_id).backup_codes_remaining,
            backup::BACKUP_CODE_COUNT - 1
        );
        assert!(matches!(
            engine.verify(user_id, &code),
            Err(AuthError::InvalidBackupCode)
        ));
    }

    #[test]
    fn backup_codes_accept_loose_formatting() {
        let (engine, _clock, user_id, setup) = enabled_engine();
        let loose = setup.backup_codes[1].replace('-', " ").to_lowercase();
        engine.verify(user_id, &loose).unwrap();
    }

    #[test]
    fn disable_requires_fresh_verification() {
        let (engine, clock, user_id, setup) = enabled_engine();

        assert!(matches!(
            engine.disable(user_id, "000000"),
            Err(AuthError::InvalidTotpCode)
        ));
        assert!(engine.is_enabled(user_id));

        clock.advance_ms(TOTP_STEP_SECONDS * 1_000);
        let code = code_for(&setup, clock.now_ms() / 1_000);
        engine.disable(user_id, &code).unwrap();
        assert!(!engine.is_enabled(user_id));

        // Further disables are a no-op failure, not an error cascade.
        assert!(matches!(
            engine.disable(user_id, &code),
            Err(AuthError::TwoFactorNotEnabled)
        ));
    }

    #[test]
    fn disable_retires_backup_codes() {
        let (engine, clock, user_id, setup) = enabled_engine();

        clock.advance_ms(TOTP_STEP_SECONDS * 1_000);
        let code = code_for(&setup, clock.now_ms() / 1_000);
        engine.disable(user_id, &code).unwrap();

        // Re-enroll: old backup codes must not authenticate.
        let new_setup = engine.setup(user_id, "user@example.com").unwrap();
        let enable_code = code_for(&new_setup, clock.now_ms() / 1_000);
        engine.enable(user_id, &enable_code).unwrap();
        assert!(matches!(
            engine.verify(user_id, &setup.backup_codes[2]),
            Err(AuthError::InvalidBackupCode)
        ));
    }
}
