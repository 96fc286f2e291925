//! Two-factor state models.
//!
//! Per-user state is a tagged variant, not a set of flags: absence of a
//! record is the unset state, and "enabled without a secret" is
//! unrepresentable.

use serde::Serialize;
use utoipa::ToSchema;

/// Secret issued by setup but not yet confirmed with a first valid code.
#[derive(Clone, Debug)]
pub(crate) struct PendingSecret {
    pub(crate) secret: Vec<u8>,
    /// Hashes of the codes handed out at setup; promoted on enable.
    pub(crate) backup_hashes: Vec<String>,
}

/// Confirmed secret with its consumable backup codes.
#[derive(Clone, Debug)]
pub(crate) struct EnabledSecret {
    pub(crate) secret: Vec<u8>,
    pub(crate) backup_codes: Vec<BackupCode>,
    /// Time step of the last accepted code; replays inside the accepted
    /// window are refused.
    pub(crate) last_used_step: Option<u64>,
}

#[derive(Clone, Debug)]
pub(crate) struct BackupCode {
    pub(crate) hash: String,
    pub(crate) consumed: bool,
}

#[derive(Clone, Debug)]
pub(crate) enum TwoFactorRecord {
    Pending(PendingSecret),
    Enabled(EnabledSecret),
}

impl EnabledSecret {
    pub(crate) fn backup_codes_remaining(&self) -> usize {
        self.backup_codes
            .iter()
            .filter(|code| !code.consumed)
            .count()
    }
}

/// Snapshot served by the status endpoint.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, ToSchema)]
pub struct TwoFactorStatus {
    pub enabled: bool,
    pub pending: bool,
    pub backup_codes_remaining: usize,
}

/// Artifacts returned once, at setup time. The plaintext backup codes and
/// the secret are never retrievable again.
#[derive(Clone, Debug)]
pub struct TwoFactorSetup {
    pub secret_base32: String,
    pub otpauth_url: String,
    /// PNG rendered by the provisioning-code renderer, as a data URL.
    pub qr_code_data_url: String,
    pub backup_codes: Vec<String>,
}
