//! Time-based one-time passwords and backup codes.
//!
//! Flow overview:
//! 1) `setup` mints a secret and backup codes, parked as a pending record.
//! 2) `enable` confirms the first code and promotes the record.
//! 3) `verify` accepts a 6-digit code (±1 step drift, no replay inside a
//!    step) or consumes a single-use backup code.
//! 4) `disable` requires a fresh verification and returns to the unset
//!    state.
//!
//! Security boundaries:
//! - Plaintext backup codes exist only in the setup response; storage holds
//!   Argon2id hashes.
//! - The acceptance window is fixed at one step of drift either way.

pub(crate) mod backup;
mod engine;
mod models;

pub use engine::{TotpConfig, TotpEngine};
pub use models::{TwoFactorSetup, TwoFactorStatus};
