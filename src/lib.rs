//! # JobTrail Account Security Core
//!
//! `jobtrail-auth` is the account security service behind the JobTrail
//! application tracker. It gates every other feature with three concerns:
//!
//! ## Brute-force defense
//!
//! Failed logins are counted per (client IP, normalized email) key. Five
//! failures inside a 15-minute window lock the key for 30 minutes, doubling
//! per repeated lockout cycle up to 24 hours. The counters live behind a
//! narrow keyed-store trait; the bundled in-memory store is single-process
//! only and must be swapped for a shared TTL-capable store before scaling
//! out horizontally.
//!
//! ## Two-factor authentication
//!
//! TOTP (SHA-1, 6 digits, 30-second steps, one step of drift either way)
//! with single-use backup codes. Secrets move through
//! `Unset -> Pending -> Enabled`; a code never authenticates twice within
//! its time step, and backup codes are stored only as Argon2id hashes.
//!
//! ## Session lifecycle
//!
//! One record per signed-in device, fingerprinted from the user agent.
//! Sessions are listed with a read-time `is_current` flag, revoked
//! individually or in bulk, and the current session can only be ended by a
//! logout — never by the revoke path.
//!
//! Error messages deliberately collapse anything a caller could use to
//! enumerate accounts; only lockout state and remaining attempts surface.

pub mod api;
pub mod auth;
pub mod cli;
pub mod clock;
pub mod device;
pub mod error;
pub mod session;
pub mod totp;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
