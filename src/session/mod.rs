//! Multi-device session records and lifecycle.
//!
//! The registry stores one record per signed-in device. The raw session
//! token lives only in the outer cookie (or bearer header); the registry
//! keeps its SHA-256 hash and never compares raw tokens.

mod models;
mod registry;

pub use models::{NetworkInfo, Session, SessionView};
pub use registry::SessionRegistry;

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Mint a session token for the outer cookie/bearer mechanism.
/// The raw value is handed to the caller once; storage only sees the hash.
pub fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a session token for storage and lookup.
#[must_use]
pub fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}
