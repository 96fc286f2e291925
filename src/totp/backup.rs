//! Single-use backup codes for two-factor recovery.
//!
//! Codes are generated once in plaintext, handed to the caller, and stored
//! only as Argon2id hashes (optionally peppered). The alphabet omits the
//! easily confused characters 0/O and 1/I.

use anyhow::{anyhow, Context, Result};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use rand::RngCore;

pub(crate) const BACKUP_CODE_COUNT: usize = 10;
const BACKUP_CODE_LEN: usize = 12;
const BACKUP_CODE_GROUP_SIZE: usize = 4;
const BACKUP_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// A freshly generated batch: plaintext codes for the caller, hashes for
/// storage. The plaintext never outlives the setup response.
#[derive(Debug)]
pub(crate) struct BackupCodeSet {
    pub(crate) codes: Vec<String>,
    pub(crate) hashes: Vec<String>,
}

pub(crate) fn generate(pepper: Option<&[u8]>) -> Result<BackupCodeSet> {
    let mut rng = OsRng;
    let mut codes = Vec::with_capacity(BACKUP_CODE_COUNT);
    let mut hashes = Vec::with_capacity(BACKUP_CODE_COUNT);
    for _ in 0..BACKUP_CODE_COUNT {
        let code = generate_code(&mut rng);
        hashes.push(hash_code(&code, pepper)?);
        codes.push(code);
    }
    Ok(BackupCodeSet { codes, hashes })
}

/// Strip separators, uppercase, and validate shape and alphabet.
pub(crate) fn normalize(input: &str) -> Result<String> {
    let normalized: String = input
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_uppercase())
        .collect();

    if normalized.len() != BACKUP_CODE_LEN {
        return Err(anyhow!("invalid backup code length"));
    }
    if !normalized
        .as_bytes()
        .iter()
        .all(|ch| BACKUP_CODE_ALPHABET.contains(ch))
    {
        return Err(anyhow!("invalid backup code characters"));
    }
    Ok(normalized)
}

/// Group a normalized code for display, e.g. `ABCD-EFGH-JKLM`.
pub(crate) fn format_grouped(normalized: &str) -> Result<String> {
    if normalized.len() != BACKUP_CODE_LEN {
        return Err(anyhow!("invalid backup code length"));
    }
    let mut out = String::with_capacity(BACKUP_CODE_LEN + 2);
    for (idx, chunk) in normalized
        .as_bytes()
        .chunks(BACKUP_CODE_GROUP_SIZE)
        .enumerate()
    {
        if idx > 0 {
            out.push('-');
        }
        out.push_str(std::str::from_utf8(chunk).context("invalid backup code chunk")?);
    }
    Ok(out)
}

pub(crate) fn verify(code: &str, stored_hash: &str, pepper: Option<&[u8]>) -> Result<bool> {
    let Ok(normalized) = normalize(code) else {
        return Ok(false);
    };
    let parsed =
        PasswordHash::new(stored_hash).map_err(|_| anyhow!("invalid backup code hash"))?;
    Ok(hasher(pepper)?
        .verify_password(normalized.as_bytes(), &parsed)
        .is_ok())
}

fn hash_code(code: &str, pepper: Option<&[u8]>) -> Result<String> {
    let normalized = normalize(code)?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher(pepper)?
        .hash_password(normalized.as_bytes(), &salt)
        .map_err(|_| anyhow!("failed to hash backup code"))?
        .to_string();
    Ok(hash)
}

fn hasher(pepper: Option<&[u8]>) -> Result<Argon2<'_>> {
    match pepper {
        Some(pepper) => Argon2::new_with_secret(
            pepper,
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            argon2::Params::default(),
        )
        .map_err(|_| anyhow!("failed to initialize Argon2id")),
        None => Ok(Argon2::default()),
    }
}

fn generate_code<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut raw = [0u8; BACKUP_CODE_LEN];
    rng.fill_bytes(&mut raw);
    let normalized: String = raw
        .iter()
        .map(|byte| {
            let idx = usize::from(*byte) % BACKUP_CODE_ALPHABET.len();
            BACKUP_CODE_ALPHABET[idx] as char
        })
        .collect();
    // Length is fixed above, so grouping cannot fail.
    format_grouped(&normalized).unwrap_or(normalized)
}
