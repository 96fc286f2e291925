//! Credential verification against the account store.
//!
//! The account store is an external collaborator consumed at its interface;
//! the in-memory implementation here backs tests and single-process
//! deployments. Password comparison is Argon2's constant-time verify, run
//! off the async runtime because it is deliberately expensive.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{anyhow, Context, Result};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use crate::error::AuthError;

/// Minimal account view this core needs. `password_hash` is `None` for
/// accounts that only sign in through an external identity provider.
#[derive(Clone, Debug)]
pub struct AccountRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: Option<String>,
}

/// Lookup interface over the credential/account store. Deleted accounts are
/// invisible through it.
pub trait AccountStore: Send + Sync {
    fn find_active_by_email(&self, email_normalized: &str) -> Option<AccountRecord>;
    fn find_active_by_id(&self, user_id: Uuid) -> Option<AccountRecord>;
}

/// Reference store keyed by normalized email.
#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<String, AccountRecord>>,
}

impl InMemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an account with an Argon2id-hashed password.
    pub fn insert_with_password(&self, email: &str, password: &str) -> Result<Uuid> {
        let record = AccountRecord {
            id: Uuid::new_v4(),
            email: super::normalize_email(email),
            password_hash: Some(hash_password(password)?),
        };
        let id = record.id;
        let mut accounts = self
            .accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        accounts.insert(record.email.clone(), record);
        Ok(id)
    }

    /// Insert an account without a password hash (external identity only).
    pub fn insert_federated(&self, email: &str) -> Uuid {
        let record = AccountRecord {
            id: Uuid::new_v4(),
            email: super::normalize_email(email),
            password_hash: None,
        };
        let id = record.id;
        let mut accounts = self
            .accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        accounts.insert(record.email.clone(), record);
        id
    }
}

impl AccountStore for InMemoryAccountStore {
    fn find_active_by_email(&self, email_normalized: &str) -> Option<AccountRecord> {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        accounts.get(email_normalized).cloned()
    }

    fn find_active_by_id(&self, user_id: Uuid) -> Option<AccountRecord> {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        accounts.values().find(|record| record.id == user_id).cloned()
    }
}

/// What a credential check concluded. The coordinator decides what each
/// case costs the caller; this type never reaches the wire.
#[derive(Debug)]
pub enum CredentialOutcome {
    Verified(AccountRecord),
    /// Account exists but has no password hash.
    FederatedOnly,
    /// Unknown account or wrong password; indistinguishable by design.
    Invalid,
}

/// Hash burned for unknown emails so the lookup miss costs the same as a
/// wrong password.
static DECOY_HASH: Lazy<String> =
    Lazy::new(|| hash_password("jobtrail-decoy-credential").unwrap_or_default());

pub struct CredentialVerifier {
    accounts: Arc<dyn AccountStore>,
}

impl CredentialVerifier {
    #[must_use]
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    /// Check an email/password pair. The email must already be normalized.
    /// The password itself is never logged or echoed.
    pub async fn verify(
        &self,
        email_normalized: &str,
        password: &SecretString,
    ) -> Result<CredentialOutcome, AuthError> {
        let account = self.accounts.find_active_by_email(email_normalized);

        let Some(account) = account else {
            verify_blocking(password, DECOY_HASH.clone()).await?;
            return Ok(CredentialOutcome::Invalid);
        };

        let Some(stored_hash) = account.password_hash.clone() else {
            return Ok(CredentialOutcome::FederatedOnly);
        };

        if verify_blocking(password, stored_hash).await? {
            Ok(CredentialOutcome::Verified(account))
        } else {
            Ok(CredentialOutcome::Invalid)
        }
    }
}

async fn verify_blocking(password: &SecretString, stored_hash: String) -> Result<bool, AuthError> {
    let password = password.expose_secret().to_owned();
    tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .context("password verification task failed")
        .map_err(AuthError::Internal)
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub(crate) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| anyhow!("failed to hash password"))
}
