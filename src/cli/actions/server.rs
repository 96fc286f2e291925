use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::api;
use crate::api::state::SecurityConfig;
use crate::auth::verifier::{AccountStore, InMemoryAccountStore};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub frontend_base_url: String,
    pub session_ttl_seconds: u64,
    pub totp_issuer: String,
    pub backup_code_pepper: Option<String>,
}

/// Execute the server action.
///
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let mut config = SecurityConfig::new(args.frontend_base_url)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_totp_issuer(args.totp_issuer);
    if let Some(pepper) = args.backup_code_pepper {
        config = config.with_backup_code_pepper(Arc::from(pepper.into_bytes().into_boxed_slice()));
    }

    // The pepper stays out of the logs.
    debug!(
        port = args.port,
        frontend = %config.frontend_base_url(),
        session_ttl_seconds = config.session_ttl_seconds(),
        "starting with security config"
    );

    // The account store is an external collaborator; the in-memory
    // implementation backs single-process deployments and is populated by
    // the application layer, not by this service.
    let accounts: Arc<dyn AccountStore> = Arc::new(InMemoryAccountStore::new());

    api::serve(args.port, config, accounts).await
}
