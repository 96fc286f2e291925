//! Security-related CLI arguments: frontend origin, session TTL, TOTP
//! issuer, and the backup-code pepper.

use anyhow::{Context, Result};
use clap::{Arg, Command};

pub const ARG_FRONTEND_URL: &str = "frontend-url";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_TOTP_ISSUER: &str = "totp-issuer";
pub const ARG_BACKUP_CODE_PEPPER: &str = "backup-code-pepper";

#[derive(Clone, Debug)]
pub struct Options {
    pub frontend_base_url: String,
    pub session_ttl_seconds: u64,
    pub totp_issuer: String,
    pub backup_code_pepper: Option<String>,
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_URL)
                .long(ARG_FRONTEND_URL)
                .help("Frontend base URL; drives CORS and the cookie Secure flag")
                .env("JOBTRAIL_AUTH_FRONTEND_URL")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session lifetime in seconds")
                .env("JOBTRAIL_AUTH_SESSION_TTL_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(u64).range(60..)),
        )
        .arg(
            Arg::new(ARG_TOTP_ISSUER)
                .long(ARG_TOTP_ISSUER)
                .help("Issuer shown in authenticator apps")
                .env("JOBTRAIL_AUTH_TOTP_ISSUER")
                .default_value("JobTrail"),
        )
        .arg(
            Arg::new(ARG_BACKUP_CODE_PEPPER)
                .long(ARG_BACKUP_CODE_PEPPER)
                .help("Server-side pepper mixed into backup-code hashes")
                .env("JOBTRAIL_AUTH_BACKUP_CODE_PEPPER")
                .hide_env_values(true),
        )
}

/// Read the security options out of parsed matches.
///
/// # Errors
/// Returns an error if a defaulted argument is unexpectedly absent.
pub fn parse(matches: &clap::ArgMatches) -> Result<Options> {
    Ok(Options {
        frontend_base_url: matches
            .get_one::<String>(ARG_FRONTEND_URL)
            .cloned()
            .context("missing frontend-url")?,
        session_ttl_seconds: matches
            .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
            .copied()
            .context("missing session-ttl-seconds")?,
        totp_issuer: matches
            .get_one::<String>(ARG_TOTP_ISSUER)
            .cloned()
            .context("missing totp-issuer")?,
        backup_code_pepper: matches.get_one::<String>(ARG_BACKUP_CODE_PEPPER).cloned(),
    })
}
