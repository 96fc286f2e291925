//! Command-line argument dispatch and server initialization.
//!
//! Maps validated CLI arguments to the action to execute, currently only
//! the API server with its security configuration.

use anyhow::Result;

use crate::cli::actions::{server, Action};
use crate::cli::commands::security;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let security = security::parse(matches)?;

    Ok(Action::Server(server::Args {
        port,
        frontend_base_url: security.frontend_base_url,
        session_ttl_seconds: security.session_ttl_seconds,
        totp_issuer: security.totp_issuer,
        backup_code_pepper: security.backup_code_pepper,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::actions::Action;

    #[test]
    fn defaults_produce_a_server_action() {
        temp_env::with_vars(
            [
                ("JOBTRAIL_AUTH_PORT", None::<&str>),
                ("JOBTRAIL_AUTH_FRONTEND_URL", None),
                ("JOBTRAIL_AUTH_BACKUP_CODE_PEPPER", None),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["jobtrail-auth"]);
                let action = handler(&matches);
                match action {
                    Ok(Action::Server(args)) => {
                        assert_eq!(args.port, 8080);
                        assert_eq!(args.frontend_base_url, "http://localhost:3000");
                        assert_eq!(args.session_ttl_seconds, 43_200);
                        assert_eq!(args.totp_issuer, "JobTrail");
                        assert!(args.backup_code_pepper.is_none());
                    }
                    Err(err) => panic!("dispatch failed: {err}"),
                }
            },
        );
    }

    #[test]
    fn pepper_is_threaded_through() {
        temp_env::with_vars(
            [("JOBTRAIL_AUTH_BACKUP_CODE_PEPPER", Some("pepper"))],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["jobtrail-auth"]);
                match handler(&matches) {
                    Ok(Action::Server(args)) => {
                        assert_eq!(args.backup_code_pepper.as_deref(), Some("pepper"));
                    }
                    Err(err) => panic!("dispatch failed: {err}"),
                }
            },
        );
    }
}
