pub mod logging;
pub mod security;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Arg, ColorChoice, Command};

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("jobtrail-auth")
        .about("Account security service for JobTrail")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("JOBTRAIL_AUTH_PORT")
                .value_parser(clap::value_parser!(u16)),
        );

    let command = security::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "jobtrail-auth");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Account security service for JobTrail".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_port_and_security_args() {
        let command = new();
        let matches = command.get_matches_from(vec![
            "jobtrail-auth",
            "--port",
            "9000",
            "--frontend-url",
            "https://app.jobtrail.dev",
            "--session-ttl-seconds",
            "3600",
            "--totp-issuer",
            "JobTrail Staging",
        ]);

        assert_eq!(matches.get_one::<u16>("port").copied(), Some(9000));
        assert_eq!(
            matches.get_one::<String>(security::ARG_FRONTEND_URL).cloned(),
            Some("https://app.jobtrail.dev".to_string())
        );
        assert_eq!(
            matches
                .get_one::<u64>(security::ARG_SESSION_TTL_SECONDS)
                .copied(),
            Some(3600)
        );
        assert_eq!(
            matches.get_one::<String>(security::ARG_TOTP_ISSUER).cloned(),
            Some("JobTrail Staging".to_string())
        );
    }

    #[test]
    fn test_env_fallbacks() {
        temp_env::with_vars(
            [
                ("JOBTRAIL_AUTH_PORT", Some("443")),
                (
                    "JOBTRAIL_AUTH_FRONTEND_URL",
                    Some("https://app.jobtrail.dev"),
                ),
                ("JOBTRAIL_AUTH_BACKUP_CODE_PEPPER", Some("pepper")),
                ("JOBTRAIL_AUTH_LOG_LEVEL", Some("info")),
            ],
            || {
                let command = new();
                let matches = command.get_matches_from(vec!["jobtrail-auth"]);
                assert_eq!(matches.get_one::<u16>("port").copied(), Some(443));
                assert_eq!(
                    matches.get_one::<String>(security::ARG_FRONTEND_URL).cloned(),
                    Some("https://app.jobtrail.dev".to_string())
                );
                assert_eq!(
                    matches
                        .get_one::<String>(security::ARG_BACKUP_CODE_PEPPER)
                        .cloned(),
                    Some("pepper".to_string())
                );
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
            },
        );
    }

    #[test]
    fn test_log_level_env_values() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars([("JOBTRAIL_AUTH_LOG_LEVEL", Some(level))], || {
                let command = new();
                let matches = command.get_matches_from(vec!["jobtrail-auth"]);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_log_level_verbosity_flags() {
        temp_env::with_vars([("JOBTRAIL_AUTH_LOG_LEVEL", None::<String>)], || {
            for count in 1..4usize {
                let mut args = vec!["jobtrail-auth".to_string()];
                args.push(format!("-{}", "v".repeat(count)));

                let command = new();
                let matches = command.get_matches_from(args);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(count).ok()
                );
            }
        });
    }

    #[test]
    fn test_session_ttl_range_enforced() {
        let command = new();
        let result = command.try_get_matches_from(vec![
            "jobtrail-auth",
            "--session-ttl-seconds",
            "10",
        ]);
        assert_eq!(
            result.map_err(|e| e.kind()),
            Err(clap::error::ErrorKind::ValueValidation)
        );
    }
}
