use std::time::Duration;

use anyhow::Context;
use clap::{builder::ValueParser, Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

use crate::gate::{guard::DEFAULT_PROTECTED_PATTERN, HostingMode};

pub const ARG_HOSTING_MODE: &str = "hosting-mode";
pub const ARG_ADMIN_SECRET: &str = "admin-secret";
pub const ARG_SITE_URL: &str = "site-url";
pub const ARG_BASE_PATH: &str = "base-path";
pub const ARG_LOGIN_PATH: &str = "login-path";
pub const ARG_DEFAULT_NEXT: &str = "default-next";
pub const ARG_PROTECTED_PATH: &str = "protected-path";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_IDLE_TIMEOUT_SECONDS: &str = "idle-timeout-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub hosting_mode: HostingMode,
    pub admin_secret: Option<SecretString>,
    pub site_url: String,
    pub base_path: String,
    pub login_path: String,
    pub default_next: String,
    pub protected_paths: Vec<String>,
    pub session_ttl: Duration,
    pub idle_timeout: Duration,
}

impl Options {
    /// Parse auth and routing arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the hosting mode is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let hosting_mode = matches
            .get_one::<HostingMode>(ARG_HOSTING_MODE)
            .copied()
            .with_context(|| format!("missing required argument: --{ARG_HOSTING_MODE}"))?;

        let get_string = |id: &str| matches.get_one::<String>(id).cloned().unwrap_or_default();
        let get_seconds = |id: &str| {
            Duration::from_secs(matches.get_one::<u64>(id).copied().unwrap_or_default())
        };

        // An empty env var is the same as not setting the secret at all.
        let admin_secret = matches
            .get_one::<String>(ARG_ADMIN_SECRET)
            .filter(|value| !value.trim().is_empty())
            .map(|value| SecretString::from(value.clone()));

        let protected_paths = matches
            .get_many::<String>(ARG_PROTECTED_PATH)
            .map(|values| {
                values
                    .filter(|value| !value.trim().is_empty())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            hosting_mode,
            admin_secret,
            site_url: get_string(ARG_SITE_URL),
            base_path: get_string(ARG_BASE_PATH),
            login_path: get_string(ARG_LOGIN_PATH),
            default_next: get_string(ARG_DEFAULT_NEXT),
            protected_paths,
            session_ttl: get_seconds(ARG_SESSION_TTL_SECONDS),
            idle_timeout: get_seconds(ARG_IDLE_TIMEOUT_SECONDS),
        })
    }
}

fn hosting_mode_parser() -> ValueParser {
    ValueParser::from(|value: &str| value.parse::<HostingMode>())
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_session_args(command);
    with_route_args(command)
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_HOSTING_MODE)
                .long(ARG_HOSTING_MODE)
                .help("Deployment topology: server-trust or no-server-trust")
                .long_help(
                    "Deployment topology.\n\nserver-trust: this server guards protected paths and the admin_session marker authorizes.\nno-server-trust: static hosting, only a live identity-service session authorizes a protected view.",
                )
                .env("STUDIOGATE_HOSTING_MODE")
                .required(true)
                .value_parser(hosting_mode_parser()),
        )
        .arg(
            Arg::new(ARG_ADMIN_SECRET)
                .long(ARG_ADMIN_SECRET)
                .help("Static shared secret for logins without an identity")
                .env("STUDIOGATE_ADMIN_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Lifetime of the admin_session marker cookie in seconds")
                .env("STUDIOGATE_SESSION_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_IDLE_TIMEOUT_SECONDS)
                .long(ARG_IDLE_TIMEOUT_SECONDS)
                .help("Inactivity in seconds before a protected view signs out")
                .env("STUDIOGATE_IDLE_TIMEOUT_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

fn with_route_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SITE_URL)
                .long(ARG_SITE_URL)
                .help("Public site URL, used for the CORS origin and the cookie Secure flag")
                .env("STUDIOGATE_SITE_URL")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new(ARG_BASE_PATH)
                .long(ARG_BASE_PATH)
                .help("Path prefix the site is served under, for example /portfolio")
                .env("STUDIOGATE_BASE_PATH")
                .default_value(""),
        )
        .arg(
            Arg::new(ARG_LOGIN_PATH)
                .long(ARG_LOGIN_PATH)
                .help("Login page path, relative to the base path")
                .env("STUDIOGATE_LOGIN_PATH")
                .default_value("/login"),
        )
        .arg(
            Arg::new(ARG_DEFAULT_NEXT)
                .long(ARG_DEFAULT_NEXT)
                .help("Where to go after login when no safe next path is given")
                .env("STUDIOGATE_DEFAULT_NEXT")
                .default_value("/studio"),
        )
        .arg(
            Arg::new(ARG_PROTECTED_PATH)
                .long(ARG_PROTECTED_PATH)
                .help("Protected path pattern, repeatable (`:name` and `:name*` segments)")
                .env("STUDIOGATE_PROTECTED_PATHS")
                .value_delimiter(',')
                .action(ArgAction::Append)
                .default_value(DEFAULT_PROTECTED_PATTERN),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use secrecy::ExposeSecret;

    fn command() -> Command {
        with_args(Command::new("studiogate"))
    }

    #[test]
    fn defaults_follow_login_contract() -> Result<()> {
        temp_env::with_vars(
            [
                ("STUDIOGATE_HOSTING_MODE", None::<&str>),
                ("STUDIOGATE_ADMIN_SECRET", None),
                ("STUDIOGATE_PROTECTED_PATHS", None),
                ("STUDIOGATE_SITE_URL", None),
            ],
            || {
                let matches = command().try_get_matches_from([
                    "studiogate",
                    "--hosting-mode",
                    "server-trust",
                ])?;
                let options = Options::parse(&matches)?;
                assert_eq!(options.hosting_mode, HostingMode::ServerTrust);
                assert!(options.admin_secret.is_none());
                assert_eq!(options.site_url, "http://localhost:3000");
                assert_eq!(options.base_path, "");
                assert_eq!(options.login_path, "/login");
                assert_eq!(options.default_next, "/studio");
                assert_eq!(options.protected_paths, vec!["/studio/:path*".to_string()]);
                assert_eq!(options.session_ttl, Duration::from_secs(86_400));
                assert_eq!(options.idle_timeout, Duration::from_secs(1800));
                Ok(())
            },
        )
    }

    #[test]
    fn hosting_mode_is_required() {
        temp_env::with_vars([("STUDIOGATE_HOSTING_MODE", None::<&str>)], || {
            let result = command().try_get_matches_from(["studiogate"]);
            assert_eq!(
                result.map_err(|e| e.kind()).err(),
                Some(clap::error::ErrorKind::MissingRequiredArgument)
            );
        });
    }

    #[test]
    fn invalid_hosting_mode_is_rejected() {
        let result =
            command().try_get_matches_from(["studiogate", "--hosting-mode", "serverless"]);
        assert_eq!(
            result.map_err(|e| e.kind()).err(),
            Some(clap::error::ErrorKind::ValueValidation)
        );
    }

    #[test]
    fn env_overrides() -> Result<()> {
        temp_env::with_vars(
            [
                ("STUDIOGATE_HOSTING_MODE", Some("no-server-trust")),
                ("STUDIOGATE_ADMIN_SECRET", Some("letmein")),
                ("STUDIOGATE_BASE_PATH", Some("/portfolio")),
                ("STUDIOGATE_PROTECTED_PATHS", Some("/studio/:path*,/drafts")),
            ],
            || {
                let matches = command().try_get_matches_from(["studiogate"])?;
                let options = Options::parse(&matches)?;
                assert_eq!(options.hosting_mode, HostingMode::NoServerTrust);
                assert_eq!(
                    options.admin_secret.as_ref().map(ExposeSecret::expose_secret),
                    Some("letmein")
                );
                assert_eq!(options.base_path, "/portfolio");
                assert_eq!(
                    options.protected_paths,
                    vec!["/studio/:path*".to_string(), "/drafts".to_string()]
                );
                Ok(())
            },
        )
    }

    #[test]
    fn blank_admin_secret_is_unset() -> Result<()> {
        temp_env::with_vars([("STUDIOGATE_ADMIN_SECRET", Some("  "))], || {
            let matches = command().try_get_matches_from([
                "studiogate",
                "--hosting-mode",
                "server-trust",
            ])?;
            assert!(Options::parse(&matches)?.admin_secret.is_none());
            Ok(())
        })
    }

    #[test]
    fn repeated_protected_paths_accumulate() -> Result<()> {
        temp_env::with_vars([("STUDIOGATE_PROTECTED_PATHS", None::<&str>)], || {
            let matches = command().try_get_matches_from([
                "studiogate",
                "--hosting-mode",
                "server-trust",
                "--protected-path",
                "/studio",
                "--protected-path",
                "/drafts/:slug",
            ])?;
            assert_eq!(
                Options::parse(&matches)?.protected_paths,
                vec!["/studio".to_string(), "/drafts/:slug".to_string()]
            );
            Ok(())
        })
    }
}
