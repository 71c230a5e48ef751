use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_IDENTITY_URL: &str = "identity-url";
pub const ARG_IDENTITY_ANON_KEY: &str = "identity-anon-key";

#[derive(Debug, Clone, Default)]
pub struct Options {
    pub url: Option<String>,
    pub anon_key: Option<SecretString>,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        Self {
            url: get_non_empty(ARG_IDENTITY_URL),
            anon_key: get_non_empty(ARG_IDENTITY_ANON_KEY).map(SecretString::from),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_IDENTITY_URL)
                .long(ARG_IDENTITY_URL)
                .help("Identity service base URL (Supabase/GoTrue compatible)")
                .long_help(
                    "Identity service base URL (Supabase/GoTrue compatible).\n\nLogins that carry an email are checked against this service. Without it, such logins are rejected and only the static secret works.",
                )
                .env("STUDIOGATE_IDENTITY_URL")
                .requires(ARG_IDENTITY_ANON_KEY),
        )
        .arg(
            Arg::new(ARG_IDENTITY_ANON_KEY)
                .long(ARG_IDENTITY_ANON_KEY)
                .help("Public (anon) API key for the identity service")
                .env("STUDIOGATE_IDENTITY_ANON_KEY")
                .hide_env_values(true),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn command() -> Command {
        with_args(Command::new("studiogate"))
    }

    #[test]
    fn identity_is_optional() {
        temp_env::with_vars(
            [
                ("STUDIOGATE_IDENTITY_URL", None::<&str>),
                ("STUDIOGATE_IDENTITY_ANON_KEY", None),
            ],
            || {
                let matches = command().get_matches_from(["studiogate"]);
                let options = Options::parse(&matches);
                assert!(options.url.is_none());
                assert!(options.anon_key.is_none());
            },
        );
    }

    #[test]
    fn url_requires_anon_key() {
        temp_env::with_vars([("STUDIOGATE_IDENTITY_ANON_KEY", None::<&str>)], || {
            let result = command().try_get_matches_from([
                "studiogate",
                "--identity-url",
                "https://id.example.dev",
            ]);
            assert_eq!(
                result.map_err(|e| e.kind()).err(),
                Some(clap::error::ErrorKind::MissingRequiredArgument)
            );
        });
    }

    #[test]
    fn env_values_are_read() {
        temp_env::with_vars(
            [
                ("STUDIOGATE_IDENTITY_URL", Some("https://id.example.dev")),
                ("STUDIOGATE_IDENTITY_ANON_KEY", Some("anon-key")),
            ],
            || {
                let matches = command().get_matches_from(["studiogate"]);
                let options = Options::parse(&matches);
                assert_eq!(options.url.as_deref(), Some("https://id.example.dev"));
                assert_eq!(
                    options.anon_key.as_ref().map(ExposeSecret::expose_secret),
                    Some("anon-key")
                );
            },
        );
    }
}
