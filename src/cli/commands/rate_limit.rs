use std::time::Duration;

use clap::{builder::BoolishValueParser, Arg, ArgAction, ArgMatches, Command};

use crate::api::RateLimitPolicy;

pub const ARG_WINDOW_SECONDS: &str = "rate-limit-window-seconds";
pub const ARG_MAX_FAILURES: &str = "rate-limit-max-failures";
pub const ARG_TRUST_PROXY_HEADERS: &str = "trust-proxy-headers";

/// Read the login rate-limit policy, falling back to five failures per 15 minutes.
#[must_use]
pub fn parse(matches: &ArgMatches) -> RateLimitPolicy {
    let defaults = RateLimitPolicy::default();
    RateLimitPolicy {
        window: matches
            .get_one::<u64>(ARG_WINDOW_SECONDS)
            .copied()
            .map_or(defaults.window, Duration::from_secs),
        max_failures: matches
            .get_one::<u32>(ARG_MAX_FAILURES)
            .copied()
            .unwrap_or(defaults.max_failures),
    }
}

/// Whether login callers are identified by proxy headers rather than the peer.
#[must_use]
pub fn trust_proxy_headers(matches: &ArgMatches) -> bool {
    matches.get_flag(ARG_TRUST_PROXY_HEADERS)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_WINDOW_SECONDS)
                .long(ARG_WINDOW_SECONDS)
                .help("Failed-login window in seconds, counted from the first failure")
                .env("STUDIOGATE_RATE_LIMIT_WINDOW_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_MAX_FAILURES)
                .long(ARG_MAX_FAILURES)
                .help("Failed logins allowed per window before lockout")
                .env("STUDIOGATE_RATE_LIMIT_MAX_FAILURES")
                .default_value("5")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_TRUST_PROXY_HEADERS)
                .long(ARG_TRUST_PROXY_HEADERS)
                .help("Identify login callers by X-Forwarded-For / X-Real-IP; only behind a proxy that overwrites them")
                .env("STUDIOGATE_TRUST_PROXY_HEADERS")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
}
