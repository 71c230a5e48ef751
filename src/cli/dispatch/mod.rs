//! Map parsed CLI arguments to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{self, auth, identity, rate_limit};
use anyhow::Result;
use std::path::PathBuf;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);
    let static_dir = matches
        .get_one::<String>(commands::ARG_STATIC_DIR)
        .filter(|dir| !dir.trim().is_empty())
        .map(PathBuf::from);

    let auth_opts = auth::Options::parse(matches)?;
    let identity_opts = identity::Options::parse(matches);

    Ok(Action::Server(Args {
        port,
        static_dir,
        rate_limit: rate_limit::parse(matches),
        trust_proxy_headers: rate_limit::trust_proxy_headers(matches),
        hosting_mode: auth_opts.hosting_mode,
        admin_secret: auth_opts.admin_secret,
        site_url: auth_opts.site_url,
        base_path: auth_opts.base_path,
        login_path: auth_opts.login_path,
        default_next: auth_opts.default_next,
        protected_paths: auth_opts.protected_paths,
        session_ttl: auth_opts.session_ttl,
        idle_timeout: auth_opts.idle_timeout,
        identity_url: identity_opts.url,
        identity_anon_key: identity_opts.anon_key,
    }))
}
