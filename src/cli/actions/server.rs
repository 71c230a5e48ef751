use crate::{
    api::{
        self, AttemptStore, AuthConfig, AuthState, MemoryAttemptStore, RateLimitPolicy,
    },
    gate::{HostingMode, LoginRoute, ProtectedPaths, RouteGuard},
    identity::{IdentityClient, IdentityConfig, IdentityProvider},
};
use anyhow::Result;
use secrecy::SecretString;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub static_dir: Option<PathBuf>,
    pub rate_limit: RateLimitPolicy,
    pub trust_proxy_headers: bool,
    pub hosting_mode: HostingMode,
    pub admin_secret: Option<SecretString>,
    pub site_url: String,
    pub base_path: String,
    pub login_path: String,
    pub default_next: String,
    pub protected_paths: Vec<String>,
    pub session_ttl: Duration,
    pub idle_timeout: Duration,
    pub identity_url: Option<String>,
    pub identity_anon_key: Option<SecretString>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the attempt store, identity client or route patterns cannot be
/// set up, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let limiter: Arc<dyn AttemptStore> = Arc::new(MemoryAttemptStore::new(args.rate_limit));

    let identity = identity_provider(args.identity_url.as_deref(), args.identity_anon_key)?;
    if args.admin_secret.is_none() && identity.is_none() {
        warn!("Neither an admin secret nor an identity service is configured: every login will fail");
    }

    let login = LoginRoute::new(&args.base_path, &args.login_path, &args.default_next);
    let paths = ProtectedPaths::new(&args.protected_paths)?;
    let guard = RouteGuard::new(args.hosting_mode, paths, login.clone());

    let config = AuthConfig::new(args.hosting_mode)
        .with_site_url(args.site_url)
        .with_session_ttl(args.session_ttl)
        .with_idle_timeout(args.idle_timeout)
        .with_trust_proxy_headers(args.trust_proxy_headers)
        .with_login_route(login);

    let auth_state = Arc::new(AuthState::new(config, limiter, args.admin_secret, identity));

    api::new(args.port, auth_state, guard, args.static_dir).await
}

fn identity_provider(
    url: Option<&str>,
    anon_key: Option<SecretString>,
) -> Result<Option<Arc<dyn IdentityProvider>>> {
    let Some(config) = IdentityConfig::from_parts(url, anon_key)? else {
        if url.is_some() {
            warn!("Identity service URL is a placeholder or has no anon key: email logins are disabled");
        }
        return Ok(None);
    };

    info!(url = %config.base_url(), "Identity service configured");
    let client: Arc<dyn IdentityProvider> = Arc::new(IdentityClient::new(&config)?);
    Ok(Some(client))
}

fn log_startup_args(args: &Args) {
    info!(
        port = args.port,
        hosting_mode = %args.hosting_mode,
        site_url = %args.site_url,
        base_path = %args.base_path,
        protected_paths = ?args.protected_paths,
        rate_limit_window_secs = args.rate_limit.window.as_secs(),
        rate_limit_max_failures = args.rate_limit.max_failures,
        trust_proxy_headers = args.trust_proxy_headers,
        static_secret = args.admin_secret.is_some(),
        "Starting studiogate"
    );
}
