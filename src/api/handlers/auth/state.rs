//! Auth state and configuration.

use std::{sync::Arc, time::Duration};

use super::{rate_limit::AttemptStore, verification::CredentialVerifier};
use crate::{
    gate::{marker::DEFAULT_SESSION_TTL, HostingMode, LoginRoute},
    identity::IdentityProvider,
    reconciler::DEFAULT_IDLE_TIMEOUT,
};

const DEFAULT_SITE_URL: &str = "http://localhost:3000";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    site_url: String,
    hosting_mode: HostingMode,
    session_ttl: Duration,
    idle_timeout: Duration,
    login: LoginRoute,
    trust_proxy_headers: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new(hosting_mode: HostingMode) -> Self {
        Self {
            site_url: DEFAULT_SITE_URL.to_string(),
            hosting_mode,
            session_ttl: DEFAULT_SESSION_TTL,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            login: LoginRoute::default(),
            trust_proxy_headers: false,
        }
    }

    #[must_use]
    pub fn with_site_url(mut self, site_url: String) -> Self {
        self.site_url = site_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_login_route(mut self, login: LoginRoute) -> Self {
        self.login = login;
        self
    }

    /// Key rate limits on `X-Forwarded-For` / `X-Real-IP` instead of the peer.
    #[must_use]
    pub fn with_trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    #[must_use]
    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    #[must_use]
    pub fn hosting_mode(&self) -> HostingMode {
        self.hosting_mode
    }

    #[must_use]
    pub fn login_route(&self) -> &LoginRoute {
        &self.login
    }

    /// Advertised to clients so their reconciler signs out on the same schedule.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub(super) fn trust_proxy_headers(&self) -> bool {
        self.trust_proxy_headers
    }

    pub(super) fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub(super) fn session_cookie_secure(&self) -> bool {
        self.site_url.starts_with("https://")
    }
}

pub struct AuthState {
    config: AuthConfig,
    limiter: Arc<dyn AttemptStore>,
    verifier: CredentialVerifier,
    identity: Option<Arc<dyn IdentityProvider>>,
}

impl AuthState {
    /// The verifier and the session endpoint share one identity provider.
    #[must_use]
    pub fn new(
        config: AuthConfig,
        limiter: Arc<dyn AttemptStore>,
        static_secret: Option<secrecy::SecretString>,
        identity: Option<Arc<dyn IdentityProvider>>,
    ) -> Self {
        let verifier = CredentialVerifier::new(static_secret, identity.clone());
        Self {
            config,
            limiter,
            verifier,
            identity,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn limiter(&self) -> &dyn AttemptStore {
        self.limiter.as_ref()
    }

    pub(crate) fn verifier(&self) -> &CredentialVerifier {
        &self.verifier
    }

    pub(crate) fn identity(&self) -> Option<&dyn IdentityProvider> {
        self.identity.as_deref()
    }
}
