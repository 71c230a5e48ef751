//! Client-side session reconciliation for protected views.
//!
//! Flow Overview:
//! 1) On mount, gather the script-visible marker and (when an identity service is
//!    configured and a token is held) the identity service session.
//! 2) Decide with [`crate::gate::authorize`]; unauthorized views get a login
//!    redirect that preserves the current path.
//! 3) Authorized views keep an idle timer. Activity resets it; expiry clears the
//!    marker, drops the access token and emits an [`ViewNotice::IdleTimeout`].
//!
//! The hosting mode is explicit ([`HostingMode::from_build_env`] for client builds),
//! never guessed from the page host.

mod idle;
mod marker;

pub use idle::{ActivityEvent, IdleTimer, DEFAULT_IDLE_TIMEOUT};
pub use marker::{CookieDocument, MarkerJar};

use secrecy::{ExposeSecret, SecretString};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    gate::{authorize, ExternalSession, HostingMode, LoginRoute, SessionEvidence},
    identity::{IdentityError, IdentityProvider},
};

pub const IDLE_TIMEOUT_MESSAGE: &str = "Session timed out due to inactivity.";

#[derive(Debug, thiserror::Error)]
pub enum ClientLoginError {
    #[error("identity service not configured")]
    NotConfigured,
    #[error("invalid credentials")]
    Rejected,
    #[error(transparent)]
    Unavailable(#[from] IdentityError),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ViewNotice {
    IdleTimeout { message: String, redirect: String },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ViewState {
    Active,
    LoggedOut,
}

/// Browser-side session material: the cookie jar and the identity access token.
struct ClientSession {
    jar: Arc<dyn MarkerJar>,
    access_token: Mutex<Option<SecretString>>,
}

impl ClientSession {
    fn access_token(&self) -> Option<SecretString> {
        self.access_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_access_token(&self, token: Option<SecretString>) {
        *self
            .access_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn sign_out(&self) {
        marker::clear_marker(self.jar.as_ref());
        self.set_access_token(None);
    }
}

pub struct SessionReconciler {
    mode: HostingMode,
    identity: Option<Arc<dyn IdentityProvider>>,
    login: LoginRoute,
    idle_timeout: Duration,
    session: Arc<ClientSession>,
}

impl SessionReconciler {
    #[must_use]
    pub fn new(mode: HostingMode, jar: Arc<dyn MarkerJar>, login: LoginRoute) -> Self {
        Self {
            mode,
            identity: None,
            login,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            session: Arc::new(ClientSession {
                jar,
                access_token: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Resume with a token persisted by an earlier page load.
    #[must_use]
    pub fn with_access_token(self, token: SecretString) -> Self {
        self.session.set_access_token(Some(token));
        self
    }

    #[must_use]
    pub fn mode(&self) -> HostingMode {
        self.mode
    }

    /// Sign in directly against the identity service, then write the
    /// script-writable marker and keep the access token.
    ///
    /// # Errors
    /// Returns `NotConfigured` without an identity service, `Rejected` for bad
    /// credentials and `Unavailable` when the service cannot answer.
    pub async fn client_login(
        &self,
        identity: &str,
        secret: &SecretString,
    ) -> Result<(), ClientLoginError> {
        let Some(provider) = self.identity.as_ref() else {
            warn!("Identity service not configured; client login unavailable");
            return Err(ClientLoginError::NotConfigured);
        };
        let outcome = provider.sign_in(identity, secret).await?;
        if !(outcome.ok && outcome.session_active) {
            return Err(ClientLoginError::Rejected);
        }
        marker::write_marker(self.session.jar.as_ref());
        self.session.set_access_token(outcome.access_token);
        info!("Client login succeeded");
        Ok(())
    }

    /// Check authorization for the protected view at `path` (as shown in the
    /// address bar, base path included).
    pub async fn mount(&self, path: &str) -> MountOutcome {
        let evidence = SessionEvidence {
            marker_present: marker::marker_present(self.session.jar.as_ref()),
            external: self.external_session().await,
        };
        let decision = authorize(self.mode, &evidence);
        debug!(mode = %self.mode, ?evidence, ?decision, "Reconciled protected view");

        if decision.is_authorized() {
            MountOutcome::Authorized(ProtectedView::start(
                self.session.clone(),
                self.idle_timeout,
                self.login.login_location(),
            ))
        } else {
            warn!("Unauthorized access attempt; redirecting to login");
            MountOutcome::Redirect(self.login.redirect_for(self.login.strip_base_path(path)))
        }
    }

    async fn external_session(&self) -> ExternalSession {
        let Some(provider) = self.identity.as_ref() else {
            return ExternalSession::NotConsulted;
        };
        let Some(token) = self.session.access_token() else {
            return ExternalSession::Absent;
        };
        match provider.current_session(token.expose_secret()).await {
            Ok(Some(_)) => ExternalSession::Live,
            Ok(None) => ExternalSession::Absent,
            Err(err) => {
                warn!("Identity service session check failed: {err}");
                ExternalSession::Unavailable
            }
        }
    }
}

#[derive(Debug)]
pub enum MountOutcome {
    Authorized(ProtectedView),
    Redirect(String),
}

/// A mounted, authorized view. Dropping it (unmount) cancels the idle timer.
#[derive(Debug)]
pub struct ProtectedView {
    timer: IdleTimer,
    logged_out: Arc<AtomicBool>,
    notices: mpsc::UnboundedReceiver<ViewNotice>,
    session: Arc<ClientSession>,
    login_location: String,
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession").finish_non_exhaustive()
    }
}

impl ProtectedView {
    fn start(session: Arc<ClientSession>, idle_timeout: Duration, login_location: String) -> Self {
        let (tx, notices) = mpsc::unbounded_channel();
        let logged_out = Arc::new(AtomicBool::new(false));

        let timer = {
            let session = session.clone();
            let logged_out = logged_out.clone();
            let redirect = login_location.clone();
            IdleTimer::start(idle_timeout, move || {
                session.sign_out();
                logged_out.store(true, Ordering::SeqCst);
                info!("Session timed out due to inactivity");
                let _ = tx.send(ViewNotice::IdleTimeout {
                    message: IDLE_TIMEOUT_MESSAGE.to_string(),
                    redirect,
                });
            })
        };

        Self {
            timer,
            logged_out,
            notices,
            session,
            login_location,
        }
    }

    pub fn record_activity(&self, _event: ActivityEvent) {
        if self.state() == ViewState::Active {
            self.timer.reset();
        }
    }

    /// Feed a raw DOM event name; returns whether it counted as activity.
    pub fn record_dom_event(&self, name: &str) -> bool {
        match ActivityEvent::from_dom_event(name) {
            Some(event) => {
                self.record_activity(event);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn state(&self) -> ViewState {
        if self.logged_out.load(Ordering::SeqCst) {
            ViewState::LoggedOut
        } else {
            ViewState::Active
        }
    }

    /// Wait for the next notice; `None` once the view can no longer produce one.
    pub async fn next_notice(&mut self) -> Option<ViewNotice> {
        self.notices.recv().await
    }

    /// Explicit logout: stop the timer, clear the marker and token, and return
    /// where to navigate.
    #[must_use]
    pub fn logout(self) -> String {
        let Self {
            timer,
            session,
            login_location,
            ..
        } = self;
        timer.cancel();
        session.sign_out();
        login_location
    }
}
