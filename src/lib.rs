//! # Studiogate (authentication & session gateway)
//!
//! `studiogate` decides, for every request to the private studio of a personal
//! site, whether the caller is the single authorized operator.
//!
//! ## Trust anchors
//!
//! - **Static shared secret:** compared in constant time when a login carries no
//!   identity.
//! - **External identity service:** a Supabase/GoTrue-compatible account service,
//!   used when the login carries an identity (email).
//!
//! ## Hosting modes
//!
//! The hosting mode is explicit configuration, never inferred from the serving host:
//!
//! - **Server-trust:** a request-time server guards protected paths with the
//!   `admin_session` marker cookie. Either the marker or a live identity session
//!   authorizes a client view.
//! - **No-server-trust:** static hosting. The marker was never validated by a
//!   server, so only a live identity session authorizes.
//!
//! Both the request-time [`gate::guard`] and the client-side [`reconciler`] call the
//! same [`gate::authorize`] function.
//!
//! ## Rate limiting
//!
//! Failed logins are counted per client identifier in a 15 minute window; the
//! sixth attempt inside a window is refused before any credential check. The
//! store is process-local: instances do not share failure budgets.

pub mod api;
pub mod cli;
pub mod gate;
pub mod identity;
pub mod reconciler;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
