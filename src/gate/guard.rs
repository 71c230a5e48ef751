//! Request-time route guard for protected paths.
//!
//! The guard is synchronous and stateless: it looks at the request path and the
//! marker cookie, nothing else. No identity service calls happen here.
//!
//! Paths are classified in the form the static file service resolves them to, so
//! `/%73tudio`, `//studio` or `/./studio` are the same protected page as `/studio`.

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

use super::{
    decision::{authorize, HostingMode, SessionEvidence},
    marker::marker_present,
    redirect::LoginRoute,
};

pub const DEFAULT_PROTECTED_PATTERN: &str = "/studio/:path*";

/// Compiled protected path patterns.
///
/// Patterns use matcher syntax: `/studio/:path*` covers `/studio` and everything
/// below it, `/drafts/:id` covers exactly one segment, other segments are literal.
#[derive(Clone, Debug)]
pub struct ProtectedPaths {
    patterns: Vec<Regex>,
}

impl ProtectedPaths {
    /// # Errors
    /// Returns an error if a pattern is empty, relative, or has a wildcard that is
    /// not the last segment.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| compile_pattern(pattern.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(path))
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex> {
    let trimmed = pattern.trim();
    if !trimmed.starts_with('/') {
        return Err(anyhow!("protected path pattern must start with '/': {pattern}"));
    }

    let segments: Vec<&str> = trimmed
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    let mut source = String::from("^");
    for (index, segment) in segments.iter().enumerate() {
        if let Some(name) = segment.strip_prefix(':') {
            if name.ends_with('*') {
                if index + 1 != segments.len() {
                    return Err(anyhow!(
                        "wildcard segment must be last in protected path pattern: {pattern}"
                    ));
                }
                source.push_str("(?:/.*)?");
            } else {
                source.push_str("/[^/]+");
            }
        } else {
            source.push('/');
            source.push_str(&regex::escape(segment));
        }
    }
    source.push_str("/?$");

    Regex::new(&source).with_context(|| format!("invalid protected path pattern: {pattern}"))
}

/// Percent-decode a request path and resolve its segments: empty and `.` segments
/// are dropped, `..` pops (never above the root). A trailing slash is kept.
#[must_use]
pub fn canonical_path(raw: &str) -> String {
    let decoded = urlencoding::decode_binary(raw.as_bytes());
    let decoded = String::from_utf8_lossy(&decoded);

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }

    let mut path = format!("/{}", segments.join("/"));
    if decoded.ends_with('/') && !segments.is_empty() {
        path.push('/');
    }
    path
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GuardOutcome {
    Pass,
    Redirect(String),
}

#[derive(Clone, Debug)]
pub struct RouteGuard {
    mode: HostingMode,
    paths: ProtectedPaths,
    login: LoginRoute,
}

impl RouteGuard {
    #[must_use]
    pub fn new(mode: HostingMode, paths: ProtectedPaths, login: LoginRoute) -> Self {
        Self { mode, paths, login }
    }

    #[must_use]
    pub fn mode(&self) -> HostingMode {
        self.mode
    }

    /// Classify a request path (as received, base path included).
    #[must_use]
    pub fn evaluate(&self, request_path: &str, marker_present: bool) -> GuardOutcome {
        let canonical = canonical_path(request_path);
        let path = self.login.strip_base_path(&canonical);

        // Checked before the patterns so a broad pattern can never loop on login.
        if self.login.is_login_path(path) || !self.paths.matches(path) {
            return GuardOutcome::Pass;
        }

        let decision = authorize(self.mode, &SessionEvidence::marker_only(marker_present));
        if decision.is_authorized() {
            GuardOutcome::Pass
        } else {
            GuardOutcome::Redirect(self.login.redirect_for(path))
        }
    }
}

/// axum middleware wrapping the whole router (fallback included).
pub async fn route_guard(
    State(guard): State<Arc<RouteGuard>>,
    request: Request,
    next: Next,
) -> Response {
    let marker = marker_present(request.headers());
    match guard.evaluate(request.uri().path(), marker) {
        GuardOutcome::Pass => next.run(request).await,
        GuardOutcome::Redirect(location) => {
            debug!(
                path = request.uri().path(),
                "Redirecting unauthenticated request to login"
            );
            Redirect::temporary(&location).into_response()
        }
    }
}
