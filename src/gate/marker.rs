//! The `admin_session` marker: issuing, clearing and detecting it.
//!
//! The marker is a bare flag. Server-issued markers are `HttpOnly` with a fixed
//! max-age; client-issued markers are script-writable session cookies that vanish
//! when the browser closes. Both use `SameSite=Strict` and `Path=/`.

use axum::http::{header::COOKIE, HeaderMap};
use std::time::Duration;

pub const SESSION_COOKIE_NAME: &str = "admin_session";
pub const SESSION_COOKIE_VALUE: &str = "true";
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Where the marker is being issued from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Issuance {
    /// A request-time server issues it through `Set-Cookie`.
    Server { max_age: Duration, secure: bool },
    /// Script running in the browser writes it to `document.cookie`.
    Client,
}

impl Issuance {
    #[must_use]
    pub const fn server(max_age: Duration, secure: bool) -> Self {
        Self::Server { max_age, secure }
    }
}

/// Cookie string that sets the marker.
#[must_use]
pub fn issue(issuance: Issuance) -> String {
    match issuance {
        Issuance::Server { max_age, secure } => {
            let mut cookie = format!(
                "{SESSION_COOKIE_NAME}={SESSION_COOKIE_VALUE}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
                max_age.as_secs()
            );
            if secure {
                cookie.push_str("; Secure");
            }
            cookie
        }
        Issuance::Client => {
            format!("{SESSION_COOKIE_NAME}={SESSION_COOKIE_VALUE}; Path=/; SameSite=Strict")
        }
    }
}

const EXPIRED: &str = "Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT";

/// `Set-Cookie` value that removes the marker, whichever path created it.
#[must_use]
pub fn clear_server(secure: bool) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Strict; {EXPIRED}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `document.cookie` assignment that removes a script-written marker.
#[must_use]
pub fn clear_client() -> String {
    format!("{SESSION_COOKIE_NAME}=; Path=/; SameSite=Strict; {EXPIRED}")
}

/// Whether any `Cookie` header carries `admin_session=true`.
#[must_use]
pub fn marker_present(headers: &HeaderMap) -> bool {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(marker_in_cookie_str)
}

/// Whether a `Cookie` header value (or `document.cookie` string) carries the marker.
#[must_use]
pub fn marker_in_cookie_str(cookies: &str) -> bool {
    cookies.split(';').any(|pair| {
        let mut parts = pair.trim().splitn(2, '=');
        let key = parts.next().map(str::trim);
        let value = parts.next().map(str::trim);
        key == Some(SESSION_COOKIE_NAME) && value == Some(SESSION_COOKIE_VALUE)
    })
}
