//! Script-visible cookie access for client views.

use std::{
    collections::BTreeMap,
    sync::{Mutex, PoisonError},
};

use crate::gate::marker::{clear_client, issue, marker_in_cookie_str, Issuance};

/// What a browser exposes as `document.cookie`.
pub trait MarkerJar: Send + Sync {
    /// Current `name=value; name=value` string.
    fn cookies(&self) -> String;
    /// Equivalent of assigning to `document.cookie`.
    fn write(&self, cookie: &str);
}

pub(crate) fn marker_present(jar: &dyn MarkerJar) -> bool {
    marker_in_cookie_str(&jar.cookies())
}

pub(crate) fn write_marker(jar: &dyn MarkerJar) {
    jar.write(&issue(Issuance::Client));
}

pub(crate) fn clear_marker(jar: &dyn MarkerJar) {
    jar.write(&clear_client());
}

/// In-memory cookie store with `document.cookie` assignment rules: attributes are
/// dropped, and an expired cookie removes the entry.
#[derive(Debug, Default)]
pub struct CookieDocument {
    cookies: Mutex<BTreeMap<String, String>>,
}

impl CookieDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the document from a `Cookie` header style string.
    #[must_use]
    pub fn from_cookie_str(cookies: &str) -> Self {
        let document = Self::new();
        for pair in cookies.split(';') {
            document.write(pair);
        }
        document
    }
}

impl MarkerJar for CookieDocument {
    fn cookies(&self) -> String {
        let cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn write(&self, cookie: &str) {
        let mut parts = cookie.split(';');
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let expired = parts.any(|attribute| {
            attribute
                .split_once('=')
                .is_some_and(|(key, value)| {
                    key.trim().eq_ignore_ascii_case("max-age")
                        && value.trim().parse::<i64>().is_ok_and(|age| age <= 0)
                })
        });

        let mut cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        if expired {
            cookies.remove(name);
        } else {
            cookies.insert(name.to_string(), value.trim().to_string());
        }
    }
}
