//! Login path, base path handling and the `next` redirect contract.

use url::form_urlencoded;

const DEFAULT_LOGIN_PATH: &str = "/login";
const DEFAULT_NEXT: &str = "/studio";

/// Where unauthorized callers are sent and where they return after login.
#[derive(Clone, Debug)]
pub struct LoginRoute {
    base_path: String,
    login_path: String,
    default_next: String,
}

impl Default for LoginRoute {
    fn default() -> Self {
        Self::new("", DEFAULT_LOGIN_PATH, DEFAULT_NEXT)
    }
}

impl LoginRoute {
    /// `base_path` is the prefix the site is mounted under (e.g. `/portfolio`), or empty.
    #[must_use]
    pub fn new(base_path: &str, login_path: &str, default_next: &str) -> Self {
        Self {
            base_path: normalize_base_path(base_path),
            login_path: ensure_leading_slash(login_path),
            default_next: ensure_leading_slash(default_next),
        }
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Prefix a site path with the base path; absolute URLs and already-prefixed
    /// paths are returned unchanged.
    #[must_use]
    pub fn with_base_path(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") || path.starts_with("//")
        {
            return path.to_string();
        }
        if self.base_path.is_empty() || has_prefix_segment(path, &self.base_path) {
            return ensure_leading_slash(path);
        }
        format!("{}{}", self.base_path, ensure_leading_slash(path))
    }

    /// Remove the base path from a request path so it can be classified.
    #[must_use]
    pub fn strip_base_path<'a>(&self, path: &'a str) -> &'a str {
        if self.base_path.is_empty() || !has_prefix_segment(path, &self.base_path) {
            return path;
        }
        match &path[self.base_path.len()..] {
            "" => "/",
            rest => rest,
        }
    }

    /// The login path is never protected, with or without a trailing slash.
    #[must_use]
    pub fn is_login_path(&self, path: &str) -> bool {
        trim_trailing_slash(path) == trim_trailing_slash(&self.login_path)
    }

    /// Location for an unauthorized request to `original_path` (base path stripped).
    #[must_use]
    pub fn redirect_for(&self, original_path: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("next", original_path)
            .finish();
        format!("{}?{query}", self.with_base_path(&self.login_path))
    }

    /// Location for the login page itself, without a return path.
    #[must_use]
    pub fn login_location(&self) -> String {
        self.with_base_path(&self.login_path)
    }

    /// Where to send the operator after a successful login.
    ///
    /// Only site-relative paths are honoured; anything else falls back to the
    /// default landing path so `next` cannot become an open redirect.
    #[must_use]
    pub fn resolve_next(&self, next: Option<&str>) -> String {
        let target = next
            .map(str::trim)
            .filter(|next| is_site_relative(next))
            .filter(|next| !self.is_login_path(self.strip_base_path(next)))
            .unwrap_or(self.default_next.as_str());
        self.with_base_path(target)
    }
}

fn is_site_relative(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        ensure_leading_slash(trimmed)
    }
}

fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn trim_trailing_slash(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

// `/portfolio` is a prefix of `/portfolio/x` but not of `/portfolios`.
fn has_prefix_segment(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
}
