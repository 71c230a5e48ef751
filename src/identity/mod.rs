//! External identity service client (Supabase/GoTrue-compatible REST API).
//!
//! Flow Overview:
//! - `sign_in` exchanges an email and password for an access token
//!   (`POST /auth/v1/token?grant_type=password`).
//! - `current_session` asks whether an access token still belongs to a live
//!   session (`GET /auth/v1/user`).
//!
//! Expected rejections come back as data; only transport failures and unexpected
//! statuses are [`IdentityError`]s, which callers treat as "not authorized".

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::{fmt, future::Future, pin::Pin, time::Duration};
use tracing::{debug, instrument};
use url::Url;

#[cfg(test)]
pub(crate) mod test_support;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const PLACEHOLDER_MARKER: &str = "placeholder";

pub type IdentityFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, IdentityError>> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity service unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),
    #[error("identity service returned unexpected status {0}")]
    UnexpectedStatus(StatusCode),
}

/// Outcome of a password sign-in.
pub struct SignIn {
    pub ok: bool,
    pub session_active: bool,
    pub access_token: Option<SecretString>,
}

impl SignIn {
    #[must_use]
    pub fn rejected() -> Self {
        Self {
            ok: false,
            session_active: false,
            access_token: None,
        }
    }

    #[must_use]
    pub fn accepted(access_token: SecretString) -> Self {
        Self {
            ok: true,
            session_active: true,
            access_token: Some(access_token),
        }
    }
}

impl fmt::Debug for SignIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignIn")
            .field("ok", &self.ok)
            .field("session_active", &self.session_active)
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// A live identity service session.
#[derive(Clone, Debug, Deserialize)]
pub struct IdentitySession {
    #[serde(rename = "id")]
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

pub trait IdentityProvider: Send + Sync {
    fn sign_in<'a>(&'a self, identity: &'a str, secret: &'a SecretString)
        -> IdentityFuture<'a, SignIn>;

    fn current_session<'a>(
        &'a self,
        access_token: &'a str,
    ) -> IdentityFuture<'a, Option<IdentitySession>>;
}

/// Identity service endpoint and public (anon) API key.
#[derive(Clone)]
pub struct IdentityConfig {
    base_url: Url,
    anon_key: SecretString,
}

impl IdentityConfig {
    /// Build the config from optional CLI values.
    ///
    /// Returns `Ok(None)` when either value is missing or the URL is a
    /// placeholder left over from a template `.env`.
    ///
    /// # Errors
    /// Returns an error if the URL is present but malformed.
    pub fn from_parts(url: Option<&str>, anon_key: Option<SecretString>) -> Result<Option<Self>> {
        let (Some(url), Some(anon_key)) = (url.map(str::trim), anon_key) else {
            return Ok(None);
        };
        if url.is_empty() || url.contains(PLACEHOLDER_MARKER) {
            return Ok(None);
        }
        if anon_key.expose_secret().trim().is_empty() {
            return Ok(None);
        }

        let mut base_url =
            Url::parse(url).with_context(|| format!("Invalid identity service URL: {url}"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(anyhow!("Identity service URL must be http(s): {url}"));
        }
        // Url::join replaces the last segment unless the base ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Some(Self { base_url, anon_key }))
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Invalid identity service endpoint: {path}"))
    }
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("base_url", &self.base_url.as_str())
            .field("anon_key", &"***")
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug)]
pub struct IdentityClient {
    client: Client,
    anon_key: SecretString,
    token_url: Url,
    user_url: Url,
}

impl IdentityClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &IdentityConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Error creating identity service client")?;

        Ok(Self {
            client,
            anon_key: config.anon_key.clone(),
            token_url: config.endpoint("auth/v1/token")?,
            user_url: config.endpoint("auth/v1/user")?,
        })
    }

    #[instrument(skip(self, secret))]
    async fn password_sign_in(
        &self,
        identity: &str,
        secret: &SecretString,
    ) -> Result<SignIn, IdentityError> {
        let response = self
            .client
            .post(self.token_url.clone())
            .query(&[("grant_type", "password")])
            .header("apikey", self.anon_key.expose_secret())
            .json(&json!({
                "email": identity,
                "password": secret.expose_secret(),
            }))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let token: TokenResponse = response.json().await?;
                Ok(SignIn::accepted(SecretString::from(token.access_token)))
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::UNPROCESSABLE_ENTITY => {
                debug!("Identity service rejected sign-in");
                Ok(SignIn::rejected())
            }
            status => Err(IdentityError::UnexpectedStatus(status)),
        }
    }

    #[instrument(skip_all)]
    async fn lookup_session(
        &self,
        access_token: &str,
    ) -> Result<Option<IdentitySession>, IdentityError> {
        let response = self
            .client
            .get(self.user_url.clone())
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(Some(response.json().await?)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status => Err(IdentityError::UnexpectedStatus(status)),
        }
    }
}

impl IdentityProvider for IdentityClient {
    fn sign_in<'a>(
        &'a self,
        identity: &'a str,
        secret: &'a SecretString,
    ) -> IdentityFuture<'a, SignIn> {
        Box::pin(self.password_sign_in(identity, secret))
    }

    fn current_session<'a>(
        &'a self,
        access_token: &'a str,
    ) -> IdentityFuture<'a, Option<IdentitySession>> {
        Box::pin(self.lookup_session(access_token))
    }
}
