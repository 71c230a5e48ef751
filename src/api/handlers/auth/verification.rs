//! Credential verification.
//!
//! A credential selects exactly one strategy: no identity means the static shared
//! secret, an identity means the external identity service. There is no fallback
//! from one to the other.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::{fmt, sync::Arc};
use subtle::ConstantTimeEq;
use tracing::{error, warn};

use crate::identity::IdentityProvider;

pub struct Credential {
    pub identity: Option<String>,
    pub secret: SecretString,
}

impl Credential {
    #[must_use]
    pub fn new(identity: Option<String>, secret: SecretString) -> Self {
        Self { identity, secret }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identity", &self.identity)
            .field("secret", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy<'a> {
    StaticSecret,
    ExternalIdentity { identity: &'a str },
}

impl Strategy<'_> {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StaticSecret => "static_secret",
            Self::ExternalIdentity { .. } => "external_identity",
        }
    }
}

/// Blank identities count as absent.
#[must_use]
pub fn select_strategy(credential: &Credential) -> Strategy<'_> {
    match credential.identity.as_deref().map(str::trim) {
        Some(identity) if !identity.is_empty() => Strategy::ExternalIdentity { identity },
        _ => Strategy::StaticSecret,
    }
}

/// Why a credential was rejected. Logged for the operator, never shown to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    WrongSecret,
    IdentityRejected,
    IdentityNotConfigured,
    IdentityUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Accepted,
    Rejected(RejectReason),
}

impl Verification {
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("static admin secret is not configured")]
    ConfigMissing,
}

#[derive(Clone, Default)]
pub struct CredentialVerifier {
    static_secret: Option<SecretString>,
    identity: Option<Arc<dyn IdentityProvider>>,
}

impl CredentialVerifier {
    /// A blank static secret is treated as missing.
    #[must_use]
    pub fn new(
        static_secret: Option<SecretString>,
        identity: Option<Arc<dyn IdentityProvider>>,
    ) -> Self {
        let static_secret =
            static_secret.filter(|secret| !secret.expose_secret().trim().is_empty());
        Self {
            static_secret,
            identity,
        }
    }

    #[must_use]
    pub fn has_static_secret(&self) -> bool {
        self.static_secret.is_some()
    }

    #[must_use]
    pub fn has_identity_service(&self) -> bool {
        self.identity.is_some()
    }

    /// # Errors
    /// Returns `VerifyError::ConfigMissing` when the static strategy is selected
    /// and no shared secret is configured.
    pub async fn verify(&self, credential: &Credential) -> Result<Verification, VerifyError> {
        match select_strategy(credential) {
            Strategy::StaticSecret => self.verify_static(&credential.secret),
            Strategy::ExternalIdentity { identity } => {
                Ok(self.verify_external(identity, &credential.secret).await)
            }
        }
    }

    fn verify_static(&self, secret: &SecretString) -> Result<Verification, VerifyError> {
        let Some(expected) = self.static_secret.as_ref() else {
            error!("Static admin secret is not configured; refusing static-secret login");
            return Err(VerifyError::ConfigMissing);
        };
        if secrets_match(secret, expected) {
            Ok(Verification::Accepted)
        } else {
            Ok(Verification::Rejected(RejectReason::WrongSecret))
        }
    }

    async fn verify_external(&self, identity: &str, secret: &SecretString) -> Verification {
        let Some(provider) = self.identity.as_ref() else {
            warn!("Identity service not configured; rejecting identity login");
            return Verification::Rejected(RejectReason::IdentityNotConfigured);
        };
        match provider.sign_in(identity, secret).await {
            Ok(outcome) if outcome.ok && outcome.session_active => Verification::Accepted,
            Ok(_) => Verification::Rejected(RejectReason::IdentityRejected),
            Err(err) => {
                warn!("Identity service unavailable during login: {err}");
                Verification::Rejected(RejectReason::IdentityUnavailable)
            }
        }
    }
}

impl fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("static_secret", &self.static_secret.as_ref().map(|_| "***"))
            .field("identity", &self.identity.is_some())
            .finish()
    }
}

// Digests first so the comparison time does not depend on the secret length.
fn secrets_match(provided: &SecretString, expected: &SecretString) -> bool {
    let provided = Sha256::digest(provided.expose_secret().as_bytes());
    let expected = Sha256::digest(expected.expose_secret().as_bytes());
    bool::from(provided.as_slice().ct_eq(expected.as_slice()))
}
