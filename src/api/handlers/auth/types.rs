//! Request/response types for auth endpoints.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::verification::Credential;
use crate::gate::HostingMode;

/// Login body. `email`/`password` are accepted for older login forms.
#[derive(ToSchema, Deserialize)]
pub struct LoginRequest {
    #[serde(default, alias = "email")]
    pub identity: Option<String>,
    #[serde(alias = "password")]
    pub secret: String,
}

impl From<LoginRequest> for Credential {
    fn from(request: LoginRequest) -> Self {
        Self::new(request.identity, SecretString::from(request.secret))
    }
}

#[derive(ToSchema, IntoParams, Deserialize, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct LoginQuery {
    /// Site-relative path to return to after login.
    pub next: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

impl LoginResponse {
    #[must_use]
    pub fn success(redirect: String) -> Self {
        Self {
            success: true,
            message: None,
            redirect: Some(redirect),
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            redirect: None,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub hosting_mode: HostingMode,
    /// Inactivity window after which the client view signs out.
    pub idle_timeout_seconds: u64,
}
