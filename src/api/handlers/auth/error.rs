use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::time::Duration;
use tracing::error;

use super::{types::LoginResponse, verification::VerifyError};

pub(crate) const INVALID_CREDENTIALS: &str = "Invalid credentials";
pub(crate) const LOGIN_UNAVAILABLE: &str = "Login is temporarily unavailable";
pub(crate) const INVALID_REQUEST: &str = "Invalid login request";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("too many failed login attempts, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },
    #[error("invalid credentials")]
    InvalidCredentials,
    /// The identity service could not answer; the attempt counts as a failure.
    #[error("identity service unavailable")]
    ExternalServiceUnavailable,
    #[error("malformed login request")]
    InvalidRequest,
    #[error(transparent)]
    Config(#[from] VerifyError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidCredentials | Self::ExternalServiceUnavailable => {
                StatusCode::UNAUTHORIZED
            }
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Whole minutes until the window ends, never less than one.
pub(crate) fn retry_minutes(retry_after: Duration) -> u64 {
    retry_after.as_secs().div_ceil(60).max(1)
}

fn retry_message(retry_after: Duration) -> String {
    match retry_minutes(retry_after) {
        1 => "Too many attempts. Try again in 1 minute.".to_string(),
        minutes => format!("Too many attempts. Try again in {minutes} minutes."),
    }
}

impl IntoResponse for AuthError {
    /// Callers only ever see generic messages; the reason stays in the log.
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::RateLimited { retry_after } => {
                let seconds = retry_after.as_secs().max(1);
                let mut response =
                    (status, Json(LoginResponse::failure(retry_message(retry_after))))
                        .into_response();
                if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                    response.headers_mut().insert(RETRY_AFTER, value);
                }
                response
            }
            Self::InvalidCredentials | Self::ExternalServiceUnavailable => {
                (status, Json(LoginResponse::failure(INVALID_CREDENTIALS))).into_response()
            }
            Self::InvalidRequest => {
                (status, Json(LoginResponse::failure(INVALID_REQUEST))).into_response()
            }
            Self::Config(err) => {
                error!("Login configuration error: {err}");
                (status, Json(LoginResponse::failure(LOGIN_UNAVAILABLE))).into_response()
            }
            Self::Internal(err) => {
                error!("Login failed unexpectedly: {err:#}");
                (status, Json(LoginResponse::failure(LOGIN_UNAVAILABLE))).into_response()
            }
        }
    }
}
