//! `POST /auth/login`.
//!
//! Flow Overview:
//! 1) Derive the client identifier and reserve an attempt with the rate limiter
//!    before anything else; a locked-out caller never reaches credential
//!    verification.
//! 2) Verify the credential with the strategy it selects.
//! 3) Success clears the failure record and issues the `admin_session` marker;
//!    rejection records a failure. A configuration error gives the reservation
//!    back uncounted.

use axum::{
    extract::{ConnectInfo, Extension, Query},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{error, info, instrument, warn};

use super::{
    error::AuthError,
    rate_limit::RateLimitDecision,
    state::AuthState,
    types::{LoginQuery, LoginRequest, LoginResponse},
    utils::client_identifier,
    verification::{select_strategy, Credential, RejectReason, Verification},
};
use crate::gate::marker::{issue, Issuance};

/// A verified login: the marker cookie and where to send the operator.
#[derive(Debug)]
pub(crate) struct LoginSuccess {
    pub(crate) cookie: HeaderValue,
    pub(crate) redirect: String,
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    params(LoginQuery),
    responses(
        (status = 200, description = "Logged in; admin_session marker set", body = LoginResponse),
        (status = 400, description = "Malformed body", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = LoginResponse),
        (status = 429, description = "Too many failed attempts", body = LoginResponse,
            headers(("Retry-After" = u64, description = "Seconds until the window ends"))),
        (status = 500, description = "Login is misconfigured", body = LoginResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    auth_state: Extension<Arc<AuthState>>,
    query: Option<Query<LoginQuery>>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let client_id = client_identifier(
        &headers,
        peer.map(|ConnectInfo(addr)| addr),
        auth_state.config().trust_proxy_headers(),
    );
    let next = query.and_then(|Query(query)| query.next);
    let request = payload.map(|Json(request)| request);

    match attempt_login(&auth_state, &client_id, request, next.as_deref()).await {
        Ok(success) => {
            let mut response_headers = HeaderMap::new();
            response_headers.insert(SET_COOKIE, success.cookie);
            (
                StatusCode::OK,
                response_headers,
                Json(LoginResponse::success(success.redirect)),
            )
                .into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[instrument(skip(auth_state, request))]
pub(crate) async fn attempt_login(
    auth_state: &AuthState,
    client_id: &str,
    request: Option<LoginRequest>,
    next: Option<&str>,
) -> Result<LoginSuccess, AuthError> {
    let limiter = auth_state.limiter();
    match limiter.check(client_id).await {
        Ok(RateLimitDecision::Allowed) => {}
        Ok(RateLimitDecision::Limited { retry_after }) => {
            warn!(retry_after = retry_after.as_secs(), "Login rate limited");
            return Err(AuthError::RateLimited { retry_after });
        }
        Err(err) => {
            // Fail closed when the store cannot answer.
            error!("Rate limit check failed ({}): {err:#}", limiter.backend());
            return Err(AuthError::RateLimited {
                retry_after: limiter.policy().window,
            });
        }
    }

    let Some(request) = request else {
        record_failure(auth_state, client_id).await;
        return Err(AuthError::InvalidRequest);
    };
    let credential = Credential::from(request);
    let strategy = select_strategy(&credential).name();

    let verification = match auth_state.verifier().verify(&credential).await {
        Ok(verification) => verification,
        Err(err) => {
            if let Err(store_err) = limiter.release(client_id).await {
                error!("Failed to release login attempt: {store_err:#}");
            }
            return Err(err.into());
        }
    };

    match verification {
        Verification::Accepted => {
            if let Err(err) = limiter.record_success(client_id).await {
                error!("Failed to clear login attempts: {err:#}");
            }
            info!(strategy, "Login succeeded");
            let config = auth_state.config();
            let cookie = issue(Issuance::server(
                config.session_ttl(),
                config.session_cookie_secure(),
            ));
            let cookie = HeaderValue::from_str(&cookie)
                .map_err(|err| AuthError::Internal(anyhow::anyhow!("invalid cookie: {err}")))?;
            Ok(LoginSuccess {
                cookie,
                redirect: config.login_route().resolve_next(next),
            })
        }
        Verification::Rejected(reason) => {
            record_failure(auth_state, client_id).await;
            warn!(strategy, ?reason, "Login rejected");
            match reason {
                RejectReason::IdentityUnavailable => Err(AuthError::ExternalServiceUnavailable),
                RejectReason::WrongSecret
                | RejectReason::IdentityRejected
                | RejectReason::IdentityNotConfigured => Err(AuthError::InvalidCredentials),
            }
        }
    }
}

async fn record_failure(auth_state: &AuthState, client_id: &str) {
    if let Err(err) = auth_state.limiter().record_failure(client_id).await {
        error!("Failed to record login failure: {err:#}");
    }
}
