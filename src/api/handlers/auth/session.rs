//! Session endpoints: marker-based session check and logout.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{state::AuthState, types::SessionResponse, utils::bearer_token};
use crate::gate::{authorize, marker, ExternalSession, SessionEvidence};

#[utoipa::path(
    get,
    path = "/auth/session",
    params(
        ("Authorization" = Option<String>, Header, description = "Optional identity service bearer token")
    ),
    responses(
        (status = 200, description = "Caller is authorized", body = SessionResponse),
        (status = 204, description = "No authorized session")
    ),
    tag = "auth"
)]
pub async fn session(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let evidence = SessionEvidence {
        marker_present: marker::marker_present(&headers),
        external: external_session(&headers, &auth_state).await,
    };
    let mode = auth_state.config().hosting_mode();

    if authorize(mode, &evidence).is_authorized() {
        let response = SessionResponse {
            authenticated: true,
            hosting_mode: mode,
            idle_timeout_seconds: auth_state.config().idle_timeout().as_secs(),
        };
        (StatusCode::OK, Json(response)).into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

async fn external_session(headers: &HeaderMap, auth_state: &AuthState) -> ExternalSession {
    let Some(token) = bearer_token(headers) else {
        return ExternalSession::NotConsulted;
    };
    let Some(identity) = auth_state.identity() else {
        debug!("Bearer token presented but no identity service is configured");
        return ExternalSession::NotConsulted;
    };
    match identity.current_session(token).await {
        Ok(Some(_)) => ExternalSession::Live,
        Ok(None) => ExternalSession::Absent,
        Err(err) => {
            warn!("Identity service session check failed: {err}");
            ExternalSession::Unavailable
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Marker cleared")
    ),
    tag = "auth"
)]
pub async fn logout(auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let mut response_headers = HeaderMap::new();
    let secure = auth_state.config().session_cookie_secure();
    if let Ok(cookie) = HeaderValue::from_str(&marker::clear_server(secure)) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}
