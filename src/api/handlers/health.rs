use crate::{api::handlers::auth::AuthState, GIT_COMMIT_HASH};
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info_span, Instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    hosting_mode: String,
    rate_limit_store: String,
    rate_limit_backend: String,
    identity_service: String,
    static_secret: String,
}

fn configured(present: bool) -> String {
    if present { "configured" } else { "not_configured" }.to_string()
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Rate limit store is reachable", body = [Health]),
        (status = 503, description = "Rate limit store is unreachable", body = [Health])
    ),
    tag= "health"
)]
// axum handler for health
pub async fn health(method: Method, auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let limiter = auth_state.limiter();
    let ping_span = info_span!("rate_limit.ping", backend = limiter.backend());
    let result = match limiter.ping().instrument(ping_span).await {
        Ok(()) => Ok(()),
        Err(error) => {
            error!("Failed to ping rate limit store: {:#}", error);

            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    };

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        hosting_mode: auth_state.config().hosting_mode().to_string(),
        rate_limit_store: if result.is_ok() {
            "ok".to_string()
        } else {
            "error".to_string()
        },
        rate_limit_backend: limiter.backend().to_string(),
        identity_service: configured(auth_state.verifier().has_identity_service()),
        static_secret: configured(auth_state.verifier().has_static_secret()),
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);

            let mut headers = HeaderMap::new();

            headers.insert("X-App", x_app_header_value);

            headers
        })
        .map_err(|err| {
            error!("Failed to parse X-App header: {}", err);
        });

    let headers = headers.unwrap_or_else(|()| HeaderMap::new());

    if result.is_ok() {
        debug!("Rate limit store is healthy");
        (StatusCode::OK, headers, body)
    } else {
        debug!("Rate limit store is unhealthy");
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}
