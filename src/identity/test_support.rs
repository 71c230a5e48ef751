//! In-process stand-in for the identity service used by unit tests.

use anyhow::Result;
use axum::{
    extract::Query,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use tokio::{net::TcpListener, task::JoinHandle};

use super::IdentityConfig;

const ANON_KEY: &str = "anon-test-key";

pub(crate) struct FakeIdentityService {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

#[derive(Deserialize)]
struct GrantQuery {
    grant_type: String,
}

#[derive(Deserialize)]
struct PasswordGrant {
    email: String,
    password: String,
}

impl FakeIdentityService {
    pub(crate) const EMAIL: &'static str = "admin@example.com";
    pub(crate) const PASSWORD: &'static str = "correct horse battery staple";
    pub(crate) const ACCESS_TOKEN: &'static str = "live-access-token";

    pub(crate) async fn start() -> Result<Self> {
        let app = Router::new()
            .route("/auth/v1/token", post(token))
            .route("/auth/v1/user", get(user));
        Self::serve(app).await
    }

    /// Every endpoint answers 503.
    pub(crate) async fn start_failing() -> Result<Self> {
        let app = Router::new()
            .route(
                "/auth/v1/token",
                post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
            )
            .route(
                "/auth/v1/user",
                get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
            );
        Self::serve(app).await
    }

    async fn serve(app: Router) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(Self { addr, task })
    }

    pub(crate) fn config(&self) -> IdentityConfig {
        let url = format!("http://{}", self.addr);
        match IdentityConfig::from_parts(
            Some(&url),
            Some(SecretString::from(ANON_KEY.to_string())),
        ) {
            Ok(Some(config)) => config,
            _ => panic!("fake identity service config must be valid"),
        }
    }
}

impl Drop for FakeIdentityService {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn has_anon_key(headers: &HeaderMap) -> bool {
    headers
        .get("apikey")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == ANON_KEY)
}

async fn token(
    headers: HeaderMap,
    Query(query): Query<GrantQuery>,
    Json(grant): Json<PasswordGrant>,
) -> impl IntoResponse {
    if !has_anon_key(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "no apikey"})));
    }
    if query.grant_type != "password"
        || grant.email != FakeIdentityService::EMAIL
        || grant.password != FakeIdentityService::PASSWORD
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "access_token": FakeIdentityService::ACCESS_TOKEN,
            "token_type": "bearer",
            "user": {"id": "user-1", "email": FakeIdentityService::EMAIL},
        })),
    )
}

async fn user(headers: HeaderMap) -> impl IntoResponse {
    let bearer = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    if !has_anon_key(&headers) || bearer != Some(FakeIdentityService::ACCESS_TOKEN) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid token"})));
    }
    (
        StatusCode::OK,
        Json(json!({"id": "user-1", "email": FakeIdentityService::EMAIL})),
    )
}
