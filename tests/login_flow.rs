use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        HeaderMap, Request, StatusCode,
    },
    routing::{get, post},
    Json, Router,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use studiogate::{
    api::{self, AuthConfig, AuthState, MemoryAttemptStore},
    gate::{guard::DEFAULT_PROTECTED_PATTERN, HostingMode, LoginRoute, ProtectedPaths, RouteGuard},
    identity::{IdentityClient, IdentityConfig, IdentityProvider},
};
use tokio::{net::TcpListener, task::JoinHandle};
use tower::ServiceExt;

const EMAIL: &str = "admin@example.com";
const PASSWORD: &str = "correct horse battery staple";
const ACCESS_TOKEN: &str = "live-access-token";
const ADMIN_SECRET: &str = "letmein";

struct IdentityStub {
    config: IdentityConfig,
    task: JoinHandle<()>,
}

impl Drop for IdentityStub {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn identity_stub() -> Result<IdentityStub> {
    let app = Router::new()
        .route(
            "/auth/v1/token",
            post(|Json(body): Json<Value>| async move {
                let email = body.get("email").and_then(Value::as_str);
                let password = body.get("password").and_then(Value::as_str);
                if email == Some(EMAIL) && password == Some(PASSWORD) {
                    (StatusCode::OK, Json(json!({"access_token": ACCESS_TOKEN})))
                } else {
                    (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"})))
                }
            }),
        )
        .route(
            "/auth/v1/user",
            get(|headers: HeaderMap| async move {
                let bearer = headers
                    .get(AUTHORIZATION)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.strip_prefix("Bearer "));
                if bearer == Some(ACCESS_TOKEN) {
                    (StatusCode::OK, Json(json!({"id": "user-1", "email": EMAIL})))
                } else {
                    (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid token"})))
                }
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let task = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    let config = IdentityConfig::from_parts(
        Some(&format!("http://{addr}")),
        Some(SecretString::from("anon-key".to_string())),
    )?
    .context("identity stub config")?;

    Ok(IdentityStub { config, task })
}

fn gateway(mode: HostingMode, identity: Option<&IdentityConfig>) -> Result<Router> {
    let identity = match identity {
        Some(config) => {
            let client: Arc<dyn IdentityProvider> = Arc::new(IdentityClient::new(config)?);
            Some(client)
        }
        None => None,
    };
    let login = LoginRoute::default();
    let state = Arc::new(AuthState::new(
        AuthConfig::new(mode)
            .with_login_route(login.clone())
            .with_trust_proxy_headers(true),
        Arc::new(MemoryAttemptStore::default()),
        Some(SecretString::from(ADMIN_SECRET.to_string())),
        identity,
    ));
    let guard = RouteGuard::new(
        mode,
        ProtectedPaths::new(&[DEFAULT_PROTECTED_PATTERN])?,
        login,
    );
    api::app(state, guard, None)
}

fn login_request(client: &str, body: &Value) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", client)
        .body(Body::from(serde_json::to_vec(body)?))?)
}

async fn json_body(response: axum::response::Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn marker_cookie(response: &axum::response::Response) -> Option<String> {
    response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

#[tokio::test]
async fn lockout_then_window_reset() -> Result<()> {
    let stub = identity_stub().await?;
    let app = gateway(HostingMode::ServerTrust, Some(&stub.config))?;
    let wrong = json!({"identity": EMAIL, "secret": "wrong"});

    for attempt in 1..=5 {
        let response = app.clone().oneshot(login_request("X", &wrong)?).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "attempt {attempt}");
        let body = json_body(response).await?;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!("Invalid credentials"));
    }

    // Correct credentials do not get past a locked window.
    let correct = json!({"identity": EMAIL, "secret": PASSWORD});
    let response = app.clone().oneshot(login_request("X", &correct)?).await?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().get("retry-after").is_some());
    let body = json_body(response).await?;
    assert_eq!(
        body["message"],
        json!("Too many attempts. Try again in 15 minutes.")
    );

    // Other callers keep their own budget.
    let response = app.clone().oneshot(login_request("Y", &wrong)?).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Jump the attempt-store clock, then go back to real time for the identity calls.
    tokio::time::pause();
    tokio::time::advance(Duration::from_secs(16 * 60)).await;
    tokio::time::resume();

    let response = app.clone().oneshot(login_request("X", &correct)?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = marker_cookie(&response);
    assert_eq!(cookie.as_deref(), Some("admin_session=true"));
    let body = json_body(response).await?;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["redirect"], json!("/studio"));

    // The success cleared the record: a fresh budget of five failures.
    for attempt in 1..=5 {
        let response = app.clone().oneshot(login_request("X", &wrong)?).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "attempt {attempt}");
    }
    let response = app.oneshot(login_request("X", &wrong)?).await?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    Ok(())
}

#[tokio::test]
async fn server_trust_static_login_opens_the_studio() -> Result<()> {
    let app = gateway(HostingMode::ServerTrust, None)?;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/studio/posts").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(LOCATION).and_then(|v| v.to_str().ok()),
        Some("/login?next=%2Fstudio%2Fposts")
    );

    // The login page itself is never redirected.
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/login").body(Body::empty())?)
        .await?;
    assert_ne!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let request = Request::builder()
        .method("POST")
        .uri("/auth/login?next=%2Fstudio%2Fposts")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&json!({"secret": ADMIN_SECRET}))?))?;
    let response = app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = marker_cookie(&response).context("marker cookie")?;
    assert_eq!(json_body(response).await?["redirect"], json!("/studio/posts"));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/studio/posts")
                .header(COOKIE, &cookie)
                .body(Body::empty())?,
        )
        .await?;
    assert_ne!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/session")
                .header(COOKIE, &cookie)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["authenticated"], json!(true));
    assert_eq!(body["hosting_mode"], json!("server-trust"));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/logout")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cleared = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(cleared.starts_with("admin_session=;"));
    assert!(cleared.contains("Max-Age=0"));
    Ok(())
}

#[tokio::test]
async fn no_server_trust_needs_a_live_identity_session() -> Result<()> {
    let stub = identity_stub().await?;
    let app = gateway(HostingMode::NoServerTrust, Some(&stub.config))?;

    // Without a guard the protected path is not redirected server-side.
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/studio").body(Body::empty())?)
        .await?;
    assert_ne!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    // A marker alone proves nothing here.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/session")
                .header(COOKIE, "admin_session=true")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/session")
                .header(AUTHORIZATION, "Bearer stale-token")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/session")
                .header(AUTHORIZATION, format!("Bearer {ACCESS_TOKEN}"))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["hosting_mode"], json!("no-server-trust"));
    assert_eq!(body["idle_timeout_seconds"], json!(1800));
    Ok(())
}
