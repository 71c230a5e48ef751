use crate::{
    api::handlers::health,
    gate::{route_guard, HostingMode, RouteGuard},
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    middleware::from_fn_with_state,
    routing::options,
    Extension, Router,
};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    services::ServeDir,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, warn, Span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

// Keep these internal to the crate while allowing CLI/server wiring to reference them.
pub(crate) mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use handlers::auth::{
    AttemptStore, AuthConfig, AuthState, MemoryAttemptStore, RateLimitPolicy,
};
pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Assemble the full application: documented routes, Swagger UI, the optional
/// static site and, in server-trust mode, the route guard around all of it.
///
/// # Errors
/// Returns an error if the site URL cannot be turned into a CORS origin.
pub fn app(
    auth_state: Arc<AuthState>,
    guard: RouteGuard,
    static_dir: Option<PathBuf>,
) -> Result<Router> {
    let origin = frontend_origin(auth_state.config().site_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(origin))
        .allow_credentials(true);

    let base_path = auth_state.config().login_route().base_path().to_string();

    // Build the router from OpenAPI-wired routes, then extend it with non-doc routes like
    // preflight-only `OPTIONS /health`.
    let (router, openapi) = router().split_for_parts();
    let mut app = router
        .route("/health", options(health::health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi));

    if let Some(dir) = static_dir {
        info!("Serving static site from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }

    let mut app = app.layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(cors)
            .layer(Extension(auth_state)),
    );

    if !base_path.is_empty() {
        app = Router::new().nest(&base_path, app);
    }

    match guard.mode() {
        HostingMode::ServerTrust => {
            info!("Route guard enabled for protected paths");
            Ok(app.layer(from_fn_with_state(Arc::new(guard), route_guard)))
        }
        HostingMode::NoServerTrust => {
            warn!(
                "No-server-trust mode: no request-time route guard, protected views rely on the client-side session reconciler"
            );
            Ok(app)
        }
    }
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    auth_state: Arc<AuthState>,
    guard: RouteGuard,
    static_dir: Option<PathBuf>,
) -> Result<()> {
    let hosting_mode = auth_state.config().hosting_mode();
    let app = app(auth_state, guard, static_dir)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!(%hosting_mode, "Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {err}");
        }
        info!("Gracefully shutdown");
    })
    .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(site_url: &str) -> Result<HeaderValue> {
    let parsed =
        Url::parse(site_url).with_context(|| format!("Invalid site URL: {site_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Site URL must include a valid host: {site_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build site origin header")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{guard::DEFAULT_PROTECTED_PATTERN, LoginRoute, ProtectedPaths};
    use axum::http::{header::LOCATION, StatusCode};
    use tower::ServiceExt;

    fn state(mode: HostingMode, login: LoginRoute) -> Arc<AuthState> {
        Arc::new(AuthState::new(
            AuthConfig::new(mode).with_login_route(login),
            Arc::new(MemoryAttemptStore::default()),
            Some(secrecy::SecretString::from("letmein".to_string())),
            None,
        ))
    }

    fn guard(mode: HostingMode, login: LoginRoute) -> Result<RouteGuard> {
        Ok(RouteGuard::new(
            mode,
            ProtectedPaths::new(&[DEFAULT_PROTECTED_PATTERN])?,
            login,
        ))
    }

    #[test]
    fn frontend_origin_keeps_port_and_drops_path() -> Result<()> {
        assert_eq!(
            frontend_origin("http://localhost:3000/portfolio")?,
            HeaderValue::from_static("http://localhost:3000")
        );
        assert_eq!(
            frontend_origin("https://example.dev")?,
            HeaderValue::from_static("https://example.dev")
        );
        assert!(frontend_origin("not a url").is_err());
        Ok(())
    }

    #[tokio::test]
    async fn server_trust_guards_protected_paths() -> Result<()> {
        let login = LoginRoute::default();
        let app = app(
            state(HostingMode::ServerTrust, login.clone()),
            guard(HostingMode::ServerTrust, login)?,
            None,
        )?;

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/studio/posts").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers().get(LOCATION),
            Some(&HeaderValue::from_static("/login?next=%2Fstudio%2Fposts"))
        );

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-request-id").is_some());
        Ok(())
    }

    #[tokio::test]
    async fn static_site_cannot_be_reached_through_odd_path_spellings() -> Result<()> {
        let site = tempfile::tempdir()?;
        std::fs::create_dir(site.path().join("studio"))?;
        std::fs::write(site.path().join("studio").join("index.html"), "studio page")?;
        std::fs::write(site.path().join("index.html"), "home page")?;

        let login = LoginRoute::default();
        let app = app(
            state(HostingMode::ServerTrust, login.clone()),
            guard(HostingMode::ServerTrust, login)?,
            Some(site.path().to_path_buf()),
        )?;

        for uri in [
            "/studio/",
            "/%73tudio/",
            "//studio/",
            "/./studio/",
            "/studio%2Findex.html",
        ] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty())?)
                .await?;
            assert_eq!(
                response.status(),
                StatusCode::TEMPORARY_REDIRECT,
                "{uri} reached the static site"
            );
        }

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/index.html").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/%73tudio/")
                    .header("cookie", "admin_session=true")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn no_server_trust_installs_no_guard() -> Result<()> {
        let login = LoginRoute::default();
        let app = app(
            state(HostingMode::NoServerTrust, login.clone()),
            guard(HostingMode::NoServerTrust, login)?,
            None,
        )?;
        let response = app
            .oneshot(Request::builder().uri("/studio").body(Body::empty())?)
            .await?;
        // Nothing is served there, but nothing redirects either.
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn base_path_prefixes_routes_and_redirects() -> Result<()> {
        let login = LoginRoute::new("/portfolio", "/login", "/studio");
        let app = app(
            state(HostingMode::ServerTrust, login.clone()),
            guard(HostingMode::ServerTrust, login)?,
            None,
        )?;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/portfolio/health")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/portfolio/studio")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(
            response.headers().get(LOCATION),
            Some(&HeaderValue::from_static("/portfolio/login?next=%2Fstudio"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn openapi_document_is_served() -> Result<()> {
        let login = LoginRoute::default();
        let app = app(
            state(HostingMode::ServerTrust, login.clone()),
            guard(HostingMode::ServerTrust, login)?,
            None,
        )?;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api-docs/openapi.json")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }
}
