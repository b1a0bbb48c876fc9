//! Shopify OAuth Bridge
//!
//! Stateless HTTP service that walks a developer's local Shopify app through
//! the authorization-code flow:
//! 1. `POST /api/credentials` validates the app details, stores the flow in
//!    a signed cookie and returns the Shopify authorization URL
//! 2. Shopify redirects the browser to `GET /api/generate-token`
//! 3. The code is exchanged for an online access token and the browser is
//!    sent on to the app with `shop`, `host` and `session`

mod config;
mod cookie;
mod credentials;
mod error;
mod generate_token;
mod method;
mod metrics;
#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{MatchedPath, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use shopify_oauth::CookieCodec;
use tokio::net::TcpListener;
use tracing::{Instrument, debug, error, info, info_span, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// How long in-flight requests get to finish after SIGINT/SIGTERM.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub codec: CookieCodec,
    pub http_client: reqwest::Client,
    pub started_at: Instant,
    pub prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// Every request runs inside a span carrying a fresh `request_id` and is
/// counted under its route template.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/api/credentials", credentials::routes())
        .route("/api/generate-token", generate_token::routes())
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(axum::middleware::from_fn(observe))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

/// Cookie codec keyed from configuration, or a random key when none is set.
fn cookie_codec(config: &Config) -> CookieCodec {
    match &config.cookie.signing_key {
        Some(key) => CookieCodec::new(key.as_bytes().to_vec()),
        None => CookieCodec::random(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting shopify-oauth-bridge");

    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    match &config_path {
        Some(path) => info!(path = %path.display(), "loading configuration"),
        None => info!("no config file, using defaults and environment"),
    }

    let config = Config::load(config_path.as_deref()).with_context(|| match &config_path {
        Some(path) => format!("failed to load config from {}", path.display()),
        None => "failed to load config from environment".to_string(),
    })?;

    info!(
        listen_addr = %config.server.listen_addr,
        app_domain = %config.shopify.app_domain,
        app_secrets = config.shopify.app.is_complete(),
        cookie = %config.cookie.name,
        "configuration loaded"
    );

    if config.cookie.signing_key.is_none() {
        warn!("no cookie signing key configured, flows will not survive a restart");
    }
    if !config.shopify.verify_state {
        warn!("callback state is not enforced, set shopify.verify_state to reject mismatches");
    }

    let http_client = reqwest::Client::builder()
        .user_agent(concat!("shopify-oauth-bridge/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    let listen_addr = config.server.listen_addr;
    let max_connections = config.server.max_connections;
    let app_state = AppState {
        codec: cookie_codec(&config),
        config: Arc::new(config),
        http_client,
        started_at: Instant::now(),
        prometheus: prometheus_handle,
    };

    let app = build_router(app_state, max_connections);

    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timer starts when the signal fires, not when the server starts
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

/// Request span, duration and status accounting.
async fn observe(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let method = request.method().to_string();
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let span = info_span!("request", %request_id, %method, %endpoint);

    let start = Instant::now();
    let response = next.run(request).instrument(span.clone()).await;
    let elapsed = start.elapsed().as_secs_f64();
    let status = response.status().as_u16();

    metrics::record_request(&endpoint, &method, status, elapsed);
    span.in_scope(|| debug!(status, duration_secs = elapsed, "request completed"));
    response
}

/// Liveness plus whether the server holds app secrets.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "app_secrets": state.config.shopify.app.is_complete(),
    });
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{body_json, get, post_json, test_app_state, test_config};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_reports_status_and_app_secrets() {
        let app = build_router(test_app_state(test_config()), 100);

        let response = app.oneshot(get("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["app_secrets"], false);
        assert!(json["uptime_seconds"].is_u64());
    }

    #[tokio::test]
    async fn health_with_server_secrets() {
        let mut config = test_config();
        config.shopify.app = shopify_oauth::AppCredentials::from_parts(
            Some("env-id".into()),
            Some("env-secret".into()),
        );
        let app = build_router(test_app_state(config), 100);

        let json = body_json(app.oneshot(get("/health", None)).await.unwrap()).await;
        assert_eq!(json["app_secrets"], true);
        assert!(!json.to_string().contains("env-secret"));
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_text_format() {
        let app = build_router(test_app_state(test_config()), 100);

        let response = app.oneshot(get("/metrics", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn api_endpoints_reject_other_verbs() {
        let app = build_router(test_app_state(test_config()), 100);

        for (method, uri) in [
            ("PUT", "/api/credentials"),
            ("DELETE", "/api/credentials"),
            ("PATCH", "/api/generate-token"),
        ] {
            let request = axum::http::Request::builder()
                .method(method)
                .uri(uri)
                .body(axum::body::Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{method} {uri}");
            assert_eq!(
                body_json(response).await,
                serde_json::json!({"message": "Unsupported method"})
            );
        }

        let response = app
            .oneshot(post_json("/api/generate-token", &serde_json::json!({}), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let app = build_router(test_app_state(test_config()), 100);
        let response = app.oneshot(get("/api/unknown", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn configured_signing_key_is_stable_across_codecs() {
        let config = test_config();
        let first = cookie_codec(&config);
        let second = cookie_codec(&config);

        let credentials = shopify_oauth::FlowCredentials::not_started(&shopify_oauth::AppCredentials::default());
        assert_eq!(
            first.encode(&credentials).unwrap(),
            second.encode(&credentials).unwrap()
        );
    }

    #[test]
    fn missing_signing_key_gets_random_codec() {
        let mut config = test_config();
        config.cookie.signing_key = None;
        let credentials = shopify_oauth::FlowCredentials::not_started(&shopify_oauth::AppCredentials::default());
        assert_ne!(
            cookie_codec(&config).encode(&credentials).unwrap(),
            cookie_codec(&config).encode(&credentials).unwrap()
        );
    }
}
