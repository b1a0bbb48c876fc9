//! Shared fixtures for router tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use axum::{Form, Json};
use common::Secret;
use tokio::net::TcpListener;

use crate::AppState;
use crate::config::Config;

/// Defaults plus a fixed cookie name and signing key.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.cookie.name = "flow_test".into();
    config.cookie.signing_key = Secret::non_empty("test-key");
    config
}

pub fn test_app_state(config: Config) -> AppState {
    let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
    AppState {
        codec: crate::cookie_codec(&config),
        config: Arc::new(config),
        http_client: reqwest::Client::new(),
        started_at: Instant::now(),
        prometheus: recorder.handle(),
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &serde_json::Value, origin: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(origin) = origin {
        builder = builder.header(header::ORIGIN, origin);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// `name=value` part of the response's `Set-Cookie`, ready for a `Cookie` header.
pub fn cookie_pair(response: &Response) -> Option<String> {
    let value = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    value.split(';').next().map(|pair| pair.trim().to_string())
}

#[derive(Clone, Default)]
struct MockState {
    hits: Arc<AtomicUsize>,
    last_form: Arc<Mutex<HashMap<String, String>>>,
}

/// In-process stand-in for a shop's `/admin/oauth/access_token`.
pub struct MockShopify {
    base_url: String,
    state: MockState,
}

impl MockShopify {
    /// Serve a fixed status and JSON body on an ephemeral port.
    pub async fn start(status: StatusCode, body: serde_json::Value) -> Self {
        let state = MockState::default();
        let app = axum::Router::new()
            .route(
                "/admin/oauth/access_token",
                axum::routing::post(
                    move |State(mock): State<MockState>,
                          Form(form): Form<HashMap<String, String>>| {
                        let body = body.clone();
                        async move {
                            mock.hits.fetch_add(1, Ordering::SeqCst);
                            *mock.last_form.lock().unwrap() = form;
                            (status, Json(body))
                        }
                    },
                ),
            )
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    /// Online token response as Shopify documents it.
    pub fn online_token() -> serde_json::Value {
        serde_json::json!({
            "access_token": "f85632530bf277ec9ac6f649fc327f17",
            "scope": "read_products",
            "session": "sess-123",
            "expires_in": 86399,
            "associated_user_scope": "read_products",
            "associated_user": {
                "id": 902541635,
                "first_name": "John",
                "last_name": "Smith",
                "email": "john@example.com",
                "email_verified": true,
                "account_owner": true,
                "locale": "en",
                "collaborator": false
            }
        })
    }

    pub fn token_url(&self) -> String {
        format!("{}/admin/oauth/access_token", self.base_url)
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn last_form(&self) -> HashMap<String, String> {
        self.state.last_form.lock().unwrap().clone()
    }
}
