//! `/api/credentials`: flow state inspection and flow start
//!
//! - GET returns the flow stored in the cookie, or the "not started"
//!   defaults describing whether the server holds app secrets.
//! - POST validates the developer's form, starts a new flow, stores it in
//!   the cookie and returns the Shopify authorization URL.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use chrono::Utc;
use shopify_oauth::{
    AuthorizationRequest, FLOW_TTL_SECS, FlowCredentials, FlowRequest, TOKEN_CALLBACK_PATH,
    ValidationError, build_authorization_url, resolve_flow_request,
};
use tracing::{debug, info};

use crate::AppState;
use crate::cookie::{flow_cookie, load_flow};
use crate::error::ApiError;
use crate::method::MethodHandlers;

pub fn routes() -> MethodRouter<AppState> {
    MethodHandlers::new()
        .get(get_credentials)
        .post(post_credentials)
        .expose()
}

/// GET /api/credentials: current flow state or defaults.
async fn get_credentials(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let credentials = load_flow(&state, &headers).unwrap_or_else(|| {
        debug!("no flow cookie, returning defaults");
        FlowCredentials::not_started(&state.config.shopify.app)
    });

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        serde_json::json!(credentials).to_string(),
    )
        .into_response()
}

/// POST /api/credentials: validate the form and start a flow.
async fn post_credentials(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: FlowRequest = serde_json::from_slice(&body).map_err(ValidationError::malformed)?;
    let validated = resolve_flow_request(request, &state.config.shopify.app)?;

    let app_domain = &state.config.shopify.app_domain;
    let credentials = FlowCredentials::initiate(&validated, app_domain);
    let Some(flow) = credentials.config.as_ref() else {
        return Err(ApiError::Internal("initiated flow has no config".into()));
    };

    let callback = format!("{}{}", callback_origin(&state, &headers), TOKEN_CALLBACK_PATH);
    let authorization_url = build_authorization_url(&AuthorizationRequest {
        shop: &flow.shop,
        app_domain,
        client_id: &validated.client_id,
        scopes: &flow.scopes,
        redirect_uri: &callback,
        state: &flow.state,
    });

    let cookie = flow_cookie(&state, &credentials, Utc::now(), FLOW_TTL_SECS)?;

    info!(
        shop = %flow.shop,
        app_secrets = credentials.app_secrets,
        embedded = flow.embedded,
        callback = %callback,
        "OAuth flow initiated"
    );

    Ok((
        StatusCode::OK,
        [
            (header::SET_COOKIE, cookie),
            (
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("application/json"),
            ),
        ],
        serde_json::json!({
            "credentials": credentials,
            "authorizationUrl": authorization_url,
        })
        .to_string(),
    )
        .into_response())
}

/// Origin Shopify should redirect back to.
///
/// The browser's `Origin` header wins, then the configured public URL, then
/// the `Host` header, then the listen address.
fn callback_origin(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(origin) = header_str(headers, header::ORIGIN) {
        return origin.trim_end_matches('/').to_string();
    }
    if let Some(url) = &state.config.server.public_url {
        return url.trim_end_matches('/').to_string();
    }
    if let Some(host) = header_str(headers, header::HOST) {
        return format!("http://{host}");
    }
    format!("http://{}", state.config.server.listen_addr)
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "null")
}
