//! `/api/generate-token`: OAuth callback
//!
//! Shopify redirects the browser here with `code` (and `state`) after the
//! developer approves the app. The code is exchanged for an online token,
//! the session is written back into the flow cookie, and the browser is
//! redirected into the developer's app with `shop`, `host` and `session`.
//!
//! Failures never touch the cookie.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use chrono::Utc;
use serde::Deserialize;
use shopify_oauth::{FLOW_TTL_SECS, access_token_url, exchange_code, shop_domain};
use tracing::{info, warn};

use crate::AppState;
use crate::cookie::{flow_cookie, load_flow};
use crate::error::ApiError;
use crate::method::MethodHandlers;
use crate::metrics;

pub fn routes() -> MethodRouter<AppState> {
    MethodHandlers::new().get(generate_token).expose()
}

/// Query parameters of Shopify's redirect. `hmac`, `shop` and `timestamp`
/// are also sent but not needed here.
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

/// GET /api/generate-token: exchange the code and redirect into the app.
///
/// The query is parsed only after the cookie check so a request without a
/// flow always gets the 403.
async fn generate_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, ApiError> {
    let credentials = load_flow(&state, &headers).ok_or(ApiError::MissingCookie)?;
    let flow = credentials.config.as_ref().ok_or(ApiError::MissingCookie)?;

    let Query(query) = Query::<CallbackQuery>::try_from_uri(&uri)
        .map_err(|e| ApiError::InvalidQuery(e.body_text()))?;

    if query.state.as_deref() != Some(flow.state.as_str()) {
        warn!(
            shop = %flow.shop,
            received = query.state.as_deref().unwrap_or("<none>"),
            "callback state does not match flow nonce"
        );
        if state.config.shopify.verify_state {
            metrics::record_token_exchange("state_mismatch");
            return Err(ApiError::StateMismatch);
        }
    }

    let code = query
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or(ApiError::MissingCode)?;

    let shop_domain = shop_domain(&flow.shop, &state.config.shopify.app_domain);
    let token_url = state
        .config
        .shopify
        .access_token_url
        .clone()
        .unwrap_or_else(|| access_token_url(&shop_domain));
    let (client_id, client_secret) = credentials
        .exchange_credentials(&state.config.shopify.app)
        .ok_or(ApiError::MissingCookie)?;

    let token = match exchange_code(
        &state.http_client,
        &token_url,
        client_id,
        client_secret,
        code,
    )
    .await
    {
        Ok(token) => token,
        Err(e) => {
            warn!(shop = %shop_domain, error = %e, "token exchange failed");
            metrics::record_token_exchange(match &e {
                shopify_oauth::Error::TokenExchange { .. } => "upstream_error",
                _ => "transport_error",
            });
            return Err(e.into());
        }
    };

    let (authenticated, redirect_url) = credentials
        .authenticate(&shop_domain, &token)
        .ok_or(ApiError::MissingCookie)?;

    let ttl_secs = token.expires_in.unwrap_or(FLOW_TTL_SECS);
    let cookie = flow_cookie(&state, &authenticated, Utc::now(), ttl_secs)?;
    let location = HeaderValue::from_str(&redirect_url)
        .map_err(|e| ApiError::Internal(format!("invalid redirect URL: {e}")))?;

    metrics::record_token_exchange("success");
    info!(
        shop = %shop_domain,
        expires_in = ttl_secs,
        scope = %token.scope,
        "access token issued, redirecting to app"
    );

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, location), (header::SET_COOKIE, cookie)],
    )
        .into_response())
}
