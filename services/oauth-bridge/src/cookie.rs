//! Flow cookie transport
//!
//! Reads the sealed flow cookie out of `Cookie` request headers and builds
//! the `Set-Cookie` header that replaces it.

use axum::http::{HeaderMap, HeaderValue, header};
use chrono::{DateTime, TimeDelta, Utc};
use shopify_oauth::FlowCredentials;
use tracing::warn;

use crate::AppState;
use crate::error::ApiError;

/// Value of cookie `name`, scanning every `Cookie` header. First match wins.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
}

/// Decode the flow cookie carried by a request.
///
/// A cookie that fails to open (bad signature, stale format, broken
/// invariants) is logged and treated as absent.
pub fn load_flow(state: &AppState, headers: &HeaderMap) -> Option<FlowCredentials> {
    let value = read_cookie(headers, &state.config.cookie.name)?;
    match state.codec.decode(value, &state.config.shopify.app_domain) {
        Ok(credentials) => Some(credentials),
        Err(e) => {
            warn!(error = %e, "ignoring unreadable flow cookie");
            None
        }
    }
}

/// Seal `credentials` into a `Set-Cookie` header expiring `ttl_secs` after `now`.
pub fn flow_cookie(
    state: &AppState,
    credentials: &FlowCredentials,
    now: DateTime<Utc>,
    ttl_secs: u64,
) -> Result<HeaderValue, ApiError> {
    let value = state.codec.encode(credentials)?;
    set_cookie_header(&state.config.cookie.name, &value, now, ttl_secs)
}

fn set_cookie_header(
    name: &str,
    value: &str,
    now: DateTime<Utc>,
    ttl_secs: u64,
) -> Result<HeaderValue, ApiError> {
    let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
    let expires = TimeDelta::try_seconds(ttl)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);

    let cookie = format!(
        "{name}={value}; Path=/; Expires={}; Max-Age={ttl_secs}; HttpOnly; SameSite=Lax",
        expires.format("%a, %d %b %Y %H:%M:%S GMT"),
    );
    HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::Internal(format!("invalid Set-Cookie header: {e}")))
}
