//! Authorization URL construction
//!
//! Builds the Shopify admin URL the developer's browser is sent to, plus the
//! two derived values every flow carries: the full shop domain and the
//! base64 `host` parameter embedded apps expect.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::constants::{AUTHORIZE_PATH, GRANT_OPTIONS};

/// Full shop domain, e.g. `my-shop.myshopify.com`.
pub fn shop_domain(shop: &str, app_domain: &str) -> String {
    format!("{shop}.{app_domain}")
}

/// The `host` query parameter Shopify hands to embedded apps: standard
/// base64 (padded) of the shop domain.
pub fn encode_host(shop_domain: &str) -> String {
    STANDARD.encode(shop_domain.as_bytes())
}

/// Parameters substituted into the authorization URL.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationRequest<'a> {
    pub shop: &'a str,
    pub app_domain: &'a str,
    pub client_id: &'a str,
    pub scopes: &'a str,
    /// Callback on this bridge, not the developer's app.
    pub redirect_uri: &'a str,
    pub state: &'a str,
}

/// Build the authorization URL for an online (per-user) token.
///
/// Values are inserted as-is. `shop` is validated before it gets here and
/// the remaining values are what the developer typed into the form.
pub fn build_authorization_url(request: &AuthorizationRequest<'_>) -> String {
    format!(
        "https://{}{}?client_id={}&scope={}&redirect_uri={}&state={}&{}",
        shop_domain(request.shop, request.app_domain),
        AUTHORIZE_PATH,
        request.client_id,
        request.scopes,
        request.redirect_uri,
        request.state,
        GRANT_OPTIONS,
    )
}
