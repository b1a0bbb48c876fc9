//! Flow state and request validation
//!
//! `FlowCredentials` is the whole persisted state of one OAuth flow. It lives
//! in the browser cookie, so every value read back is re-checked against the
//! invariants in [`FlowCredentials::check`] before it is used.

use common::Secret;
use serde::{Deserialize, Serialize};

use crate::authorize::{encode_host, shop_domain};
use crate::nonce::{generate_nonce, is_nonce};
use crate::token::AccessTokenResponse;

/// Shopify app credentials configured on the server.
///
/// Each configured value takes precedence over the one the developer
/// submits. Only a complete pair counts as app secrets, and only then are
/// the values kept out of the flow cookie.
#[derive(Debug, Clone, Default)]
pub struct AppCredentials {
    pub client_id: Option<String>,
    pub client_secret: Option<Secret<String>>,
}

impl AppCredentials {
    /// Blank values count as unset.
    pub fn from_parts(client_id: Option<String>, client_secret: Option<String>) -> Self {
        Self {
            client_id: client_id.filter(|id| !id.trim().is_empty()),
            client_secret: client_secret.and_then(Secret::non_empty),
        }
    }

    /// Both client id and secret are configured.
    pub fn is_complete(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_ref().map(Secret::as_str)
    }
}

/// Per-flow configuration, present once a flow is initiated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowConfig {
    pub shop: String,
    pub host: String,
    pub scopes: String,
    pub state: String,
    pub redirect_uri: String,
    pub embedded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// Flow state persisted in the credentials cookie.
///
/// JSON field names match what the browser UI reads (`appSecrets`,
/// `authenticatedUrl`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowCredentials {
    pub initiated: bool,
    #[serde(rename = "appSecrets")]
    pub app_secrets: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(
        rename = "authenticatedUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub authenticated_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<FlowConfig>,
}

impl FlowCredentials {
    /// Payload returned when no flow has been started yet.
    ///
    /// Server-configured credentials are echoed so the UI can prefill its form.
    pub fn not_started(app: &AppCredentials) -> Self {
        Self {
            initiated: false,
            app_secrets: app.is_complete(),
            client_id: app.client_id.clone(),
            client_secret: app.client_secret().map(String::from),
            authenticated_url: None,
            config: None,
        }
    }

    /// Start a new flow from a validated request.
    ///
    /// Generates a fresh nonce and derives `host` from the shop. The client
    /// id/secret are stored only when the server has none of its own.
    pub fn initiate(request: &ValidatedFlowRequest, app_domain: &str) -> Self {
        let config = FlowConfig {
            host: encode_host(&shop_domain(&request.shop, app_domain)),
            redirect_uri: request.redirect_uri.clone(),
            scopes: request.scopes.clone(),
            shop: request.shop.clone(),
            state: generate_nonce(),
            embedded: request.embedded,
            session: None,
            locale: None,
        };

        if request.app_secrets {
            Self {
                initiated: true,
                app_secrets: true,
                client_id: None,
                client_secret: None,
                authenticated_url: None,
                config: Some(config),
            }
        } else {
            Self {
                initiated: true,
                app_secrets: false,
                client_id: Some(request.client_id.clone()),
                client_secret: Some(request.client_secret.expose().clone()),
                authenticated_url: None,
                config: Some(config),
            }
        }
    }

    /// Client id/secret to present at the token endpoint.
    ///
    /// Each server-configured value wins over the one captured in the cookie.
    pub fn exchange_credentials<'a>(
        &'a self,
        app: &'a AppCredentials,
    ) -> Option<(&'a str, &'a str)> {
        let client_id = app.client_id.as_deref().or(self.client_id.as_deref())?;
        let client_secret = app.client_secret().or(self.client_secret.as_deref())?;
        Some((client_id, client_secret))
    }

    /// Record a successful token exchange.
    ///
    /// Returns the updated credentials and the URL to send the browser to.
    /// `None` if the flow has no config.
    pub fn authenticate(
        &self,
        shop_domain: &str,
        token: &AccessTokenResponse,
    ) -> Option<(Self, String)> {
        let config = self.config.as_ref()?;
        let redirect_url = app_redirect_url(config, shop_domain, token.session.as_deref());

        let mut updated = self.clone();
        updated.authenticated_url = Some(redirect_url.clone());
        updated.config = Some(FlowConfig {
            session: token.session.clone(),
            locale: token
                .associated_user
                .as_ref()
                .and_then(|user| user.locale.clone()),
            ..config.clone()
        });

        Some((updated, redirect_url))
    }

    /// Check the invariants a cookie-borne value must satisfy.
    ///
    /// `host` is re-derived from `shop` rather than trusted.
    pub fn check(&self, app_domain: &str) -> Result<(), String> {
        if !self.initiated {
            return Err("flow is not initiated".into());
        }
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| String::from("initiated flow has no config"))?;

        let has_client = self.client_id.is_some() || self.client_secret.is_some();
        if self.app_secrets && has_client {
            return Err("client credentials present although app secrets are configured".into());
        }
        if !self.app_secrets && (self.client_id.is_none() || self.client_secret.is_none()) {
            return Err("client credentials missing".into());
        }

        if !is_valid_shop(&config.shop) {
            return Err(format!("invalid shop: {}", config.shop));
        }
        if config.host != encode_host(&shop_domain(&config.shop, app_domain)) {
            return Err("host does not match shop".into());
        }
        if !is_nonce(&config.state) {
            return Err("state is not a nonce".into());
        }
        if !is_http_uri(&config.redirect_uri) {
            return Err(format!("invalid redirect_uri: {}", config.redirect_uri));
        }
        Ok(())
    }
}

/// Redirect into the developer's app once a session exists.
fn app_redirect_url(config: &FlowConfig, shop_domain: &str, session: Option<&str>) -> String {
    let mut url = format!("{}/?", config.redirect_uri.trim_end_matches('/'));
    if config.embedded {
        url.push_str("embedded=1&");
    }
    url.push_str(&format!("shop={shop_domain}&host={}", config.host));
    if let Some(session) = session {
        url.push_str(&format!("&session={session}"));
    }
    url
}

/// Shop subdomain: an ASCII alphanumeric followed by alphanumerics or hyphens.
pub fn is_valid_shop(shop: &str) -> bool {
    let mut chars = shop.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Absolute URI with a host. Rejects `localhost:3000` (parsed as a scheme)
/// and control characters, which the URL parser would silently strip.
fn is_http_uri(value: &str) -> bool {
    !value.chars().any(char::is_control)
        && reqwest::Url::parse(value)
        .map(|url| url.has_host())
        .unwrap_or(false)
}

/// Body of `POST /api/credentials` as submitted.
#[derive(Debug, Default, Deserialize)]
pub struct FlowRequest {
    pub shop: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scopes: Option<String>,
    pub redirect_uri: Option<String>,
    pub embedded: Option<bool>,
}

/// A flow request with every field resolved and validated.
#[derive(Debug, Clone)]
pub struct ValidatedFlowRequest {
    pub shop: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub scopes: String,
    pub redirect_uri: String,
    pub embedded: bool,
    /// True when `client_id`/`client_secret` came from server configuration.
    pub app_secrets: bool,
}

/// One failed field check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationDetail {
    pub message: String,
    pub path: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Rejected flow request, serialized as the 400 response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub details: Vec<ValidationDetail>,
}

impl ValidationError {
    fn from_details(details: Vec<ValidationDetail>) -> Self {
        let message = details
            .iter()
            .map(|d| d.message.as_str())
            .collect::<Vec<_>>()
            .join(". ");
        Self { message, details }
    }

    /// Body that is not valid JSON for a flow request.
    pub fn malformed(reason: impl std::fmt::Display) -> Self {
        Self::from_details(vec![ValidationDetail {
            message: format!("request body is invalid: {reason}"),
            path: vec![],
            kind: "object.base".into(),
        }])
    }
}

fn detail(field: &str, kind: &str, message: String) -> ValidationDetail {
    ValidationDetail {
        message,
        path: vec![field.to_string()],
        kind: kind.to_string(),
    }
}

fn required(field: &str, value: Option<String>, details: &mut Vec<ValidationDetail>) -> String {
    match value {
        None => {
            details.push(detail(field, "any.required", format!("\"{field}\" is required")));
            String::new()
        }
        Some(v) if v.is_empty() => {
            details.push(detail(
                field,
                "string.empty",
                format!("\"{field}\" is not allowed to be empty"),
            ));
            String::new()
        }
        Some(v) => v,
    }
}

/// Merge the submitted form with server credentials and validate the result.
///
/// Each server-configured client value takes precedence over the submitted
/// one. All failing fields are reported together.
pub fn resolve_flow_request(
    request: FlowRequest,
    app: &AppCredentials,
) -> Result<ValidatedFlowRequest, ValidationError> {
    let mut details = Vec::new();

    let shop = required("shop", request.shop, &mut details);
    if !shop.is_empty() && !is_valid_shop(&shop) {
        details.push(detail(
            "shop",
            "string.pattern.base",
            format!(
                "\"shop\" with value \"{shop}\" fails to match the required pattern: ^[a-zA-Z0-9][a-zA-Z0-9-]*$"
            ),
        ));
    }

    let client_id = required(
        "client_id",
        app.client_id.clone().or(request.client_id),
        &mut details,
    );
    let client_secret = required(
        "client_secret",
        app.client_secret().map(String::from).or(request.client_secret),
        &mut details,
    );

    let scopes = required("scopes", request.scopes, &mut details);

    let redirect_uri = required("redirect_uri", request.redirect_uri, &mut details);
    if !redirect_uri.is_empty() && !is_http_uri(&redirect_uri) {
        details.push(detail(
            "redirect_uri",
            "string.uri",
            "\"redirect_uri\" must be a valid uri".into(),
        ));
    }

    let embedded = match request.embedded {
        Some(embedded) => embedded,
        None => {
            details.push(detail(
                "embedded",
                "any.required",
                "\"embedded\" is required".into(),
            ));
            false
        }
    };

    if !details.is_empty() {
        return Err(ValidationError::from_details(details));
    }

    Ok(ValidatedFlowRequest {
        shop,
        client_id,
        client_secret: Secret::new(client_secret),
        scopes,
        redirect_uri,
        embedded,
        app_secrets: app.is_complete(),
    })
}
