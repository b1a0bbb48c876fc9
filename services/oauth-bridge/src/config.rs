//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The Shopify client secret and the cookie signing key are loaded from env
//! vars or `*_file` paths, never from the TOML directly.
//!
//! Everything is read once at startup; handlers only see the resulting
//! `Config` through axum state.

use common::Secret;
use serde::Deserialize;
use shopify_oauth::{AppCredentials, DEFAULT_APP_DOMAIN};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "shopify-oauth-bridge.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub shopify: ShopifyConfig,
    #[serde(default)]
    pub cookie: CookieConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Externally visible base URL of the bridge. Used to build the OAuth
    /// callback when the request carries no `Origin` header.
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Shopify app settings
#[derive(Debug, Deserialize)]
pub struct ShopifyConfig {
    /// Shop domain suffix, e.g. `myshopify.com`
    #[serde(default = "default_app_domain")]
    pub app_domain: String,
    #[serde(default)]
    pub client_id: Option<String>,
    /// Path to a file containing the client secret (alternative to
    /// SHOPIFY_CLIENT_SECRET)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    /// Server-configured app credentials, resolved from `client_id` and the
    /// secret. Fields left unset are supplied by developers in the form.
    #[serde(skip)]
    pub app: AppCredentials,
    /// Token endpoint override, e.g. a local mock of Shopify. Defaults to
    /// `https://{shop}.{app_domain}/admin/oauth/access_token`.
    #[serde(default)]
    pub access_token_url: Option<String>,
    /// Reject callbacks whose `state` does not echo the flow nonce.
    #[serde(default)]
    pub verify_state: bool,
}

/// Flow cookie settings
#[derive(Debug, Deserialize)]
pub struct CookieConfig {
    #[serde(default = "default_cookie_name")]
    pub name: String,
    /// Path to a file containing the HMAC signing key (alternative to
    /// COOKIE_SIGNING_KEY)
    #[serde(default)]
    pub signing_key_file: Option<PathBuf>,
    #[serde(skip)]
    pub signing_key: Option<Secret<String>>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn default_max_connections() -> usize {
    256
}

fn default_app_domain() -> String {
    DEFAULT_APP_DOMAIN.to_string()
}

fn default_cookie_name() -> String {
    "shopify_oauth_credentials".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            public_url: None,
            max_connections: default_max_connections(),
        }
    }
}

impl Default for ShopifyConfig {
    fn default() -> Self {
        Self {
            app_domain: default_app_domain(),
            client_id: None,
            client_secret_file: None,
            app: AppCredentials::default(),
            access_token_url: None,
            verify_state: false,
        }
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            signing_key_file: None,
            signing_key: None,
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then overlay the
    /// process environment.
    pub fn load(path: Option<&Path>) -> common::Result<Self> {
        let config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                toml::from_str(&contents)?
            }
            None => Config::default(),
        };
        config.finish(|key| std::env::var(key).ok())
    }

    /// Overlay environment values read through `env`, resolve secrets and
    /// validate.
    ///
    /// Empty variables count as unset. Secret resolution order:
    /// 1. env var (SHOPIFY_CLIENT_SECRET, COOKIE_SIGNING_KEY)
    /// 2. `*_file` path from config
    fn finish(mut self, env: impl Fn(&str) -> Option<String>) -> common::Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(addr) = env("LISTEN_ADDR") {
            self.server.listen_addr =
                addr.parse().map_err(|e| common::Error::InvalidValue {
                    field: "LISTEN_ADDR",
                    reason: format!("{addr:?}: {e}"),
                })?;
        }
        if let Some(url) = env("PUBLIC_URL") {
            self.server.public_url = Some(url);
        }
        if let Some(domain) = env("NEXT_PUBLIC_SHOPIFY_APP_DOMAIN").or_else(|| env("SHOPIFY_APP_DOMAIN")) {
            self.shopify.app_domain = domain;
        }
        if let Some(url) = env("SHOPIFY_ACCESS_TOKEN_URL") {
            self.shopify.access_token_url = Some(url);
        }
        if let Some(id) = env("SHOPIFY_CLIENT_ID") {
            self.shopify.client_id = Some(id);
        }
        if let Some(name) = env("CREDENTIALS_COOKIE_NAME") {
            self.cookie.name = name;
        }

        let client_secret = match env("SHOPIFY_CLIENT_SECRET") {
            Some(secret) => Some(secret),
            None => read_secret_file(self.shopify.client_secret_file.as_deref())?,
        };
        self.shopify.app = AppCredentials::from_parts(self.shopify.client_id.clone(), client_secret);

        let signing_key = match env("COOKIE_SIGNING_KEY") {
            Some(key) => Some(key),
            None => read_secret_file(self.cookie.signing_key_file.as_deref())?,
        };
        self.cookie.signing_key = signing_key.and_then(Secret::non_empty);

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> common::Result<()> {
        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        let domain = self.shopify.app_domain.trim();
        if domain.is_empty() || domain.starts_with('.') || domain.contains('/') {
            return Err(common::Error::InvalidValue {
                field: "shopify.app_domain",
                reason: format!("{:?} is not a domain", self.shopify.app_domain),
            });
        }

        for (field, url) in [
            ("server.public_url", &self.server.public_url),
            ("shopify.access_token_url", &self.shopify.access_token_url),
        ] {
            if let Some(url) = url
                && !url.starts_with("http://")
                && !url.starts_with("https://")
            {
                return Err(common::Error::InvalidValue {
                    field,
                    reason: format!("must start with http:// or https://, got: {url}"),
                });
            }
        }

        if !is_cookie_name(&self.cookie.name) {
            return Err(common::Error::InvalidValue {
                field: "cookie.name",
                reason: format!("{:?} is not a valid cookie name", self.cookie.name),
            });
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var, falling
    /// back to `shopify-oauth-bridge.toml` only if it exists.
    pub fn resolve_path(cli_path: Option<&str>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(PathBuf::from(p));
        }
        if let Some(p) = std::env::var("CONFIG_PATH").ok().filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(p));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    }
}

fn read_secret_file(path: Option<&Path>) -> common::Result<Option<String>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let contents = std::fs::read_to_string(path).map_err(|e| {
        common::Error::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let contents = contents.trim().to_owned();
    Ok((!contents.is_empty()).then_some(contents))
}

/// RFC 6265 cookie-name: a non-empty token without separators.
fn is_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
        })
}
