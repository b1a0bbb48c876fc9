//! Shopify OAuth constants

/// Shop domain suffix used when none is configured
pub const DEFAULT_APP_DOMAIN: &str = "myshopify.com";

/// Admin path of the authorization page (browser redirect target)
pub const AUTHORIZE_PATH: &str = "/admin/oauth/authorize";

/// Admin path of the token endpoint (server-to-server POST)
pub const ACCESS_TOKEN_PATH: &str = "/admin/oauth/access_token";

/// Path of the bridge endpoint Shopify redirects back to after authorization.
pub const TOKEN_CALLBACK_PATH: &str = "/api/generate-token";

/// Requests an online (per-user) access token.
pub const GRANT_OPTIONS: &str = "grant_options[]=per-user";

/// Number of decimal digits in a flow nonce
pub const NONCE_LENGTH: usize = 15;

/// Lifetime of a freshly initiated flow cookie
pub const FLOW_TTL_SECS: u64 = 60 * 60;

/// Version tag prefixed to every sealed cookie value
pub const COOKIE_FORMAT_VERSION: &str = "v1";
