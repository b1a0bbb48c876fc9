//! Error types for Shopify OAuth operations

/// Errors from OAuth flow operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure talking to Shopify (DNS, TLS, connection).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Shopify answered with a non-success status. `body` is kept verbatim so
    /// the caller can hand it back to the browser.
    #[error("token endpoint returned {status}: {body}")]
    TokenExchange { status: u16, body: String },

    #[error("invalid token response: {0}")]
    InvalidToken(String),

    #[error("invalid flow cookie: {0}")]
    Cookie(String),
}

/// Result alias for OAuth operations.
pub type Result<T> = std::result::Result<T, Error>;
