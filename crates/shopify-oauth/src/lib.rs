//! Shopify OAuth flow library
//!
//! Holds everything the bridge needs to broker Shopify's authorization-code
//! flow without any server-side storage. This crate has no dependency on the
//! HTTP service and can be tested on its own.
//!
//! Flow:
//! 1. `flow::resolve_flow_request()` merges the submitted form with the
//!    server-configured app credentials and validates it
//! 2. `FlowCredentials::initiate()` builds the per-flow state with a fresh
//!    `nonce::generate_nonce()`
//! 3. User authorizes via `authorize::build_authorization_url()`
//! 4. Flow state travels in a cookie sealed by `cookie::CookieCodec`
//! 5. Shopify redirects back and `token::exchange_code()` trades the code
//! 6. `FlowCredentials::authenticate()` records the session and builds the
//!    redirect into the developer's app

pub mod authorize;
pub mod constants;
pub mod cookie;
pub mod error;
pub mod flow;
pub mod nonce;
pub mod token;

pub use authorize::{AuthorizationRequest, build_authorization_url, encode_host, shop_domain};
pub use constants::*;
pub use cookie::CookieCodec;
pub use error::{Error, Result};
pub use flow::{
    AppCredentials, FlowConfig, FlowCredentials, FlowRequest, ValidatedFlowRequest,
    ValidationDetail, ValidationError, resolve_flow_request,
};
pub use nonce::generate_nonce;
pub use token::{AccessTokenResponse, AssociatedUser, access_token_url, exchange_code};
