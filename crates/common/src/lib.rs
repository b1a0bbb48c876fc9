//! Common types for the Shopify OAuth bridge

mod secret;
mod error;

pub use secret::Secret;
pub use error::{Error, Result};
