//! Redacting holder for the Shopify client secret and the cookie signing key
//!
//! Both values reach the process through env vars or `*_file` paths and then
//! sit in long-lived config, so they are wrapped once at load time and only
//! unwrapped where they are put on the wire or fed to the MAC.

use std::fmt;
use zeroize::Zeroize;

const REDACTED: &str = "[REDACTED]";

/// Value that prints as `[REDACTED]` and is zeroed on drop.
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the raw value. Keep the borrow short.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    /// `None` for blank input: an empty `SHOPIFY_CLIENT_SECRET` or an empty
    /// key file means "not configured".
    pub fn non_empty(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        (!value.trim().is_empty()).then(|| Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key material for HMAC signing.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}
