//! Sealed cookie encoding for flow state
//!
//! The browser holds the only copy of a flow, so the value it hands back is
//! untrusted. Values are written as
//!
//! ```text
//! v1.<base64url(json)>.<base64url(hmac-sha256("v1.<base64url(json)>"))>
//! ```
//!
//! Base64url without padding needs no cookie escaping. Decoding checks the
//! version tag, the MAC and the [`FlowCredentials`] invariants; unknown JSON
//! fields are ignored so older binaries can read newer cookies.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::Secret;
use hmac::{Hmac, Mac};
use rand::RngExt;
use sha2::Sha256;

use crate::constants::COOKIE_FORMAT_VERSION;
use crate::error::{Error, Result};
use crate::flow::FlowCredentials;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies flow cookies with a process-wide key.
#[derive(Clone)]
pub struct CookieCodec {
    key: Secret<Vec<u8>>,
}

impl CookieCodec {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: Secret::new(key.into()),
        }
    }

    /// Codec with a random 32-byte key. Cookies sealed with it do not
    /// survive a restart.
    pub fn random() -> Self {
        let mut key = [0u8; 32];
        rand::rng().fill(&mut key);
        Self::new(key.to_vec())
    }

    /// Seal credentials into a cookie value.
    pub fn encode(&self, credentials: &FlowCredentials) -> Result<String> {
        let json = serde_json::to_vec(credentials)
            .map_err(|e| Error::Cookie(format!("serializing credentials: {e}")))?;
        let signed = format!("{COOKIE_FORMAT_VERSION}.{}", URL_SAFE_NO_PAD.encode(json));
        let tag = self.mac(signed.as_bytes())?.finalize().into_bytes();
        Ok(format!("{signed}.{}", URL_SAFE_NO_PAD.encode(tag)))
    }

    /// Open a cookie value and re-check its invariants against `app_domain`.
    pub fn decode(&self, value: &str, app_domain: &str) -> Result<FlowCredentials> {
        let (signed, tag) = value
            .rsplit_once('.')
            .ok_or_else(|| Error::Cookie("missing signature".into()))?;
        let (version, payload) = signed
            .split_once('.')
            .ok_or_else(|| Error::Cookie("missing version".into()))?;
        if version != COOKIE_FORMAT_VERSION {
            return Err(Error::Cookie(format!("unsupported version {version:?}")));
        }

        let tag = URL_SAFE_NO_PAD
            .decode(tag)
            .map_err(|e| Error::Cookie(format!("signature encoding: {e}")))?;
        self.mac(signed.as_bytes())?
            .verify_slice(&tag)
            .map_err(|_| Error::Cookie("signature mismatch".into()))?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| Error::Cookie(format!("payload encoding: {e}")))?;
        let credentials: FlowCredentials = serde_json::from_slice(&json)
            .map_err(|e| Error::Cookie(format!("payload json: {e}")))?;

        credentials.check(app_domain).map_err(Error::Cookie)?;
        Ok(credentials)
    }

    fn mac(&self, data: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.key.expose())
            .map_err(|e| Error::Cookie(format!("signing key: {e}")))?;
        mac.update(data);
        Ok(mac)
    }
}

impl std::fmt::Debug for CookieCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieCodec").field("key", &self.key).finish()
    }
}
