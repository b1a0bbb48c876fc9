//! Flow nonce generation
//!
//! The nonce doubles as the OAuth `state` parameter. Shopify only requires an
//! opaque value, so a short decimal string is used: every random byte is
//! reduced modulo 10 to one digit.

use rand::RngExt;

use crate::constants::NONCE_LENGTH;

/// Generate a fresh 15-digit nonce from the thread-local CSPRNG.
///
/// The modulo reduction is slightly biased toward 0-5; the value is a
/// correlation token, not key material.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_LENGTH];
    rand::rng().fill(&mut bytes);
    bytes.iter().map(|b| char::from(b'0' + b % 10)).collect()
}

/// Whether `value` has the shape of a nonce produced by [`generate_nonce`].
pub fn is_nonce(value: &str) -> bool {
    value.len() == NONCE_LENGTH && value.bytes().all(|b| b.is_ascii_digit())
}
