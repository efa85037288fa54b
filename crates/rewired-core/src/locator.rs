//! Locator codec: snapshot bytes to and from a URL-fragment-safe string.
//!
//! Output uses the URL-safe base64 alphabet without padding. Decoding also
//! accepts the standard alphabet, which older builds published.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};

/// The locator text could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed locator: {reason}")]
pub struct DecodeError {
    pub reason: String,
}

/// Encode snapshot bytes as a locator.
pub fn encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode a locator back into snapshot bytes.
pub fn decode(locator: &str) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE_NO_PAD
        .decode(locator)
        .or_else(|_| STANDARD.decode(locator))
        .map_err(|e| DecodeError {
            reason: e.to_string(),
        })
}

/// Whether every character of `s` is in the encoder's output alphabet.
pub fn is_locator_safe(s: &str) -> bool {
    s.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
