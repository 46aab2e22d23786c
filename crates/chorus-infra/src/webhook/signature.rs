//! HMAC-SHA256 webhook signatures.
//!
//! Inbound and outbound messages carry `HMAC-SHA256(secret, nonce || body)`
//! as a lowercase hex string. The nonce is an opaque per-message token; it
//! is prepended to the body bytes, never hashed separately.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use chorus_types::error::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex signature for a nonce and body.
///
/// Used for signing outbound replies and for generating test vectors.
pub fn sign(secret: &[u8], nonce: &str, body: &[u8]) -> Result<String, WebhookError> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|e| WebhookError::InvalidKey(e.to_string()))?;
    mac.update(nonce.as_bytes());
    mac.update(body);
    Ok(hex_encode(&mac.finalize().into_bytes()))
}

/// Verify an inbound signature in constant time.
///
/// Any decode or mismatch failure collapses to `SignatureMismatch`; callers
/// never learn which byte differed.
pub fn verify(
    secret: &[u8],
    nonce: &str,
    body: &[u8],
    signature_hex: &str,
) -> Result<(), WebhookError> {
    let expected_bytes =
        hex_decode(signature_hex).map_err(|_| WebhookError::SignatureMismatch)?;

    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|e| WebhookError::InvalidKey(e.to_string()))?;
    mac.update(nonce.as_bytes());
    mac.update(body);

    // Constant-time verification (via hmac crate's `verify_slice`)
    mac.verify_slice(&expected_bytes)
        .map_err(|_| WebhookError::SignatureMismatch)
}

/// A fresh nonce for an outbound reply. Time-sortable and unique.
pub fn fresh_nonce() -> String {
    Uuid::now_v7().simple().to_string()
}

/// Decode a hex string to bytes. Empty error type: callers map it.
///
/// Works on bytes, not char boundaries, so arbitrary UTF-8 input is
/// rejected rather than panicking mid-slice.
fn hex_decode(hex: &str) -> Result<Vec<u8>, ()> {
    if hex.len() % 2 != 0 {
        return Err(());
    }
    hex.as_bytes()
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).map_err(|_| ())?;
            u8::from_str_radix(pair, 16).map_err(|_| ())
        })
        .collect()
}

/// Encode bytes to a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
