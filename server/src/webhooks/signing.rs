//! HMAC-SHA256 Webhook Signing
//!
//! Destinations verify a delivery by recomputing the HMAC of the raw body
//! with the shared secret and comparing it to `X-Hub-Signature-256`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

fn mac(secret: &[u8], payload: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac
}

/// Hex-encoded HMAC-SHA256 of `payload`.
pub fn sign_payload(secret: &[u8], payload: &[u8]) -> String {
    hex::encode(mac(secret, payload).finalize().into_bytes())
}

/// Value of [`SIGNATURE_HEADER`] for a payload: `sha256=<hex>`.
pub fn signature_header(secret: &[u8], payload: &[u8]) -> String {
    format!("sha256={}", sign_payload(secret, payload))
}

/// Check a `sha256=<hex>` header value, or a bare hex signature.
/// The digest comparison runs in constant time.
pub fn verify_signature(secret: &[u8], payload: &[u8], signature: &str) -> bool {
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
    match hex::decode(signature) {
        Ok(expected) => mac(secret, payload).verify_slice(&expected).is_ok(),
        Err(_) => false,
    }
}
