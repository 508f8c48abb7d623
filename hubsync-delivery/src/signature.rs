//! HMAC-SHA256 body signatures.

use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex signature of the raw request body.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Lowercase hex HMAC-SHA256 of `body` keyed with `secret`.
pub fn sign(body: &[u8], secret: &str) -> Result<String, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of `signature` (hex) against `body`.
pub fn verify(body: &[u8], secret: &str, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
