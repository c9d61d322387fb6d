//! `X-Hub-Signature-256` validation.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Validate an HMAC-SHA256 signature of `payload`.
///
/// The signature is hex, optionally prefixed with `sha256=`. With no secret
/// configured every delivery is accepted. Comparison is constant-time.
pub fn verify(secret: Option<&str>, payload: &[u8], signature: Option<&str>) -> bool {
    let secret = match secret {
        None => return true,
        Some(s) if s.is_empty() => return true,
        Some(s) => s,
    };
    let Some(signature) = signature else {
        return false;
    };

    let sig_hex = signature.strip_prefix("sha256=").unwrap_or(signature);
    let Ok(provided) = hex::decode(sig_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&provided).is_ok()
}

/// Compute the header value GitHub would send.
#[cfg(test)]
pub(crate) fn sign(secret: &str, payload: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}
