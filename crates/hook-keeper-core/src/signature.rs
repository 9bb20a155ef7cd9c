//! HMAC-SHA256 verification of webhook delivery bodies.
//!
//! Deliveries carry a `sha256=<hex>` digest of the raw body computed with a
//! secret shared between the platform and this service.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Prefix of the signature header value
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Verify a `sha256=<hex>` signature against `body`.
///
/// Never fails: a missing prefix, invalid hex or digest mismatch all yield
/// `false`. The digest comparison runs in constant time.
pub fn verify_signature(secret: &[u8], body: &[u8], signature: &str) -> bool {
    let Some(hex_digest) = signature.strip_prefix(SIGNATURE_PREFIX) else {
        debug!("Signature header does not carry the sha256= prefix");
        return false;
    };

    let Ok(expected) = hex::decode(hex_digest) else {
        debug!("Signature header is not valid hex");
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Compute the `sha256=<hex>` signature of `body`
pub fn compute_signature(secret: &[u8], body: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

/// Verifies deliveries against an optional shared secret.
///
/// Without a secret every delivery is accepted.
#[derive(Clone, Default)]
pub struct SignatureVerifier {
    secret: Option<String>,
}

impl SignatureVerifier {
    /// Create a verifier; an empty secret disables verification
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    /// Whether deliveries are checked at all
    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Check a delivery body against the value of its signature header
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> bool {
        match (&self.secret, signature) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(secret), Some(signature)) => {
                verify_signature(secret.as_bytes(), body, signature.trim())
            }
        }
    }
}

impl fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &self.secret.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
