//! Gateway callback signature verification.
//!
//! The gateway signs `"{order_ref}|{payment_ref}"` with HMAC-SHA256 keyed by
//! the merchant's key secret and sends the digest as lowercase hex. Every
//! money-bearing state change gates on [`SignatureVerifier::verify`].

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verifies gateway callback signatures against a shared secret.
///
/// Implements `Debug` manually to redact the secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: SecretString,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl SignatureVerifier {
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Compute the hex signature for a pair of gateway references.
    ///
    /// Returns `None` if the secret or either reference is empty.
    #[must_use]
    pub fn sign(&self, order_ref: &str, payment_ref: &str) -> Option<String> {
        let mac = self.mac_for(order_ref, payment_ref)?;
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    /// Check a supplied signature in constant time.
    ///
    /// Fails closed: an empty secret, reference or signature, or a signature
    /// that is not valid hex, is never authentic.
    #[must_use]
    pub fn verify(&self, order_ref: &str, payment_ref: &str, signature: &str) -> bool {
        if signature.is_empty() {
            return false;
        }
        let Ok(supplied) = hex::decode(signature) else {
            return false;
        };
        let Some(mac) = self.mac_for(order_ref, payment_ref) else {
            return false;
        };
        mac.verify_slice(&supplied).is_ok()
    }

    fn mac_for(&self, order_ref: &str, payment_ref: &str) -> Option<HmacSha256> {
        let secret = self.secret.expose_secret();
        if secret.is_empty() || order_ref.is_empty() || payment_ref.is_empty() {
            return None;
        }

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(order_ref.as_bytes());
        mac.update(b"|");
        mac.update(payment_ref.as_bytes());
        Some(mac)
    }
}
