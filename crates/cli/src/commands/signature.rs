//! Gateway signature support commands.
//!
//! Support staff use these to check a disputed payment: the signature is
//! recomputed from the gateway references with `RAZORPAY_KEY_SECRET`, exactly
//! as the storefront does when verifying a checkout.

use qmart_storefront::config::{ConfigError, GatewayConfig};
use qmart_storefront::services::signature::SignatureVerifier;

#[derive(Debug, thiserror::Error)]
pub enum SignatureCommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("payment gateway is not configured (set RAZORPAY_KEY_ID and RAZORPAY_KEY_SECRET)")]
    NotConfigured,

    #[error("order and payment references must not be empty")]
    EmptyInput,
}

fn verifier() -> Result<SignatureVerifier, SignatureCommandError> {
    let config = GatewayConfig::from_env()?.ok_or(SignatureCommandError::NotConfigured)?;
    Ok(SignatureVerifier::new(config.key_secret))
}

/// Print the expected signature for an order/payment pair.
///
/// # Errors
///
/// Returns an error if the gateway secret is not configured or an input is empty.
pub fn sign(order_ref: &str, payment_ref: &str) -> Result<(), SignatureCommandError> {
    let signature = verifier()?
        .sign(order_ref, payment_ref)
        .ok_or(SignatureCommandError::EmptyInput)?;

    #[allow(clippy::print_stdout)]
    {
        println!("{signature}");
    }
    Ok(())
}

/// Print `valid` or `invalid` and return whether the signature matched.
///
/// # Errors
///
/// Returns an error if the gateway secret is not configured.
pub fn verify(
    order_ref: &str,
    payment_ref: &str,
    signature: &str,
) -> Result<bool, SignatureCommandError> {
    let valid = verifier()?.verify(order_ref, payment_ref, signature);

    #[allow(clippy::print_stdout)]
    {
        println!("{}", if valid { "valid" } else { "invalid" });
    }
    Ok(valid)
}
