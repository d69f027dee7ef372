//! Payment gateway client for creating gateway orders.
//!
//! Before the customer pays online, the storefront asks the gateway for an
//! order descriptor. The gateway later calls back with the references that
//! [`super::signature::SignatureVerifier`] checks.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Serialize;
use thiserror::Error;

use qmart_core::{Amount, AmountError};

use crate::config::GatewayConfig;

/// Errors that can occur when talking to the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Amount cannot be expressed in minor units.
    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),
}

/// Creates gateway-side orders ahead of online payment.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a gateway order and return its descriptor unchanged.
    async fn create_order(&self, amount: Amount) -> Result<serde_json::Value, GatewayError>;
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    /// In the currency's minor unit.
    amount: i64,
    currency: &'a str,
    receipt: String,
}

/// Razorpay REST client.
#[derive(Clone)]
pub struct RazorpayClient {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl RazorpayClient {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    #[tracing::instrument(skip(self), fields(amount = %amount))]
    async fn create_order(&self, amount: Amount) -> Result<serde_json::Value, GatewayError> {
        let body = CreateOrderRequest {
            amount: amount.to_minor_units()?,
            currency: &self.config.currency,
            receipt: format!("receipt_{}", Utc::now().timestamp_millis()),
        };

        let response = self
            .client
            .post(format!("{}/orders", self.config.api_base))
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .json(&body)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Gateway rejected order creation");
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))
    }
}
