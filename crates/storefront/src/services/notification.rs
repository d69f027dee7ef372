//! Best-effort order confirmations.
//!
//! [`Notifier`] is the outbound port: it sends one composed email.
//! [`ConfirmationSender`] runs after an order is committed. It looks up the
//! customer and product names, renders the confirmation and hands it to the
//! notifier under a timeout. It never returns an error. Whatever happens is
//! logged and summarised as a [`NotificationOutcome`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use askama::Template;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use qmart_core::{Order, ProductId, ShippingAddress};

use crate::db::{Directory, RepositoryError};
use crate::models::{ProductDisplay, UserContact};

/// Errors that can occur while composing or sending a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Transport (SMTP or provider) failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Invalid email address.
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("template error: {0}")]
    Template(#[from] askama::Error),

    /// Directory lookup failed.
    #[error("lookup failed: {0}")]
    Lookup(#[from] RepositoryError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// A fully composed email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// Outbound notification port.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), NotificationError>;
}

/// Notifier used when SMTP is not configured. Logs the message and drops it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, email: &OutboundEmail) -> Result<(), NotificationError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "SMTP not configured, confirmation email logged only"
        );
        Ok(())
    }
}

/// What happened to an order confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationOutcome {
    Sent,
    /// No recipient could be determined.
    Skipped,
    Failed,
}

/// One rendered line of the confirmation.
struct ConfirmationLine {
    name: String,
    quantity: u32,
    unit_price: String,
    line_total: String,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    customer_name: &'a str,
    order_id: &'a str,
    payment_mode: &'a str,
    payment_status: &'a str,
    lines: &'a [ConfirmationLine],
    total: String,
    address: &'a ShippingAddress,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    customer_name: &'a str,
    order_id: &'a str,
    payment_mode: &'a str,
    payment_status: &'a str,
    lines: &'a [ConfirmationLine],
    total: String,
    address: &'a ShippingAddress,
}

/// Render the confirmation email for an order.
///
/// Products missing from `products` are listed by id.
///
/// # Errors
///
/// Returns `NotificationError::Template` if rendering fails.
pub fn compose_order_confirmation(
    order: &Order,
    customer: &UserContact,
    products: &HashMap<ProductId, ProductDisplay>,
) -> Result<OutboundEmail, NotificationError> {
    let lines: Vec<ConfirmationLine> = order
        .items
        .iter()
        .map(|item| ConfirmationLine {
            name: products
                .get(&item.product_id)
                .map_or_else(|| item.product_id.to_string(), |p| p.name.clone()),
            quantity: item.quantity,
            unit_price: item.price.to_string(),
            line_total: item
                .price
                .checked_mul(item.quantity)
                .map_or_else(|_| "-".to_string(), |t| t.to_string()),
        })
        .collect();

    let order_id = order.id.to_string();
    let html = OrderConfirmationHtml {
        customer_name: &customer.name,
        order_id: &order_id,
        payment_mode: order.payment_mode.as_str(),
        payment_status: order.payment_status.as_str(),
        lines: &lines,
        total: order.amount.to_string(),
        address: &order.shipping_address,
    }
    .render()?;
    let text = OrderConfirmationText {
        customer_name: &customer.name,
        order_id: &order_id,
        payment_mode: order.payment_mode.as_str(),
        payment_status: order.payment_status.as_str(),
        lines: &lines,
        total: order.amount.to_string(),
        address: &order.shipping_address,
    }
    .render()?;

    Ok(OutboundEmail {
        to: customer.email.clone(),
        subject: format!("Order Confirmation - {order_id}"),
        text_body: text,
        html_body: html,
    })
}

/// Sends order confirmations after commit without ever failing the caller.
#[derive(Clone)]
pub struct ConfirmationSender {
    directory: Arc<dyn Directory>,
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl ConfirmationSender {
    #[must_use]
    pub fn new(directory: Arc<dyn Directory>, notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self {
            directory,
            notifier,
            timeout,
        }
    }

    /// Compose and send the confirmation for a committed order. Fire once.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn notify(&self, order: &Order) -> NotificationOutcome {
        match tokio::time::timeout(self.timeout, self.deliver(order)).await {
            Ok(Ok(true)) => {
                tracing::info!("Order confirmation sent");
                NotificationOutcome::Sent
            }
            Ok(Ok(false)) => {
                tracing::warn!(user_id = %order.user_id, "No user for order, confirmation skipped");
                NotificationOutcome::Skipped
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Order confirmation failed");
                NotificationOutcome::Failed
            }
            Err(_) => {
                let e = NotificationError::Timeout(self.timeout);
                tracing::warn!(error = %e, "Order confirmation failed");
                NotificationOutcome::Failed
            }
        }
    }

    /// Returns `Ok(false)` when there is nobody to send to.
    async fn deliver(&self, order: &Order) -> Result<bool, NotificationError> {
        let Some(customer) = self.directory.find_user(&order.user_id).await? else {
            return Ok(false);
        };

        let product_ids: Vec<ProductId> = order.items.iter().map(|i| i.product_id.clone()).collect();
        let products = self.directory.find_products(&product_ids).await?;

        let email = compose_order_confirmation(order, &customer, &products)?;
        self.notifier.send(&email).await?;
        Ok(true)
    }
}
