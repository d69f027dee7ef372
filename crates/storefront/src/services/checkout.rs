//! Checkout reconciliation.
//!
//! Each checkout attempt moves through these stages:
//!
//! ```text
//! Received -> Verified -> PaymentPersisted -> OrderPersisted -> Notified -> Done
//!     |           |              |                  |
//!     v           v              v                  v
//!  Rejected    Rejected        Failed             Failed
//! ```
//!
//! Cash-on-delivery orders skip `Verified` and `PaymentPersisted`.
//!
//! Nothing is written before the signature checks out. Once a write has
//! committed it is never rolled back: if the order write fails after the
//! payment was recorded, the error says so and carries the payment id.
//! Notification runs last and cannot change the outcome.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use qmart_core::{
    Amount, GatewayRefs, NewLineItem, NewOrder, Order, OrderError, PaymentAttempt, PaymentId,
    PaymentMode, PaymentOutcome, PaymentRecord, PaymentStatus, ShippingAddress, UserId,
};

use super::notification::{ConfirmationSender, NotificationOutcome};
use super::signature::SignatureVerifier;
use crate::db::{OrderStore, PaymentLedger, RepositoryError};

/// Stages of a checkout attempt, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStage {
    Received,
    Verified,
    PaymentPersisted,
    OrderPersisted,
    Notified,
    Done,
    Rejected,
    Failed,
}

impl fmt::Display for CheckoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Verified => "verified",
            Self::PaymentPersisted => "payment_persisted",
            Self::OrderPersisted => "order_persisted",
            Self::Notified => "notified",
            Self::Done => "done",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Errors that end a checkout attempt.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("missing payment fields")]
    MissingFields,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("payment gateway is not configured")]
    GatewayNotConfigured,

    #[error("{0}")]
    Validation(#[from] OrderError),

    #[error("failed to record payment: {0}")]
    PaymentPersistence(#[source] RepositoryError),

    /// The payment is in the ledger but no order was stored for it.
    #[error("payment {payment_id} recorded but order creation failed: {source}")]
    OrderPersistenceAfterPayment {
        payment_id: PaymentId,
        #[source]
        source: RepositoryError,
    },

    #[error("failed to create order: {0}")]
    OrderPersistence(#[source] RepositoryError),
}

impl CheckoutError {
    /// The stage this error ends the attempt in.
    #[must_use]
    pub const fn stage(&self) -> CheckoutStage {
        match self {
            Self::MissingFields | Self::InvalidSignature | Self::Validation(_) => {
                CheckoutStage::Rejected
            }
            _ => CheckoutStage::Failed,
        }
    }
}

/// Gateway callback fields. All three are required.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfirmation {
    pub order_ref: Option<String>,
    pub payment_ref: Option<String>,
    pub signature: Option<String>,
}

/// What the customer is buying and where it goes.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    pub items: Vec<NewLineItem>,
    pub shipping_address: ShippingAddress,
    pub amount: Amount,
    pub payment_mode: Option<PaymentMode>,
}

/// Result of a successful checkout.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub order: Order,
    /// Present for gateway payments.
    pub payment: Option<PaymentRecord>,
    pub notification: NotificationOutcome,
}

/// Orchestrates verification, ledger and order writes, and confirmation.
#[derive(Clone)]
pub struct CheckoutService {
    orders: Arc<dyn OrderStore>,
    ledger: Arc<dyn PaymentLedger>,
    verifier: Option<SignatureVerifier>,
    confirmations: ConfirmationSender,
}

impl CheckoutService {
    /// `verifier` is `None` when the gateway is not configured, in which case
    /// every gateway confirmation fails closed.
    #[must_use]
    pub fn new(
        orders: Arc<dyn OrderStore>,
        ledger: Arc<dyn PaymentLedger>,
        verifier: Option<SignatureVerifier>,
        confirmations: ConfirmationSender,
    ) -> Self {
        Self {
            orders,
            ledger,
            verifier,
            confirmations,
        }
    }

    /// Reconcile a gateway payment confirmation into a paid order.
    ///
    /// # Errors
    ///
    /// - `MissingFields` / `Validation` / `InvalidSignature` before any write
    /// - `GatewayNotConfigured` when there is no secret to verify against
    /// - `PaymentPersistence` if the ledger write fails
    /// - `OrderPersistenceAfterPayment` if the order write fails after the
    ///   payment was recorded
    #[instrument(skip_all, fields(user_id = %request.user_id))]
    pub async fn confirm_gateway_payment(
        &self,
        confirmation: GatewayConfirmation,
        request: CheckoutRequest,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let result = self.run_gateway(confirmation, request).await;
        if let Err(e) = &result {
            log_failure(e);
        }
        result
    }

    async fn run_gateway(
        &self,
        confirmation: GatewayConfirmation,
        request: CheckoutRequest,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let (Some(order_ref), Some(payment_ref), Some(signature)) = (
            non_empty(confirmation.order_ref),
            non_empty(confirmation.payment_ref),
            non_empty(confirmation.signature),
        ) else {
            return Err(CheckoutError::MissingFields);
        };

        let payment_mode = request.payment_mode.unwrap_or(PaymentMode::Gateway);
        let user_id = request.user_id.clone();
        let amount = request.amount;
        let order = Order::create(NewOrder {
            user_id: request.user_id,
            items: request.items,
            shipping_address: request.shipping_address,
            amount: request.amount,
            payment_mode,
            payment_status: PaymentStatus::Paid,
            gateway: Some(GatewayRefs {
                order_ref: order_ref.clone(),
                payment_ref: payment_ref.clone(),
            }),
        })?;
        tracing::info!(stage = %CheckoutStage::Received, gateway_order_ref = %order_ref, "Checkout received");

        let verifier = self
            .verifier
            .as_ref()
            .ok_or(CheckoutError::GatewayNotConfigured)?;
        if !verifier.verify(&order_ref, &payment_ref, &signature) {
            return Err(CheckoutError::InvalidSignature);
        }
        tracing::info!(stage = %CheckoutStage::Verified, "Signature verified");

        let payment = self
            .ledger
            .record(PaymentAttempt {
                user_id,
                gateway_order_ref: order_ref,
                gateway_payment_ref: payment_ref,
                signature,
                amount,
                outcome: PaymentOutcome::Success,
                payment_mode,
            })
            .await
            .map_err(CheckoutError::PaymentPersistence)?;
        tracing::info!(stage = %CheckoutStage::PaymentPersisted, payment_id = %payment.id, "Payment recorded");

        self.orders
            .insert(&order)
            .await
            .map_err(|source| CheckoutError::OrderPersistenceAfterPayment {
                payment_id: payment.id.clone(),
                source,
            })?;
        tracing::info!(stage = %CheckoutStage::OrderPersisted, order_id = %order.id, "Order created");

        let notification = self.notify(&order).await;
        Ok(CheckoutReceipt {
            order,
            payment: Some(payment),
            notification,
        })
    }

    /// Create a cash-on-delivery order. No signature is involved.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad submission, `OrderPersistence` if the write fails.
    #[instrument(skip_all, fields(user_id = %request.user_id))]
    pub async fn place_cash_on_delivery(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let result = self.run_cash_on_delivery(request).await;
        if let Err(e) = &result {
            log_failure(e);
        }
        result
    }

    async fn run_cash_on_delivery(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let order = Order::create(NewOrder {
            user_id: request.user_id,
            items: request.items,
            shipping_address: request.shipping_address,
            amount: request.amount,
            payment_mode: PaymentMode::CashOnDelivery,
            payment_status: PaymentStatus::Pending,
            gateway: None,
        })?;
        tracing::info!(stage = %CheckoutStage::Received, "Cash-on-delivery checkout received");

        self.orders
            .insert(&order)
            .await
            .map_err(CheckoutError::OrderPersistence)?;
        tracing::info!(stage = %CheckoutStage::OrderPersisted, order_id = %order.id, "Order created");

        let notification = self.notify(&order).await;
        Ok(CheckoutReceipt {
            order,
            payment: None,
            notification,
        })
    }

    async fn notify(&self, order: &Order) -> NotificationOutcome {
        let outcome = self.confirmations.notify(order).await;
        if outcome == NotificationOutcome::Failed {
            tracing::warn!(stage = %CheckoutStage::Notified, order_id = %order.id, "Confirmation not delivered, order unaffected");
        } else {
            tracing::info!(stage = %CheckoutStage::Notified, ?outcome, "Confirmation handled");
        }
        tracing::info!(stage = %CheckoutStage::Done, order_id = %order.id, "Checkout complete");
        outcome
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn log_failure(e: &CheckoutError) {
    match e.stage() {
        CheckoutStage::Rejected => {
            tracing::warn!(stage = %CheckoutStage::Rejected, error = %e, "Checkout rejected");
        }
        stage => tracing::error!(stage = %stage, error = %e, "Checkout failed"),
    }
}
