//! Payment route handlers.
//!
//! Gateway checkout is two calls: the client first asks for a gateway order
//! (`create-order`), completes payment with the gateway, then posts the
//! gateway's signed confirmation together with the cart to `verify`.
//! Cash-on-delivery skips the gateway entirely.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use qmart_core::{
    Amount, NewLineItem, Order, PaymentId, PaymentMode, PaymentRecord, ShippingAddress, UserId,
};

use crate::error::{AppError, Result, ValidatedJson};
use crate::services::checkout::{CheckoutReceipt, CheckoutRequest, GatewayConfirmation};
use crate::services::notification::NotificationOutcome;
use crate::state::AppState;

use super::parse_path_id;

/// Body of `POST /api/payment/create-order`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateOrderRequest {
    pub amount: Amount,
}

/// Body of `POST /api/payment/verify`.
///
/// The three gateway fields accept the gateway's native names as well.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VerifyPaymentRequest {
    #[serde(default, alias = "razorpay_order_id")]
    pub gateway_order_ref: Option<String>,
    #[serde(default, alias = "razorpay_payment_id")]
    pub gateway_payment_ref: Option<String>,
    #[serde(default, alias = "razorpay_signature")]
    pub signature: Option<String>,
    pub user_id: UserId,
    pub amount: Amount,
    pub items: Vec<NewLineItem>,
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub payment_mode: Option<PaymentMode>,
}

/// Body of `POST /api/payment/cod`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CashOnDeliveryRequest {
    pub user_id: UserId,
    pub amount: Amount,
    pub items: Vec<NewLineItem>,
    pub shipping_address: ShippingAddress,
    /// Accepted for client compatibility; always stored as cash-on-delivery.
    #[serde(default)]
    pub payment_mode: Option<PaymentMode>,
}

/// Successful checkout response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub success: bool,
    pub message: &'static str,
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<PaymentId>,
    pub notification: NotificationOutcome,
}

impl CheckoutResponse {
    fn new(message: &'static str, receipt: CheckoutReceipt) -> Self {
        Self {
            success: true,
            message,
            order: receipt.order,
            payment_id: receipt.payment.map(|p| p.id),
            notification: receipt.notification,
        }
    }
}

/// Create a gateway order for the given amount.
///
/// Returns the gateway's order descriptor unchanged.
#[instrument(skip(state))]
pub async fn create_order(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CreateOrderRequest>,
) -> Result<Json<serde_json::Value>> {
    let gateway = state
        .gateway()
        .ok_or_else(|| AppError::Configuration("payment gateway is not configured".to_string()))?;

    let descriptor = gateway.create_order(body.amount).await?;
    Ok(Json(descriptor))
}

/// Verify a gateway payment and create the paid order.
#[instrument(skip_all)]
pub async fn verify(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<VerifyPaymentRequest>,
) -> Result<Json<CheckoutResponse>> {
    let confirmation = GatewayConfirmation {
        order_ref: body.gateway_order_ref,
        payment_ref: body.gateway_payment_ref,
        signature: body.signature,
    };
    let request = CheckoutRequest {
        user_id: body.user_id,
        items: body.items,
        shipping_address: body.shipping_address,
        amount: body.amount,
        payment_mode: body.payment_mode,
    };

    let receipt = state
        .checkout()
        .confirm_gateway_payment(confirmation, request)
        .await?;

    Ok(Json(CheckoutResponse::new(
        "Payment verified and order created",
        receipt,
    )))
}

/// Place a cash-on-delivery order.
#[instrument(skip_all)]
pub async fn cash_on_delivery(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CashOnDeliveryRequest>,
) -> Result<Json<CheckoutResponse>> {
    let request = CheckoutRequest {
        user_id: body.user_id,
        items: body.items,
        shipping_address: body.shipping_address,
        amount: body.amount,
        payment_mode: Some(PaymentMode::CashOnDelivery),
    };

    let receipt = state.checkout().place_cash_on_delivery(request).await?;

    Ok(Json(CheckoutResponse::new(
        "Order placed with cash on delivery",
        receipt,
    )))
}

/// Look up one ledger record.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<PaymentRecord>> {
    let payment_id: PaymentId = parse_path_id(&payment_id, "payment")?;

    state
        .payments()
        .get(&payment_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))
}
