//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                               - Liveness
//! GET    /health/ready                         - Readiness (database ping)
//!
//! # Payments
//! POST   /api/payment/create-order             - Create a gateway order
//! POST   /api/payment/verify                   - Reconcile a gateway payment into an order
//! POST   /api/payment/cod                      - Place a cash-on-delivery order
//! GET    /api/payment/{paymentId}              - Ledger lookup
//!
//! # Orders
//! GET    /orders                               - All orders, newest first
//! POST   /orders                               - Direct order creation
//! GET    /orders/user/{userId}                 - One customer's orders
//! GET    /orders/{orderId}                     - One order
//! DELETE /orders/{orderId}                     - Hard delete
//! PUT    /orders/{orderId}/status              - Set status
//! PUT    /orders/{orderId}/cancel              - Cancel
//! POST   /orders/{orderId}/return              - Return the whole order
//! POST   /orders/{orderId}/items/{itemId}/return - Return one item
//! ```

pub mod health;
pub mod orders;
pub mod payment;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(payment::create_order))
        .route("/verify", post(payment::verify))
        .route("/cod", post(payment::cash_on_delivery))
        .route("/{payment_id}", get(payment::show))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/user/{user_id}", get(orders::by_user))
        .route("/{order_id}", get(orders::show).delete(orders::destroy))
        .route("/{order_id}/status", put(orders::set_status))
        .route("/{order_id}/cancel", put(orders::cancel))
        .route("/{order_id}/return", post(orders::return_order))
        .route("/{order_id}/items/{item_id}/return", post(orders::return_item))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/payment", payment_routes())
        .nest("/orders", order_routes())
}

/// Parse a document id from a path segment, rejecting malformed ids with 400.
pub(crate) fn parse_path_id<T>(raw: &str, what: &str) -> Result<T>
where
    T: std::str::FromStr,
{
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid {what} id")))
}
