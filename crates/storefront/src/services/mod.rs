//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `signature` - Gateway payment signature verification (HMAC-SHA256)
//! - `gateway` - Gateway order creation over HTTP
//! - `notification` - Best-effort order confirmation behind a `Notifier` port
//! - `email` - SMTP `Notifier` implementation
//! - `checkout` - Payment reconciliation and cash-on-delivery workflows
//! - `orders` - Order queries and state transitions with optimistic retries

pub mod checkout;
pub mod email;
pub mod gateway;
pub mod notification;
pub mod orders;
pub mod signature;
