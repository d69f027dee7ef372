//! Q-Mart Core - Domain types for the order and payment backend.
//!
//! This crate provides the types shared by the storefront server and the
//! operator CLI:
//! - `storefront` - HTTP API for checkout, payments and order management
//! - `cli` - Migrations and payment support tooling
//!
//! # Architecture
//!
//! The core crate contains only types and pure state transitions - no I/O,
//! no database access, no HTTP clients. Every rule about how an order and its
//! line items may change lives here so that it can be tested without a
//! database and reused by any storage backend.
//!
//! # Modules
//!
//! - [`types`] - Document ids, amounts and status enums
//! - [`order`] - The order aggregate and its line item state machines
//! - [`payment`] - Append-only payment ledger records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod order;
pub mod payment;
pub mod types;

pub use order::{GatewayRefs, LineItem, NewLineItem, NewOrder, Order, OrderError, ShippingAddress};
pub use payment::{PaymentAttempt, PaymentRecord};
pub use types::*;
