//! The order aggregate.
//!
//! An [`Order`] owns its [`LineItem`]s outright. Each line item has its own
//! fulfilment status, and the order's overall status is kept consistent with
//! them by the transition methods here:
//!
//! - setting the order to `Delivered` marks every outstanding item delivered
//! - an item can only be returned once it has been delivered
//! - the order becomes `Returned` once every item has been returned
//!
//! Transitions are pure. Persisting them (and re-reading fresh state before
//! applying them) is the caller's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    Amount, AmountError, ItemStatus, LineItemId, OrderId, OrderStatus, PaymentMode,
    PaymentStatus, ProductId, UserId,
};

/// Reason recorded when a return arrives without one.
pub const DEFAULT_RETURN_REASON: &str = "Not specified";

/// Errors raised by order validation and state transitions.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("an order must contain at least one item")]
    EmptyOrder,

    #[error("quantity for product {0} must be at least 1")]
    InvalidQuantity(ProductId),

    #[error("amount {supplied} does not match the item total {expected}")]
    AmountMismatch { expected: Amount, supplied: Amount },

    #[error("order total overflowed")]
    AmountOverflow,

    #[error("shipping address is missing {0}")]
    MissingAddressField(&'static str),

    #[error("item {0} not found in order")]
    ItemNotFound(LineItemId),

    #[error("{0}")]
    InvalidState(&'static str),
}

impl From<AmountError> for OrderError {
    fn from(_: AmountError) -> Self {
        Self::AmountOverflow
    }
}

/// Shipping address copied into the order at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    pub state: String,
    #[serde(rename = "pincode", alias = "postalCode")]
    pub postal_code: String,
}

impl ShippingAddress {
    /// Check that every field carries a value.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::MissingAddressField` naming the first blank field.
    pub fn validate(&self) -> Result<(), OrderError> {
        let fields = [
            ("fullName", &self.full_name),
            ("phone", &self.phone),
            ("addressLine", &self.address_line),
            ("city", &self.city),
            ("state", &self.state),
            ("pincode", &self.postal_code),
        ];

        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(OrderError::MissingAddressField(name));
            }
        }
        Ok(())
    }
}

/// A line item as submitted at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewLineItem {
    #[serde(alias = "product")]
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Amount,
}

/// One product entry within an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: LineItemId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price captured at order time.
    pub price: Amount,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_reason: Option<String>,
}

/// External gateway references for an order paid online.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRefs {
    pub order_ref: String,
    pub payment_ref: String,
}

/// Everything needed to create an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub items: Vec<NewLineItem>,
    pub shipping_address: ShippingAddress,
    pub amount: Amount,
    pub payment_mode: PaymentMode,
    pub payment_status: PaymentStatus,
    pub gateway: Option<GatewayRefs>,
}

impl NewOrder {
    /// Validate items, amount and address without creating anything.
    ///
    /// # Errors
    ///
    /// Returns the first rule the submission violates.
    pub fn validate(&self) -> Result<(), OrderError> {
        let expected = items_total(&self.items)?;
        if expected != self.amount {
            return Err(OrderError::AmountMismatch {
                expected,
                supplied: self.amount,
            });
        }
        self.shipping_address.validate()
    }
}

/// Sum of `price * quantity` over the items.
///
/// # Errors
///
/// Fails on an empty list, a zero quantity, or arithmetic overflow.
pub fn items_total(items: &[NewLineItem]) -> Result<Amount, OrderError> {
    if items.is_empty() {
        return Err(OrderError::EmptyOrder);
    }

    items.iter().try_fold(Amount::ZERO, |total, item| {
        if item.quantity == 0 {
            return Err(OrderError::InvalidQuantity(item.product_id.clone()));
        }
        Ok(total.checked_add(item.price.checked_mul(item.quantity)?)?)
    })
}

/// One checkout transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<LineItem>,
    pub shipping_address: ShippingAddress,
    pub amount: Amount,
    pub payment_mode: PaymentMode,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_order_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_payment_ref: Option<String>,
    /// Incremented by the store on every successful replace.
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Create a new `Processing` order after validating the submission.
    ///
    /// # Errors
    ///
    /// Returns an error if [`NewOrder::validate`] fails.
    pub fn create(new: NewOrder) -> Result<Self, OrderError> {
        new.validate()?;

        let (gateway_order_ref, gateway_payment_ref) = match new.gateway {
            Some(refs) => (Some(refs.order_ref), Some(refs.payment_ref)),
            None => (None, None),
        };

        let items = new
            .items
            .into_iter()
            .map(|item| LineItem {
                id: LineItemId::generate(),
                product_id: item.product_id,
                quantity: item.quantity,
                price: item.price,
                status: ItemStatus::Pending,
                return_reason: None,
            })
            .collect();

        Ok(Self {
            id: OrderId::generate(),
            user_id: new.user_id,
            items,
            shipping_address: new.shipping_address,
            amount: new.amount,
            payment_mode: new.payment_mode,
            payment_status: new.payment_status,
            status: OrderStatus::Processing,
            gateway_order_ref,
            gateway_payment_ref,
            version: 1,
            created_at: Utc::now(),
        })
    }

    /// Find a line item by id.
    #[must_use]
    pub fn item(&self, item_id: &LineItemId) -> Option<&LineItem> {
        self.items.iter().find(|item| &item.id == item_id)
    }

    /// Overwrite the order status.
    ///
    /// Any status may follow any other. Setting `Delivered` also marks every
    /// item delivered, except items that were already returned.
    pub fn apply_status(&mut self, status: OrderStatus) {
        if status == OrderStatus::Delivered {
            for item in &mut self.items {
                if item.status != ItemStatus::Returned {
                    item.status = ItemStatus::Delivered;
                }
            }
        }
        self.status = status;
    }

    /// Cancel the order. Items keep their status.
    ///
    /// # Errors
    ///
    /// Fails if the order is delivered or already cancelled.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::Delivered => Err(OrderError::InvalidState(
                "Delivered orders cannot be cancelled",
            )),
            OrderStatus::Cancelled => Err(OrderError::InvalidState("Order is already cancelled")),
            _ => {
                self.status = OrderStatus::Cancelled;
                Ok(())
            }
        }
    }

    /// Return every item of a delivered order.
    ///
    /// # Errors
    ///
    /// Fails unless the order is `Delivered` and every item has been
    /// delivered or returned.
    pub fn return_whole(&mut self, reason: Option<&str>) -> Result<(), OrderError> {
        if self.status != OrderStatus::Delivered {
            return Err(OrderError::InvalidState(
                "Only delivered orders can be returned",
            ));
        }
        if self
            .items
            .iter()
            .any(|item| !matches!(item.status, ItemStatus::Delivered | ItemStatus::Returned))
        {
            return Err(OrderError::InvalidState(
                "Every item must be delivered before the order can be returned",
            ));
        }

        let reason = normalize_reason(reason);
        for item in &mut self.items {
            if item.status == ItemStatus::Delivered {
                item.status = ItemStatus::Returned;
                item.return_reason = Some(reason.clone());
            }
        }
        self.status = OrderStatus::Returned;
        Ok(())
    }

    /// Return a single delivered item.
    ///
    /// The order becomes `Returned` once no item is left unreturned.
    ///
    /// # Errors
    ///
    /// Fails if the order is cancelled, the item is missing, or the item has
    /// not been delivered.
    pub fn return_item(
        &mut self,
        item_id: &LineItemId,
        reason: Option<&str>,
    ) -> Result<(), OrderError> {
        if self.status == OrderStatus::Cancelled {
            return Err(OrderError::InvalidState(
                "Cancelled orders cannot be returned",
            ));
        }

        let item = self
            .items
            .iter_mut()
            .find(|item| &item.id == item_id)
            .ok_or_else(|| OrderError::ItemNotFound(item_id.clone()))?;

        if item.status != ItemStatus::Delivered {
            return Err(OrderError::InvalidState(
                "Only delivered items can be returned",
            ));
        }

        item.status = ItemStatus::Returned;
        item.return_reason = Some(normalize_reason(reason));

        if self
            .items
            .iter()
            .all(|item| item.status == ItemStatus::Returned)
        {
            self.status = OrderStatus::Returned;
        }
        Ok(())
    }
}

fn normalize_reason(reason: Option<&str>) -> String {
    reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_RETURN_REASON)
        .to_owned()
}
