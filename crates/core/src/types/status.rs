//! Status enums for orders, line items and payments.
//!
//! Every enum serialises to the same display string that clients send, so a
//! stored document and an API payload always agree on spelling.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// A status string that does not name a known variant.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseStatusError {
    pub kind: &'static str,
    pub value: String,
}

/// Implements `as_str`, `Display` and `FromStr` from a single variant table.
macro_rules! status_strings {
    ($ty:ident, $kind:literal, { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            /// The canonical string for this status.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $s,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant),)+
                    other => Err(ParseStatusError {
                        kind: $kind,
                        value: other.to_owned(),
                    }),
                }
            }
        }
    };
}

/// Overall order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    Processing,
    Shipped,
    Delivered,
    Returned,
    Cancelled,
}

status_strings!(OrderStatus, "order status", {
    Processing => "Processing",
    Shipped => "Shipped",
    Delivered => "Delivered",
    Returned => "Returned",
    Cancelled => "Cancelled",
});

/// Fulfilment status of a single line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ItemStatus {
    #[default]
    Pending,
    Delivered,
    Returned,
    Cancelled,
}

status_strings!(ItemStatus, "item status", {
    Pending => "Pending",
    Delivered => "Delivered",
    Returned => "Returned",
    Cancelled => "Cancelled",
});

/// Whether money for an order has been collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

status_strings!(PaymentStatus, "payment status", {
    Pending => "Pending",
    Paid => "Paid",
    Failed => "Failed",
});

/// How the customer pays.
///
/// Storefront clients send the instrument they picked ("UPI", "Credit Card",
/// ...). All online instruments settle through the gateway, so they collapse
/// into [`PaymentMode::Gateway`] on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentMode {
    #[serde(
        alias = "Razorpay",
        alias = "UPI",
        alias = "Credit Card",
        alias = "Debit Card",
        alias = "Net Banking",
        alias = "Wallet"
    )]
    Gateway,
    #[serde(rename = "CashOnDelivery", alias = "Cash on Delivery", alias = "COD")]
    CashOnDelivery,
    #[default]
    Other,
}

status_strings!(PaymentMode, "payment mode", {
    Gateway => "Gateway",
    CashOnDelivery => "CashOnDelivery",
    Other => "Other",
});

/// Result of verifying a gateway payment confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Success,
    Failed,
}

status_strings!(PaymentOutcome, "payment outcome", {
    Success => "success",
    Failed => "failed",
});
