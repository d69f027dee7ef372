//! Directory lookups for users and products.

use serde::{Deserialize, Serialize};

use qmart_core::Amount;

/// Name and email of the customer who placed an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContact {
    pub name: String,
    pub email: String,
}

/// Display fields of a catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDisplay {
    pub name: String,
    /// Current catalog price. Orders keep their own price snapshot.
    pub price: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}
