//! Read-side projection of an order for listings.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use qmart_core::{Order, ProductId};

use super::{ProductDisplay, UserContact};

/// An order joined with its customer and product display fields.
///
/// Serialises as the order document plus `user` and `products` keys.
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub user: Option<UserContact>,
    pub products: BTreeMap<ProductId, ProductDisplay>,
}

impl OrderView {
    /// Build a view, keeping only the products this order references.
    #[must_use]
    pub fn new(
        order: Order,
        user: Option<UserContact>,
        products: &HashMap<ProductId, ProductDisplay>,
    ) -> Self {
        let products = order
            .items
            .iter()
            .filter_map(|item| {
                products
                    .get(&item.product_id)
                    .map(|p| (item.product_id.clone(), p.clone()))
            })
            .collect();

        Self {
            order,
            user,
            products,
        }
    }
}
