//! In-memory adapters for every persistence port.
//!
//! Used by tests and by `STOREFRONT_STORAGE=memory` for local development.
//! Semantics match the `PostgreSQL` adapters, including version checks on
//! replace and newest-first listings.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use qmart_core::{Order, OrderId, PaymentAttempt, PaymentId, PaymentRecord, ProductId, UserId};

use super::{Directory, OrderStore, PaymentLedger, RepositoryError};
use crate::models::{ProductDisplay, UserContact};

/// A thread-safe in-memory order store.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders.
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    orders
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(RepositoryError::Conflict("order already exists".to_owned()));
        }
        orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn get(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.read().await.get(id).cloned())
    }

    async fn replace(&self, mut order: Order) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.write().await;
        let stored = orders.get_mut(&order.id).ok_or(RepositoryError::NotFound)?;

        if stored.version != order.version {
            return Err(RepositoryError::VersionConflict {
                expected: order.version,
            });
        }

        order.version += 1;
        // Identity and creation metadata never change on replace.
        order.user_id = stored.user_id.clone();
        order.created_at = stored.created_at;
        *stored = order.clone();
        Ok(order)
    }

    async fn delete(&self, id: &OrderId) -> Result<bool, RepositoryError> {
        Ok(self.orders.write().await.remove(id).is_some())
    }

    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(newest_first(orders.values().cloned().collect()))
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(newest_first(
            orders
                .values()
                .filter(|o| &o.user_id == user_id)
                .cloned()
                .collect(),
        ))
    }
}

/// A thread-safe, append-only in-memory payment ledger.
#[derive(Default, Clone)]
pub struct InMemoryPaymentLedger {
    records: Arc<RwLock<Vec<PaymentRecord>>>,
}

impl InMemoryPaymentLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, oldest first.
    pub async fn records(&self) -> Vec<PaymentRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl PaymentLedger for InMemoryPaymentLedger {
    async fn record(&self, attempt: PaymentAttempt) -> Result<PaymentRecord, RepositoryError> {
        let record = PaymentRecord::from_attempt(attempt);
        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: &PaymentId) -> Result<Option<PaymentRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| &r.id == id).cloned())
    }
}

/// In-memory users and products.
#[derive(Default, Clone)]
pub struct InMemoryDirectory {
    users: Arc<RwLock<HashMap<UserId, UserContact>>>,
    products: Arc<RwLock<HashMap<ProductId, ProductDisplay>>>,
}

impl InMemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, id: UserId, contact: UserContact) {
        self.users.write().await.insert(id, contact);
    }

    pub async fn insert_product(&self, id: ProductId, display: ProductDisplay) {
        self.products.write().await.insert(id, display);
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn find_user(&self, id: &UserId) -> Result<Option<UserContact>, RepositoryError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_products(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, ProductDisplay>, RepositoryError> {
        let products = self.products.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| products.get(id).map(|p| (id.clone(), p.clone())))
            .collect())
    }
}
