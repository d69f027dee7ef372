//! Order management.
//!
//! Every mutation is a read-modify-write against the stored document: fetch
//! the freshest order, check the precondition on that copy, apply, and store
//! it only if nobody else wrote in between. On a version conflict the whole
//! sequence repeats, so a precondition is never approved against stale state.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use qmart_core::{LineItemId, NewOrder, Order, OrderError, OrderId, OrderStatus, ProductId, UserId};

use crate::db::{Directory, OrderStore, RepositoryError};
use crate::models::OrderView;

/// Attempts per mutation before giving up with `Contention`.
pub const MAX_ATTEMPTS: u32 = 3;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderServiceError {
    #[error("Order not found")]
    NotFound,

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("order {0} is being modified concurrently, try again")]
    Contention(OrderId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Order queries and state transitions.
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    directory: Arc<dyn Directory>,
}

impl OrderService {
    #[must_use]
    pub fn new(orders: Arc<dyn OrderStore>, directory: Arc<dyn Directory>) -> Self {
        Self { orders, directory }
    }

    /// Create an order directly, outside checkout.
    ///
    /// # Errors
    ///
    /// Returns `Order` for an invalid submission or `Repository` if the write fails.
    #[instrument(skip_all, fields(user_id = %new.user_id))]
    pub async fn create(&self, new: NewOrder) -> Result<Order, OrderServiceError> {
        let order = Order::create(new)?;
        self.orders.insert(&order).await?;
        tracing::info!(order_id = %order.id, "Order created");
        Ok(order)
    }

    /// # Errors
    ///
    /// Returns `NotFound` if there is no such order.
    pub async fn get(&self, id: &OrderId) -> Result<Order, OrderServiceError> {
        self.orders.get(id).await?.ok_or(OrderServiceError::NotFound)
    }

    /// Overwrite the status, cascading `Delivered` to the items.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Contention` or `Repository`.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn set_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<Order, OrderServiceError> {
        self.mutate(id, |order| {
            order.apply_status(status);
            Ok(())
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `Order(InvalidState)` if the order is delivered or already cancelled.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn cancel(&self, id: &OrderId) -> Result<Order, OrderServiceError> {
        self.mutate(id, Order::cancel).await
    }

    /// # Errors
    ///
    /// Returns `Order(InvalidState)` unless the order is delivered.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn return_whole(
        &self,
        id: &OrderId,
        reason: Option<&str>,
    ) -> Result<Order, OrderServiceError> {
        self.mutate(id, |order| order.return_whole(reason)).await
    }

    /// # Errors
    ///
    /// Returns `NotFound`, `Order(ItemNotFound)`, or `Order(InvalidState)`
    /// unless the item is delivered and the order not cancelled.
    #[instrument(skip(self), fields(order_id = %id, item_id = %item_id))]
    pub async fn return_item(
        &self,
        id: &OrderId,
        item_id: &LineItemId,
        reason: Option<&str>,
    ) -> Result<Order, OrderServiceError> {
        self.mutate(id, |order| order.return_item(item_id, reason))
            .await
    }

    /// Hard delete.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there was nothing to delete.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn delete(&self, id: &OrderId) -> Result<(), OrderServiceError> {
        if self.orders.delete(id).await? {
            tracing::info!("Order deleted");
            Ok(())
        } else {
            Err(OrderServiceError::NotFound)
        }
    }

    /// Every order, newest first, with customer and product display fields.
    ///
    /// # Errors
    ///
    /// Returns `Repository` if a lookup fails.
    pub async fn list_all(&self) -> Result<Vec<OrderView>, OrderServiceError> {
        let orders = self.orders.list_all().await?;
        self.project(orders).await
    }

    /// One customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Repository` if a lookup fails.
    pub async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<OrderView>, OrderServiceError> {
        let orders = self.orders.list_by_user(user_id).await?;
        self.project(orders).await
    }

    async fn project(&self, orders: Vec<Order>) -> Result<Vec<OrderView>, OrderServiceError> {
        let user_ids: BTreeSet<&UserId> = orders.iter().map(|o| &o.user_id).collect();
        let mut users = HashMap::with_capacity(user_ids.len());
        for user_id in user_ids {
            if let Some(contact) = self.directory.find_user(user_id).await? {
                users.insert(user_id.clone(), contact);
            }
        }

        let product_ids: Vec<ProductId> = orders
            .iter()
            .flat_map(|o| o.items.iter().map(|i| i.product_id.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let products = self.directory.find_products(&product_ids).await?;

        Ok(orders
            .into_iter()
            .map(|order| {
                let user = users.get(&order.user_id).cloned();
                OrderView::new(order, user, &products)
            })
            .collect())
    }

    /// Apply `op` to the freshest copy of the order and store it.
    async fn mutate<F>(&self, id: &OrderId, op: F) -> Result<Order, OrderServiceError>
    where
        F: Fn(&mut Order) -> Result<(), OrderError> + Send + Sync,
    {
        for attempt in 1..=MAX_ATTEMPTS {
            let mut order = self.get(id).await?;
            op(&mut order)?;

            match self.orders.replace(order).await {
                Ok(saved) => {
                    tracing::info!(status = %saved.status, version = saved.version, "Order updated");
                    return Ok(saved);
                }
                Err(RepositoryError::VersionConflict { expected }) => {
                    tracing::warn!(attempt, expected, "Order changed while updating, retrying");
                }
                Err(RepositoryError::NotFound) => return Err(OrderServiceError::NotFound),
                Err(e) => return Err(e.into()),
            }
        }

        Err(OrderServiceError::Contention(id.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use qmart_core::{
        Amount, ItemStatus, NewLineItem, PaymentMode, PaymentStatus, ShippingAddress,
    };

    use crate::db::{InMemoryDirectory, InMemoryOrderStore};
    use crate::models::{ProductDisplay, UserContact};

    fn submission(user_id: &UserId, product_ids: &[ProductId]) -> NewOrder {
        NewOrder {
            user_id: user_id.clone(),
            items: product_ids
                .iter()
                .map(|id| NewLineItem {
                    product_id: id.clone(),
                    quantity: 1,
                    price: Amount::new(Decimal::from(100)).unwrap(),
                })
                .collect(),
            shipping_address: ShippingAddress {
                full_name: "Kavya Iyer".to_string(),
                phone: "9445566778".to_string(),
                address_line: "3 Anna Salai".to_string(),
                city: "Chennai".to_string(),
                state: "Tamil Nadu".to_string(),
                postal_code: "600002".to_string(),
            },
            amount: Amount::new(Decimal::from(100 * i64::try_from(product_ids.len()).unwrap()))
                .unwrap(),
            payment_mode: PaymentMode::CashOnDelivery,
            payment_status: PaymentStatus::Pending,
            gateway: None,
        }
    }

    fn service_with(store: Arc<dyn OrderStore>) -> OrderService {
        OrderService::new(store, Arc::new(InMemoryDirectory::new()))
    }

    async fn two_item_order(service: &OrderService) -> Order {
        service
            .create(submission(
                &UserId::generate(),
                &[ProductId::generate(), ProductId::generate()],
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let service = service_with(Arc::new(InMemoryOrderStore::new()));
        let id = OrderId::generate();

        assert!(matches!(service.get(&id).await, Err(OrderServiceError::NotFound)));
        assert!(matches!(
            service.set_status(&id, OrderStatus::Shipped).await,
            Err(OrderServiceError::NotFound)
        ));
        assert!(matches!(service.cancel(&id).await, Err(OrderServiceError::NotFound)));
        assert!(matches!(service.delete(&id).await, Err(OrderServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_status_then_item_returns() {
        let service = service_with(Arc::new(InMemoryOrderStore::new()));
        let order = two_item_order(&service).await;

        let delivered = service
            .set_status(&order.id, OrderStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(delivered.version, 2);
        assert!(delivered.items.iter().all(|i| i.status == ItemStatus::Delivered));

        let first = service
            .return_item(&order.id, &order.items[0].id, Some("broken seal"))
            .await
            .unwrap();
        assert_eq!(first.status, OrderStatus::Delivered);

        let second = service
            .return_item(&order.id, &order.items[1].id, None)
            .await
            .unwrap();
        assert_eq!(second.status, OrderStatus::Returned);
        assert_eq!(second.version, 4);
    }

    #[tokio::test]
    async fn test_failed_precondition_leaves_order_unchanged() {
        let service = service_with(Arc::new(InMemoryOrderStore::new()));
        let order = two_item_order(&service).await;

        let err = service
            .return_item(&order.id, &order.items[0].id, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderServiceError::Order(OrderError::InvalidState(_))
        ));
        assert_eq!(service.get(&order.id).await.unwrap(), order);
    }

    #[tokio::test]
    async fn test_cancel_is_not_repeatable() {
        let service = service_with(Arc::new(InMemoryOrderStore::new()));
        let order = two_item_order(&service).await;

        let cancelled = service.cancel(&order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(matches!(
            service.cancel(&order.id).await,
            Err(OrderServiceError::Order(OrderError::InvalidState(_)))
        ));
    }

    /// Cancels the order behind the caller's back before the first replace.
    struct RacingStore {
        inner: InMemoryOrderStore,
        raced: AtomicBool,
    }

    #[async_trait]
    impl OrderStore for RacingStore {
        async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
            self.inner.insert(order).await
        }
        async fn get(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
            self.inner.get(id).await
        }
        async fn replace(&self, order: Order) -> Result<Order, RepositoryError> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let mut competitor = self.inner.get(&order.id).await?.unwrap();
                competitor.apply_status(OrderStatus::Shipped);
                competitor.cancel().unwrap();
                self.inner.replace(competitor).await?;
            }
            self.inner.replace(order).await
        }
        async fn delete(&self, id: &OrderId) -> Result<bool, RepositoryError> {
            self.inner.delete(id).await
        }
        async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
            self.inner.list_all().await
        }
        async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Order>, RepositoryError> {
            self.inner.list_by_user(user_id).await
        }
    }

    #[tokio::test]
    async fn test_return_revalidated_after_concurrent_cancel() {
        let inner = InMemoryOrderStore::new();
        let setup = service_with(Arc::new(inner.clone()));
        let order = two_item_order(&setup).await;
        setup.set_status(&order.id, OrderStatus::Delivered).await.unwrap();

        let racing = service_with(Arc::new(RacingStore {
            inner: inner.clone(),
            raced: AtomicBool::new(false),
        }));

        // The first attempt loses to the cancel; the retry sees a cancelled order.
        let err = racing
            .return_item(&order.id, &order.items[0].id, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderServiceError::Order(OrderError::InvalidState(_))
        ));

        let stored = inner.get(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
        assert_eq!(stored.items[0].status, ItemStatus::Delivered);
    }

    /// Every replace reports a conflict.
    struct AlwaysConflicting {
        inner: InMemoryOrderStore,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl OrderStore for AlwaysConflicting {
        async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
            self.inner.insert(order).await
        }
        async fn get(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
            self.inner.get(id).await
        }
        async fn replace(&self, order: Order) -> Result<Order, RepositoryError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(RepositoryError::VersionConflict {
                expected: order.version,
            })
        }
        async fn delete(&self, id: &OrderId) -> Result<bool, RepositoryError> {
            self.inner.delete(id).await
        }
        async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
            self.inner.list_all().await
        }
        async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Order>, RepositoryError> {
            self.inner.list_by_user(user_id).await
        }
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let store = Arc::new(AlwaysConflicting {
            inner: InMemoryOrderStore::new(),
            attempts: AtomicU32::new(0),
        });
        let service = service_with(store.clone());
        let order = two_item_order(&service).await;

        assert!(matches!(
            service.cancel(&order.id).await,
            Err(OrderServiceError::Contention(_))
        ));
        assert_eq!(store.attempts.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_listing_projection() {
        let store = InMemoryOrderStore::new();
        let directory = InMemoryDirectory::new();
        let service = OrderService::new(Arc::new(store), Arc::new(directory.clone()));

        let user = UserId::generate();
        let product = ProductId::generate();
        directory
            .insert_user(
                user.clone(),
                UserContact {
                    name: "Kavya".to_string(),
                    email: "kavya@qmart.test".to_string(),
                },
            )
            .await;
        directory
            .insert_product(
                product.clone(),
                ProductDisplay {
                    name: "Masala Chai 250g".to_string(),
                    price: Amount::new(Decimal::from(120)).unwrap(),
                    image: Some("/img/chai.jpg".to_string()),
                },
            )
            .await;

        service.create(submission(&user, &[product.clone()])).await.unwrap();
        service
            .create(submission(&UserId::generate(), &[ProductId::generate()]))
            .await
            .unwrap();

        let mine = service.list_by_user(&user).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].user.as_ref().unwrap().name, "Kavya");
        assert_eq!(mine[0].products[&product].name, "Masala Chai 250g");

        let all = service.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        let json = serde_json::to_value(&mine[0]).unwrap();
        assert_eq!(json["status"], "Processing");
        assert_eq!(json["user"]["email"], "kavya@qmart.test");
    }
}
