//! `PostgreSQL` order store.
//!
//! Orders are stored as documents: the line items and the shipping snapshot
//! are JSONB columns, while the fields used for filtering and ordering are
//! plain columns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use qmart_core::{Amount, LineItem, Order, OrderId, ShippingAddress, UserId};

use super::{OrderStore, RepositoryError, map_insert_error, parse_column};

const SELECT_ORDER: &str = r#"
    SELECT id, user_id, items, shipping_address, amount, payment_mode,
           payment_status, status, gateway_order_ref, gateway_payment_ref,
           version, created_at
    FROM storefront."order"
"#;

/// Raw row from `storefront.order`.
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: String,
    user_id: String,
    items: Json<Vec<LineItem>>,
    shipping_address: Json<ShippingAddress>,
    amount: Decimal,
    payment_mode: String,
    payment_status: String,
    status: String,
    gateway_order_ref: Option<String>,
    gateway_payment_ref: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_column(&row.id, "order id")?,
            user_id: parse_column(&row.user_id, "user id")?,
            items: row.items.0,
            shipping_address: row.shipping_address.0,
            amount: Amount::new(row.amount).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid amount in database: {e}"))
            })?,
            payment_mode: parse_column(&row.payment_mode, "payment mode")?,
            payment_status: parse_column(&row.payment_status, "payment status")?,
            status: parse_column(&row.status, "order status")?,
            gateway_order_ref: row.gateway_order_ref,
            gateway_payment_ref: row.gateway_payment_ref,
            version: row.version,
            created_at: row.created_at,
        })
    }
}

/// Order store backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_many(
        &self,
        user_id: Option<&UserId>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = match user_id {
            Some(user_id) => {
                sqlx::query_as::<_, OrderRow>(&format!(
                    "{SELECT_ORDER} WHERE user_id = $1 ORDER BY created_at DESC"
                ))
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} ORDER BY created_at DESC"))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(Order::try_from).collect()
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO storefront."order"
                (id, user_id, items, shipping_address, amount, payment_mode,
                 payment_status, status, gateway_order_ref, gateway_payment_ref,
                 version, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(Json(&order.items))
        .bind(Json(&order.shipping_address))
        .bind(order.amount.value())
        .bind(order.payment_mode.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.status.as_str())
        .bind(order.gateway_order_ref.as_deref())
        .bind(order.gateway_payment_ref.as_deref())
        .bind(order.version)
        .bind(order.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "order"))?;

        Ok(())
    }

    async fn get(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    async fn replace(&self, mut order: Order) -> Result<Order, RepositoryError> {
        let new_version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE storefront."order"
            SET items = $3,
                shipping_address = $4,
                amount = $5,
                payment_mode = $6,
                payment_status = $7,
                status = $8,
                gateway_order_ref = $9,
                gateway_payment_ref = $10,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING version
            "#,
        )
        .bind(&order.id)
        .bind(order.version)
        .bind(Json(&order.items))
        .bind(Json(&order.shipping_address))
        .bind(order.amount.value())
        .bind(order.payment_mode.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.status.as_str())
        .bind(order.gateway_order_ref.as_deref())
        .bind(order.gateway_payment_ref.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(version) = new_version {
            order.version = version;
            return Ok(order);
        }

        let exists: bool =
            sqlx::query_scalar(r#"SELECT EXISTS (SELECT 1 FROM storefront."order" WHERE id = $1)"#)
                .bind(&order.id)
                .fetch_one(&self.pool)
                .await?;

        if exists {
            Err(RepositoryError::VersionConflict {
                expected: order.version,
            })
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    async fn delete(&self, id: &OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(r#"DELETE FROM storefront."order" WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        self.fetch_many(None).await
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Order>, RepositoryError> {
        self.fetch_many(Some(user_id)).await
    }
}
