//! `PostgreSQL` user and product lookups.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use qmart_core::{Amount, ProductId, UserId};

use super::{Directory, RepositoryError, parse_column};
use crate::models::{ProductDisplay, UserContact};

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    price: Decimal,
    image: Option<String>,
}

/// Directory backed by the shop's `user` and `product` tables.
#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn find_user(&self, id: &UserId) -> Result<Option<UserContact>, RepositoryError> {
        let row: Option<(String, String)> =
            sqlx::query_as(r#"SELECT name, email FROM storefront."user" WHERE id = $1"#)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(name, email)| UserContact { name, email }))
    }

    async fn find_products(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, ProductDisplay>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let keys: Vec<&str> = ids.iter().map(ProductId::as_str).collect();
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, price, image FROM storefront.product WHERE id = ANY($1)",
        )
        .bind(&keys)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let id = parse_column::<ProductId>(&row.id, "product id")?;
                let price = Amount::new(row.price).map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid price in database: {e}"))
                })?;
                Ok((
                    id,
                    ProductDisplay {
                        name: row.name,
                        price,
                        image: row.image,
                    },
                ))
            })
            .collect()
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
