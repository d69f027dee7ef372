//! Persistence ports and their adapters.
//!
//! # Database: `qmart`
//!
//! ## Tables (schema `storefront`)
//!
//! - `order` - One row per order. Line items and the shipping snapshot are
//!   JSONB documents; `version` guards read-modify-write updates.
//! - `payment` - Append-only payment ledger. A trigger rejects UPDATE/DELETE.
//! - `user` - Customer names and emails (read-only here)
//! - `product` - Product display fields (read-only here)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p qmart-cli -- migrate
//! ```
//!
//! Every port has a `PostgreSQL` adapter and an in-memory adapter with the
//! same semantics. Services only ever see the traits.

pub mod directory;
pub mod memory;
pub mod orders;
pub mod payments;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use qmart_core::{Order, OrderId, PaymentAttempt, PaymentId, PaymentRecord, ProductId, UserId};

use crate::models::{ProductDisplay, UserContact};

pub use directory::PgDirectory;
pub use memory::{InMemoryDirectory, InMemoryOrderStore, InMemoryPaymentLedger};
pub use orders::PgOrderStore;
pub use payments::PgPaymentLedger;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate id).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The stored document changed since it was read.
    #[error("version conflict: expected version {expected}")]
    VersionConflict { expected: i64 },
}

/// Document store for orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new order.
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError>;

    /// Fetch the current state of an order.
    async fn get(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Replace an order if its stored version still equals `order.version`.
    ///
    /// Returns the stored order with its version incremented. Fails with
    /// `NotFound` if the order is gone and `VersionConflict` if another
    /// writer got there first.
    async fn replace(&self, order: Order) -> Result<Order, RepositoryError>;

    /// Hard delete. Returns `false` if there was nothing to delete.
    async fn delete(&self, id: &OrderId) -> Result<bool, RepositoryError>;

    /// Every order, newest first.
    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError>;

    /// A user's orders, newest first.
    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Order>, RepositoryError>;
}

/// Append-only payment ledger.
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Append an attempt and return the stored record.
    async fn record(&self, attempt: PaymentAttempt) -> Result<PaymentRecord, RepositoryError>;

    async fn get(&self, id: &PaymentId) -> Result<Option<PaymentRecord>, RepositoryError>;
}

/// Read-only lookups of users and products owned by other parts of the shop.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn find_user(&self, id: &UserId) -> Result<Option<UserContact>, RepositoryError>;

    /// Display info for the given products. Unknown ids are simply absent.
    async fn find_products(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, ProductDisplay>, RepositoryError>;

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique violation to `Conflict`, everything else to `Database`.
pub(crate) fn map_insert_error(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Parse a stored string column, reporting failures as data corruption.
pub(crate) fn parse_column<T>(value: &str, column: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid {column} in database: {e}")))
}
