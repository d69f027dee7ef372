//! `PostgreSQL` payment ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use qmart_core::{Amount, PaymentAttempt, PaymentId, PaymentRecord};

use super::{PaymentLedger, RepositoryError, map_insert_error, parse_column};

/// Raw row from `storefront.payment`.
#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: String,
    user_id: String,
    gateway_order_ref: String,
    gateway_payment_ref: String,
    signature: String,
    amount: Decimal,
    outcome: String,
    payment_mode: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for PaymentRecord {
    type Error = RepositoryError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_column(&row.id, "payment id")?,
            user_id: parse_column(&row.user_id, "user id")?,
            gateway_order_ref: row.gateway_order_ref,
            gateway_payment_ref: row.gateway_payment_ref,
            signature: row.signature,
            amount: Amount::new(row.amount).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid amount in database: {e}"))
            })?,
            outcome: parse_column(&row.outcome, "payment outcome")?,
            payment_mode: parse_column(&row.payment_mode, "payment mode")?,
            created_at: row.created_at,
        })
    }
}

/// Payment ledger backed by `PostgreSQL`.
///
/// The table only ever sees INSERT and SELECT from here; the migration adds a
/// trigger that rejects UPDATE and DELETE for everyone else.
#[derive(Clone)]
pub struct PgPaymentLedger {
    pool: PgPool,
}

impl PgPaymentLedger {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentLedger for PgPaymentLedger {
    async fn record(&self, attempt: PaymentAttempt) -> Result<PaymentRecord, RepositoryError> {
        let record = PaymentRecord::from_attempt(attempt);

        sqlx::query(
            r"
            INSERT INTO storefront.payment
                (id, user_id, gateway_order_ref, gateway_payment_ref, signature,
                 amount, outcome, payment_mode, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.gateway_order_ref)
        .bind(&record.gateway_payment_ref)
        .bind(&record.signature)
        .bind(record.amount.value())
        .bind(record.outcome.as_str())
        .bind(record.payment_mode.as_str())
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "payment"))?;

        Ok(record)
    }

    async fn get(&self, id: &PaymentId) -> Result<Option<PaymentRecord>, RepositoryError> {
        sqlx::query_as::<_, PaymentRow>(
            r"
            SELECT id, user_id, gateway_order_ref, gateway_payment_ref, signature,
                   amount, outcome, payment_mode, created_at
            FROM storefront.payment
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(PaymentRecord::try_from)
        .transpose()
    }
}
