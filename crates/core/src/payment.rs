//! Payment ledger records.
//!
//! A [`PaymentRecord`] is written once and never changed. Corrections are new
//! records. Payments are correlated with orders through the gateway reference
//! strings, not a foreign key, so either can exist without the other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Amount, PaymentId, PaymentMode, PaymentOutcome, UserId};

/// A payment attempt about to be appended to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentAttempt {
    pub user_id: UserId,
    pub gateway_order_ref: String,
    pub gateway_payment_ref: String,
    pub signature: String,
    pub amount: Amount,
    pub outcome: PaymentOutcome,
    pub payment_mode: PaymentMode,
}

/// An immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub user_id: UserId,
    pub gateway_order_ref: String,
    pub gateway_payment_ref: String,
    pub signature: String,
    pub amount: Amount,
    pub outcome: PaymentOutcome,
    pub payment_mode: PaymentMode,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Stamp an attempt with a fresh id and the current time.
    #[must_use]
    pub fn from_attempt(attempt: PaymentAttempt) -> Self {
        Self {
            id: PaymentId::generate(),
            user_id: attempt.user_id,
            gateway_order_ref: attempt.gateway_order_ref,
            gateway_payment_ref: attempt.gateway_payment_ref,
            signature: attempt.signature,
            amount: attempt.amount,
            outcome: attempt.outcome,
            payment_mode: attempt.payment_mode,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == PaymentOutcome::Success
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_from_attempt_copies_fields() {
        let attempt = PaymentAttempt {
            user_id: UserId::generate(),
            gateway_order_ref: "order_1".to_owned(),
            gateway_payment_ref: "pay_1".to_owned(),
            signature: "ab".repeat(32),
            amount: Amount::new(Decimal::from(500)).unwrap(),
            outcome: PaymentOutcome::Success,
            payment_mode: PaymentMode::Gateway,
        };

        let record = PaymentRecord::from_attempt(attempt.clone());
        assert_eq!(record.user_id, attempt.user_id);
        assert_eq!(record.gateway_payment_ref, "pay_1");
        assert_eq!(record.amount, attempt.amount);
        assert!(record.is_success());
    }
}
