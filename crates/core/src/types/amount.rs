//! Non-negative monetary amounts using decimal arithmetic.
//!
//! Amounts are currency-agnostic: the order snapshot stores the number the
//! customer agreed to, and the gateway currency is a deployment setting.
//! Every amount fits the storage columns: at most two decimal places and
//! ten integer digits.

use core::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing or combining amounts.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount must not be negative (got {0})")]
    Negative(Decimal),
    #[error("amount must have at most {max} decimal places (got {0})", max = MAX_SCALE)]
    TooPrecise(Decimal),
    #[error("amount must be below {limit} (got {0})", limit = Amount::LIMIT)]
    TooLarge(Decimal),
    #[error("amount arithmetic overflowed")]
    Overflow,
}

/// Decimal places an amount may carry.
pub const MAX_SCALE: u32 = 2;

/// A non-negative monetary amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Exclusive upper bound, ten integer digits.
    pub const LIMIT: Decimal = Decimal::from_parts(1_410_065_408, 2, 0, false, 0);

    /// Create an amount, rejecting negative, over-precise and oversized values.
    ///
    /// # Errors
    ///
    /// Returns `AmountError::Negative` if `value` is below zero,
    /// `AmountError::TooPrecise` if it has more than [`MAX_SCALE`] decimal
    /// places and `AmountError::TooLarge` if it reaches [`Amount::LIMIT`].
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(AmountError::Negative(value));
        }
        let value = value.normalize();
        if value.scale() > MAX_SCALE {
            return Err(AmountError::TooPrecise(value));
        }
        if value >= Self::LIMIT {
            return Err(AmountError::TooLarge(value));
        }
        Ok(Self(value))
    }

    fn bounded(value: Decimal) -> Result<Self, AmountError> {
        Self::new(value).map_err(|_| AmountError::Overflow)
    }

    #[must_use]
    pub const fn value(self) -> Decimal {
        self.0
    }

    /// Multiply by a quantity.
    ///
    /// # Errors
    ///
    /// Returns `AmountError::Overflow` if the product reaches [`Amount::LIMIT`].
    pub fn checked_mul(self, quantity: u32) -> Result<Self, AmountError> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .ok_or(AmountError::Overflow)
            .and_then(Self::bounded)
    }

    /// Add two amounts.
    ///
    /// # Errors
    ///
    /// Returns `AmountError::Overflow` if the sum reaches [`Amount::LIMIT`].
    pub fn checked_add(self, other: Self) -> Result<Self, AmountError> {
        self.0
            .checked_add(other.0)
            .ok_or(AmountError::Overflow)
            .and_then(Self::bounded)
    }

    /// Convert to the currency's minor unit (paise, cents), rounding half to even.
    ///
    /// # Errors
    ///
    /// Returns `AmountError::Overflow` if the result does not fit in an `i64`.
    pub fn to_minor_units(self) -> Result<i64, AmountError> {
        self.0
            .checked_mul(Decimal::ONE_HUNDRED)
            .map(|v| v.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven))
            .and_then(|v| v.to_i64())
            .ok_or(AmountError::Overflow)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_rejects_negative() {
        assert!(matches!(Amount::new(dec("-1")), Err(AmountError::Negative(_))));
        assert!(Amount::new(Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_equal_regardless_of_scale() {
        assert_eq!(Amount::new(dec("500")).unwrap(), Amount::new(dec("500.00")).unwrap());
    }

    #[test]
    fn test_line_arithmetic() {
        let price = Amount::new(dec("249.50")).unwrap();
        let total = price.checked_mul(2).unwrap().checked_add(Amount::new(dec("1")).unwrap()).unwrap();
        assert_eq!(total.value(), dec("500"));
    }

    #[test]
    fn test_minor_units_round_half_even() {
        assert_eq!(Amount::new(dec("500")).unwrap().to_minor_units().unwrap(), 50_000);
        assert_eq!(Amount::new(dec("12.34")).unwrap().to_minor_units().unwrap(), 1_234);
        assert_eq!(Amount::new(dec("0.1")).unwrap().to_minor_units().unwrap(), 10);
    }

    #[test]
    fn test_rejects_more_than_two_places() {
        assert!(matches!(Amount::new(dec("0.125")), Err(AmountError::TooPrecise(_))));
        assert!(serde_json::from_str::<Amount>("\"0.125\"").is_err());
        // Trailing zeros do not count.
        assert_eq!(Amount::new(dec("0.1200")).unwrap().value(), dec("0.12"));
    }

    #[test]
    fn test_rejects_eleven_integer_digits() {
        assert_eq!(Amount::LIMIT, dec("10000000000"));
        assert!(Amount::new(dec("9999999999.99")).is_ok());
        assert!(matches!(Amount::new(dec("10000000000")), Err(AmountError::TooLarge(_))));
        assert!(serde_json::from_str::<Amount>("100000000000").is_err());
    }

    #[test]
    fn test_arithmetic_stays_below_limit() {
        let price = Amount::new(dec("6000000000")).unwrap();
        assert_eq!(price.checked_mul(2), Err(AmountError::Overflow));
        assert_eq!(price.checked_add(price), Err(AmountError::Overflow));
        assert!(price.checked_mul(1).is_ok());
    }

    #[test]
    fn test_deserialize_accepts_number_and_string() {
        let from_number: Amount = serde_json::from_str("500").unwrap();
        let from_string: Amount = serde_json::from_str("\"500.00\"").unwrap();
        assert_eq!(from_number, from_string);
        assert!(serde_json::from_str::<Amount>("-3").is_err());
    }

    #[test]
    fn test_display_two_places() {
        assert_eq!(Amount::new(dec("12.5")).unwrap().to_string(), "12.50");
    }
}
