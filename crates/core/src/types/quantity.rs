//! Fixed-point quantities for stock and money.
//!
//! Stock is tracked with three fractional digits and money with two. Both are
//! backed by [`Decimal`] so that thousands of small journal entries never
//! drift the way binary floating point would.
//!
//! Inputs carrying more precision than the type allows are rejected, never
//! rounded.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors produced when constructing a [`StockQuantity`] or [`Money`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuantityError {
    /// The value is below zero.
    #[error("{value} is negative")]
    Negative {
        /// The rejected value.
        value: Decimal,
    },
    /// The value is zero where a positive amount is required.
    #[error("{value} must be greater than zero")]
    NotPositive {
        /// The rejected value.
        value: Decimal,
    },
    /// The value has more fractional digits than allowed.
    #[error("{value} has more than {max_scale} fractional digits")]
    TooPrecise {
        /// The rejected value.
        value: Decimal,
        /// Maximum number of fractional digits.
        max_scale: u32,
    },
    /// The value does not fit the stored column.
    #[error("{value} exceeds the maximum of {max}")]
    TooLarge {
        /// The rejected value.
        value: Decimal,
        /// Largest accepted value.
        max: Decimal,
    },
}

fn check_non_negative(value: Decimal, max_scale: u32) -> Result<Decimal, QuantityError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(QuantityError::Negative { value });
    }
    if value.normalize().scale() > max_scale {
        return Err(QuantityError::TooPrecise { value, max_scale });
    }
    let mut scaled = value;
    scaled.rescale(max_scale);
    Ok(scaled)
}

/// A non-negative stock amount with exactly three fractional digits.
///
/// ```
/// use eco_prom_core::StockQuantity;
/// use rust_decimal::Decimal;
///
/// let on_hand = StockQuantity::try_new(Decimal::new(10, 0)).unwrap();
/// let taken = StockQuantity::positive(Decimal::new(6, 0)).unwrap();
/// assert_eq!(on_hand.checked_sub(taken).unwrap().to_string(), "4.000");
/// assert!(taken.checked_sub(on_hand).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct StockQuantity(Decimal);

impl StockQuantity {
    /// Number of fractional digits kept for stock.
    pub const SCALE: u32 = 3;

    /// The empty quantity.
    pub const ZERO: Self = Self(Decimal::from_parts(0, 0, 0, false, Self::SCALE));

    /// Largest storable quantity, `99999999999.999` (`NUMERIC(14, 3)`).
    pub const MAX: Self = Self(Decimal::from_parts(276_447_231, 23_283, 0, false, Self::SCALE));

    /// Create a quantity, rejecting negative, over-precise or oversized values.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::Negative`], [`QuantityError::TooPrecise`] or
    /// [`QuantityError::TooLarge`].
    pub fn try_new(value: Decimal) -> Result<Self, QuantityError> {
        let value = check_non_negative(value, Self::SCALE)?;
        if value > Self::MAX.0 {
            return Err(QuantityError::TooLarge {
                value,
                max: Self::MAX.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a strictly positive quantity, as required for journal deltas.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::NotPositive`] for zero, otherwise the same
    /// errors as [`StockQuantity::try_new`].
    pub fn positive(value: Decimal) -> Result<Self, QuantityError> {
        let quantity = Self::try_new(value)?;
        if quantity.0.is_zero() {
            return Err(QuantityError::NotPositive { value });
        }
        Ok(quantity)
    }

    /// The underlying decimal value.
    #[must_use]
    pub const fn value(&self) -> Decimal {
        self.0
    }

    /// Add a receipt to this quantity, or `None` past [`StockQuantity::MAX`].
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0
            .checked_add(other.0)
            .filter(|sum| *sum <= Self::MAX.0)
            .map(Self)
    }

    /// Withdraw from this quantity, or `None` if the result would be negative.
    #[must_use]
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        if other.0 > self.0 {
            return None;
        }
        self.0.checked_sub(other.0).map(Self)
    }
}

impl TryFrom<Decimal> for StockQuantity {
    type Error = QuantityError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<StockQuantity> for Decimal {
    fn from(quantity: StockQuantity) -> Self {
        quantity.0
    }
}

impl core::fmt::Display for StockQuantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A non-negative money amount with exactly two fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Number of fractional digits kept for money.
    pub const SCALE: u32 = 2;

    /// Zero.
    pub const ZERO: Self = Self(Decimal::from_parts(0, 0, 0, false, Self::SCALE));

    /// Create a money amount, rejecting negative or over-precise values.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::Negative`] or [`QuantityError::TooPrecise`].
    pub fn try_new(amount: Decimal) -> Result<Self, QuantityError> {
        check_non_negative(amount, Self::SCALE).map(Self)
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Amount still owed after a prepayment, never below zero.
    #[must_use]
    pub fn remaining_after(self, prepayment: Self) -> Self {
        if prepayment.0 >= self.0 {
            return Self::ZERO;
        }
        Self(self.0 - prepayment.0)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = QuantityError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::try_new(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
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
    fn test_stock_quantity_rescales_to_three_digits() {
        let q = StockQuantity::try_new(dec("4")).unwrap();
        assert_eq!(q.to_string(), "4.000");
        let q = StockQuantity::try_new(dec("1.50000")).unwrap();
        assert_eq!(q.to_string(), "1.500");
    }

    #[test]
    fn test_stock_quantity_rejects_negative() {
        let err = StockQuantity::try_new(dec("-0.001")).unwrap_err();
        assert!(matches!(err, QuantityError::Negative { .. }));
    }

    #[test]
    fn test_stock_quantity_rejects_extra_precision() {
        let err = StockQuantity::try_new(dec("0.0004")).unwrap_err();
        assert_eq!(
            err,
            QuantityError::TooPrecise {
                value: dec("0.0004"),
                max_scale: 3
            }
        );
    }

    #[test]
    fn test_stock_quantity_fits_its_column() {
        assert_eq!(StockQuantity::MAX.to_string(), "99999999999.999");
        assert!(StockQuantity::positive(dec("99999999999.999")).is_ok());
        let err = StockQuantity::positive(dec("100000000000")).unwrap_err();
        assert!(matches!(err, QuantityError::TooLarge { .. }));
        assert!(StockQuantity::positive(dec("1000000000000")).is_err());
    }

    #[test]
    fn test_checked_add_stops_at_max() {
        let near_full = StockQuantity::try_new(dec("99999999999")).unwrap();
        let one = StockQuantity::positive(dec("1")).unwrap();
        assert!(near_full.checked_add(one).is_none());
        let fill = StockQuantity::positive(dec("0.999")).unwrap();
        assert_eq!(near_full.checked_add(fill).unwrap(), StockQuantity::MAX);
    }

    #[test]
    fn test_positive_rejects_zero() {
        assert!(matches!(
            StockQuantity::positive(Decimal::ZERO),
            Err(QuantityError::NotPositive { .. })
        ));
        assert!(StockQuantity::positive(dec("0.001")).is_ok());
    }

    #[test]
    fn test_many_small_receipts_do_not_drift() {
        let step = StockQuantity::positive(dec("0.001")).unwrap();
        let mut total = StockQuantity::ZERO;
        for _ in 0..10_000 {
            total = total.checked_add(step).unwrap();
        }
        assert_eq!(total.value(), dec("10.000"));
    }

    #[test]
    fn test_checked_sub_refuses_overdraw() {
        let on_hand = StockQuantity::try_new(dec("4.000")).unwrap();
        let requested = StockQuantity::positive(dec("5.000")).unwrap();
        assert!(on_hand.checked_sub(requested).is_none());
        assert_eq!(
            on_hand.checked_sub(on_hand).unwrap(),
            StockQuantity::ZERO
        );
    }

    #[test]
    fn test_money_remaining_never_negative() {
        let total = Money::try_new(dec("100.00")).unwrap();
        let prepaid = Money::try_new(dec("150.00")).unwrap();
        assert_eq!(total.remaining_after(prepaid), Money::ZERO);
        let prepaid = Money::try_new(dec("40.5")).unwrap();
        assert_eq!(total.remaining_after(prepaid).amount(), dec("59.50"));
    }

    #[test]
    fn test_money_rejects_fractional_cents() {
        assert!(Money::try_new(dec("1.005")).is_err());
    }

    #[test]
    fn test_serde_rejects_negative_stock() {
        let result: Result<StockQuantity, _> = serde_json::from_str("\"-1\"");
        assert!(result.is_err());
        let q: StockQuantity = serde_json::from_str("\"2.5\"").unwrap();
        assert_eq!(q.value(), dec("2.500"));
    }
}
