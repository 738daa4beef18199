//! Non-negative decimal price in the store's (single, implicit) currency.

use core::fmt;
use core::ops::Add;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Error returned when constructing a negative [`Price`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("price cannot be negative: {0}")]
pub struct PriceError(pub Decimal);

/// A unit price or total.
///
/// The storefront API is currency-agnostic, so a price is just a decimal
/// amount. Decimal arithmetic keeps totals like `9.99 * 2` exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// A zero price.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError`] if `amount` is negative.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError(amount));
        }
        Ok(Self(amount))
    }

    /// Get the decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl core::iter::Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = <Decimal as Deserialize>::deserialize(deserializer)?;
        Self::new(amount).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use core::str::FromStr;

    use super::*;

    fn price(s: &str) -> Price {
        Price::new(Decimal::from_str(s).unwrap()).unwrap()
    }

    #[test]
    fn test_times_is_exact() {
        assert_eq!(price("9.99").times(2), price("19.98"));
    }

    #[test]
    fn test_negative_rejected() {
        assert!(Price::new(Decimal::from_str("-0.01").unwrap()).is_err());
        assert!(Price::new(Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_sum() {
        let total: Price = [price("1.50"), price("2.25")].into_iter().sum();
        assert_eq!(total, price("3.75"));
    }

    #[test]
    fn test_display_two_places() {
        assert_eq!(price("5").to_string(), "5.00");
        assert_eq!(price("19.98").to_string(), "19.98");
    }

    #[test]
    fn test_deserialize_checks_sign() {
        let parsed: Price = serde_json::from_str(r#""4.50""#).unwrap();
        assert_eq!(parsed, price("4.50"));
        assert!(serde_json::from_str::<Price>(r#""-1""#).is_err());
    }
}
