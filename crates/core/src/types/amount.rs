//! Money amounts in minor currency units.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why an amount string was rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount must be a whole number of minor units")]
    NotANumber,
    #[error("amount must be greater than zero")]
    NotPositive,
}

/// An amount in the currency's minor unit (cents for USD/CAD).
///
/// The storefront posts amounts as strings (`"2000"`), so the usual entry
/// point is [`Amount::parse_positive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    #[must_use]
    pub const fn from_minor_units(units: i64) -> Self {
        Self(units)
    }

    /// Parse a strictly positive integer amount.
    ///
    /// # Errors
    ///
    /// [`AmountError::NotANumber`] for anything that is not a base-10
    /// integer, [`AmountError::NotPositive`] for zero or negative values.
    ///
    /// ```
    /// use widget_store_core::{Amount, AmountError};
    ///
    /// assert_eq!(Amount::parse_positive("500").unwrap().minor_units(), 500);
    /// assert_eq!(Amount::parse_positive("0"), Err(AmountError::NotPositive));
    /// assert_eq!(Amount::parse_positive("5.00"), Err(AmountError::NotANumber));
    /// ```
    pub fn parse_positive(s: &str) -> Result<Self, AmountError> {
        let units: i64 = s.trim().parse().map_err(|_| AmountError::NotANumber)?;
        if units <= 0 {
            return Err(AmountError::NotPositive);
        }
        Ok(Self(units))
    }

    #[must_use]
    pub const fn minor_units(self) -> i64 {
        self.0
    }
}

/// Renders as major units with two decimals (`2000` → `20.00`).
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_positive_rejects_garbage() {
        assert_eq!(Amount::parse_positive(""), Err(AmountError::NotANumber));
        assert_eq!(Amount::parse_positive("abc"), Err(AmountError::NotANumber));
        assert_eq!(Amount::parse_positive("-5"), Err(AmountError::NotPositive));
    }

    #[test]
    fn test_display_major_units() {
        assert_eq!(Amount::from_minor_units(2000).to_string(), "20.00");
        assert_eq!(Amount::from_minor_units(5).to_string(), "0.05");
        assert_eq!(Amount::from_minor_units(-150).to_string(), "-1.50");
    }
}
