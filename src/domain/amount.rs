//! Lossless amount type backed by rust_decimal.
//!
//! Ledger amounts (USD values, prices, thresholds) travel as canonical decimal
//! strings and are compared exactly, never through floating point.

use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lossless amount for prices, collateral and profit/loss values.
///
/// Serializes to a JSON string so large integer amounts survive the round trip.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(#[serde(with = "rust_decimal::serde::str")] RustDecimal);

impl Amount {
    /// Parse an amount from its canonical string form.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s.trim()).map(Amount)
    }

    /// Whole-unit amount, as the ledger reports raw integer values.
    pub fn from_units(units: u64) -> Self {
        Amount(RustDecimal::from(units))
    }

    /// Format without exponent notation or trailing zeros.
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    /// Zero amount, the default for an unreported profit or loss.
    pub fn zero() -> Self {
        Amount(RustDecimal::ZERO)
    }

    /// True when `self` meets or exceeds `threshold`.
    pub fn meets(&self, threshold: &Amount) -> bool {
        self.0 >= threshold.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_parse_trims_and_normalizes() {
        let amount = Amount::from_str_canonical(" 1500.2500 ").unwrap();
        assert_eq!(amount.to_canonical_string(), "1500.25");
    }

    #[test]
    fn test_amount_rejects_garbage() {
        assert!(Amount::from_str_canonical("12abc").is_err());
        assert!(Amount::from_str_canonical("").is_err());
    }

    #[test]
    fn test_meets_is_inclusive() {
        let threshold = Amount::from_units(100);
        assert!(Amount::from_units(100).meets(&threshold));
        assert!(Amount::from_units(101).meets(&threshold));
        assert!(!Amount::from_units(99).meets(&threshold));
    }

    #[test]
    fn test_meets_compares_across_scales() {
        let threshold = Amount::from_str_canonical("100.000").unwrap();
        let value = Amount::from_str_canonical("100").unwrap();
        assert!(value.meets(&threshold));
    }

    #[test]
    fn test_amount_json_is_string() {
        let amount = Amount::from_str_canonical("18446744073709551615").unwrap();
        let json = serde_json::to_value(amount).unwrap();
        assert!(json.is_string());
        let back: Amount = serde_json::from_value(json).unwrap();
        assert_eq!(back, amount);
    }

    #[test]
    fn test_zero_equals_any_scale_of_zero() {
        assert_eq!(Amount::zero(), Amount::from_str_canonical("0.000").unwrap());
        assert_eq!(Amount::zero(), Amount::default());
    }
}
