//! Lossless decimal numeric type backed by rust_decimal.
//!
//! Quantities, prices, costs and ratios all flow through this type so that
//! lot remainders reach exactly zero and never need an epsilon comparison.

use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lossless decimal numeric type for journal arithmetic.
///
/// Serializes to a JSON number (not a string).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Decimal {
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s.trim()).map(Decimal)
    }

    /// Format without trailing zeros or exponent notation.
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    pub fn one() -> Self {
        Decimal(RustDecimal::ONE)
    }

    pub fn hundred() -> Self {
        Decimal(RustDecimal::ONE_HUNDRED)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    pub fn abs(&self) -> Self {
        Decimal(self.0.abs())
    }

    pub fn min(self, other: Decimal) -> Decimal {
        if other < self {
            other
        } else {
            self
        }
    }

    /// Division that yields `None` instead of panicking on a zero divisor.
    pub fn checked_div(self, rhs: Decimal) -> Option<Decimal> {
        if rhs.is_zero() {
            return None;
        }
        self.0.checked_div(rhs.0).map(Decimal)
    }

    /// `None` when the product does not fit in 96 bits.
    pub fn checked_mul(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_mul(rhs.0).map(Decimal)
    }

    pub fn checked_add(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_add(rhs.0).map(Decimal)
    }

    /// Banker's rounding to `dp` decimal places.
    pub fn round_dp(&self, dp: u32) -> Decimal {
        Decimal(self.0.round_dp(dp))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal(RustDecimal::from(value))
    }
}

impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Decimal {
    fn add_assign(&mut self, rhs: Decimal) {
        self.0 += rhs.0;
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::SubAssign for Decimal {
    fn sub_assign(&mut self, rhs: Decimal) {
        self.0 -= rhs.0;
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

/// Panics on a zero divisor; use [`Decimal::checked_div`] when the divisor
/// may legitimately be zero.
impl std::ops::Div for Decimal {
    type Output = Decimal;

    fn div(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 / rhs.0)
    }
}

impl std::ops::Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

impl std::iter::Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Decimal {
        iter.fold(Decimal::zero(), |acc, d| acc + d)
    }
}

impl<'a> std::iter::Sum<&'a Decimal> for Decimal {
    fn sum<I: Iterator<Item = &'a Decimal>>(iter: I) -> Decimal {
        iter.fold(Decimal::zero(), |acc, d| acc + *d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_canonical_string_drops_trailing_zeros() {
        assert_eq!(d("10.00").to_canonical_string(), "10");
        assert_eq!(d("0.100").to_canonical_string(), "0.1");
        assert_eq!(d(" 12.5 ").to_canonical_string(), "12.5");
    }

    #[test]
    fn test_fractional_quantities_reach_exact_zero() {
        let mut remaining = d("1");
        for _ in 0..10 {
            remaining -= d("0.1");
        }
        assert!(remaining.is_zero());
    }

    #[test]
    fn test_checked_div_zero_divisor() {
        assert_eq!(d("5").checked_div(Decimal::zero()), None);
        assert_eq!(d("500").checked_div(d("5000")), Some(d("0.1")));
    }

    #[test]
    fn test_sign_helpers() {
        assert!(d("0.01").is_positive());
        assert!(d("-0.01").is_negative());
        assert!(!Decimal::zero().is_positive());
        assert!(!Decimal::zero().is_negative());
    }

    #[test]
    fn test_sum_and_min() {
        let values = [d("1.5"), d("2.5"), d("-1")];
        let total: Decimal = values.iter().sum();
        assert_eq!(total, d("3"));
        assert_eq!(d("3").min(d("2")), d("2"));
    }

    #[test]
    fn test_json_serialization_is_number() {
        let json = serde_json::to_value(d("123.456")).unwrap();
        assert!(json.is_number());
        assert_eq!(json.to_string(), "123.456");
    }

    #[test]
    fn test_round_dp() {
        assert_eq!(d("2.93333").round_dp(3), d("2.933"));
    }
}
