//! Domain primitives: Instrument, Side, MonthKey, MonthRange.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Instrument identifier (ticker or exchange code, e.g. "7203", "AAPL").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Instrument(pub String);

impl Instrument {
    pub fn new(id: impl Into<String>) -> Self {
        Instrument(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trade side: Buy or Sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "b" => Ok(Side::Buy),
            "sell" | "s" => Ok(Side::Sell),
            other => Err(format!("unknown side '{}'", other)),
        }
    }
}

/// Calendar month used as the attribution bucket.
///
/// Ordered chronologically; renders as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Returns `None` unless `month` is in 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(MonthKey { year, month })
    }

    pub fn of_date(date: NaiveDate) -> Self {
        MonthKey {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn of(at: NaiveDateTime) -> Self {
        Self::of_date(at.date())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn next(&self) -> MonthKey {
        if self.month == 12 {
            MonthKey {
                year: self.year + 1,
                month: 1,
            }
        } else {
            MonthKey {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Signed number of months from `self` to `other` (`other - self`).
    pub fn months_until(&self, other: MonthKey) -> i64 {
        (other.year as i64 - self.year as i64) * 12 + (other.month as i64 - self.month as i64)
    }

    /// The month `n` months after this one.
    pub fn plus_months(&self, n: u32) -> MonthKey {
        let zero_based = self.year as i64 * 12 + (self.month as i64 - 1) + n as i64;
        MonthKey {
            year: zero_based.div_euclid(12) as i32,
            month: zero_based.rem_euclid(12) as u32 + 1,
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (y, m) = s
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got '{}'", s))?;
        let year = y
            .parse::<i32>()
            .map_err(|_| format!("invalid year in '{}'", s))?;
        let month = m
            .parse::<u32>()
            .map_err(|_| format!("invalid month in '{}'", s))?;
        MonthKey::new(year, month).ok_or_else(|| format!("month out of range in '{}'", s))
    }
}

impl Serialize for MonthKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Inclusive range of months. A range whose start is after its end is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRange {
    pub from: MonthKey,
    pub to: MonthKey,
}

impl MonthRange {
    pub fn new(from: MonthKey, to: MonthKey) -> Self {
        MonthRange { from, to }
    }

    /// Smallest range covering every given month; `None` if there are none.
    pub fn covering<I: IntoIterator<Item = MonthKey>>(months: I) -> Option<Self> {
        let mut iter = months.into_iter();
        let first = iter.next()?;
        let (from, to) = iter.fold((first, first), |(lo, hi), m| (lo.min(m), hi.max(m)));
        Some(MonthRange { from, to })
    }

    pub fn is_empty(&self) -> bool {
        self.from > self.to
    }

    pub fn contains(&self, month: MonthKey) -> bool {
        self.from <= month && month <= self.to
    }

    /// Every month in the range, oldest first.
    pub fn months(&self) -> impl Iterator<Item = MonthKey> {
        let to = self.to;
        let first = (!self.is_empty()).then_some(self.from);
        std::iter::successors(first, move |m| {
            let next = m.next();
            (next <= to).then_some(next)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk(y: i32, m: u32) -> MonthKey {
        MonthKey::new(y, m).unwrap()
    }

    #[test]
    fn test_side_parse_and_serialize() {
        assert_eq!("BUY".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!(" sell ".parse::<Side>().unwrap(), Side::Sell);
        assert!("hold".parse::<Side>().is_err());
        assert_eq!(serde_json::to_string(&Side::Sell).unwrap(), "\"sell\"");
    }

    #[test]
    fn test_month_key_rejects_invalid_month() {
        assert!(MonthKey::new(2024, 0).is_none());
        assert!(MonthKey::new(2024, 13).is_none());
    }

    #[test]
    fn test_month_key_display_and_parse() {
        let m = mk(2024, 3);
        assert_eq!(m.to_string(), "2024-03");
        assert_eq!("2024-03".parse::<MonthKey>().unwrap(), m);
        assert!("2024/03".parse::<MonthKey>().is_err());
        assert_eq!(serde_json::to_string(&m).unwrap(), "\"2024-03\"");
    }

    #[test]
    fn test_month_key_arithmetic_across_year_end() {
        assert_eq!(mk(2023, 12).next(), mk(2024, 1));
        assert_eq!(mk(2023, 11).plus_months(3), mk(2024, 2));
        assert_eq!(mk(2023, 11).months_until(mk(2024, 2)), 3);
        assert_eq!(mk(2024, 2).months_until(mk(2023, 11)), -3);
    }

    #[test]
    fn test_month_range_iteration() {
        let range = MonthRange::new(mk(2023, 11), mk(2024, 2));
        let months: Vec<_> = range.months().collect();
        assert_eq!(
            months,
            vec![mk(2023, 11), mk(2023, 12), mk(2024, 1), mk(2024, 2)]
        );
        assert!(range.contains(mk(2024, 1)));
        assert!(!range.contains(mk(2024, 3)));
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let range = MonthRange::new(mk(2024, 5), mk(2024, 1));
        assert!(range.is_empty());
        assert_eq!(range.months().count(), 0);
    }

    #[test]
    fn test_covering_range() {
        let range = MonthRange::covering([mk(2024, 4), mk(2023, 9), mk(2024, 1)]).unwrap();
        assert_eq!(range, MonthRange::new(mk(2023, 9), mk(2024, 4)));
        assert!(MonthRange::covering(std::iter::empty()).is_none());
    }
}
