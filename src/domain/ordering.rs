//! Feed ordering checks.
//!
//! The engine never re-sorts its input: a per-instrument feed must already be
//! ascending by timestamp, and same-timestamp transactions are processed in
//! the order they were logged. This module only verifies that contract.

use crate::domain::Transaction;
use crate::error::EngineError;
use chrono::NaiveDateTime;

/// Tracks the last admitted timestamp of one instrument's feed.
#[derive(Debug, Clone, Default)]
pub struct OrderingGuard {
    last_at: Option<NaiveDateTime>,
}

impl OrderingGuard {
    pub fn new() -> Self {
        Self { last_at: None }
    }

    /// Admit `txn` if it does not precede the last admitted transaction.
    ///
    /// Equal timestamps are admitted; the caller's logged order is kept.
    /// A rejected transaction leaves the guard unchanged.
    pub fn admit(&mut self, txn: &Transaction) -> Result<(), EngineError> {
        if let Some(last) = self.last_at {
            if txn.executed_at < last {
                return Err(txn.invalid(format!(
                    "executed at {} which precedes the previous transaction at {}",
                    txn.executed_at, last
                )));
            }
        }
        self.last_at = Some(txn.executed_at);
        Ok(())
    }

    pub fn last_at(&self) -> Option<NaiveDateTime> {
        self.last_at
    }
}

/// True if the slice is ascending (non-strictly) by execution time.
pub fn is_chronological(transactions: &[Transaction]) -> bool {
    transactions
        .windows(2)
        .all(|w| w[0].executed_at <= w[1].executed_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decimal, Instrument, Side};
    use chrono::NaiveDate;

    fn txn(id: i64, day: u32) -> Transaction {
        Transaction::new(
            Some(id),
            Instrument::new("AAPL"),
            Side::Buy,
            Decimal::from(10),
            Decimal::from(150),
            NaiveDate::from_ymd_opt(2024, 3, day)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
        )
    }

    #[test]
    fn test_guard_admits_ascending_and_equal() {
        let mut guard = OrderingGuard::new();
        assert!(guard.admit(&txn(1, 1)).is_ok());
        assert!(guard.admit(&txn(2, 1)).is_ok());
        assert!(guard.admit(&txn(3, 4)).is_ok());
    }

    #[test]
    fn test_guard_rejects_backwards_without_moving() {
        let mut guard = OrderingGuard::new();
        guard.admit(&txn(1, 5)).unwrap();

        let err = guard.admit(&txn(2, 3)).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransaction { ref txn, .. } if txn == "txn:2"
        ));
        assert_eq!(guard.last_at(), Some(txn(1, 5).executed_at));
    }

    #[test]
    fn test_is_chronological() {
        assert!(is_chronological(&[txn(1, 1), txn(2, 1), txn(3, 2)]));
        assert!(!is_chronological(&[txn(1, 2), txn(2, 1)]));
        assert!(is_chronological(&[]));
    }
}
