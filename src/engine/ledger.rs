//! FIFO lot ledger for one instrument.

use crate::domain::{Decimal, Instrument, Lot, LotId, Side, Transaction};
use crate::error::EngineError;
use chrono::NaiveDateTime;

/// Per-instrument FIFO queue of open buy lots.
///
/// Lots are held in an append-only vector with a head index marking the
/// oldest lot that still has quantity. The only mutations are
/// [`enqueue`](LotLedger::enqueue) and the crate-internal `consume`, so the
/// FIFO discipline cannot be bypassed from outside the engine.
#[derive(Debug, Clone)]
pub struct LotLedger {
    instrument: Instrument,
    lots: Vec<Lot>,
    head: usize,
    next_lot_id: LotId,
}

impl LotLedger {
    pub fn new(instrument: Instrument) -> Self {
        Self {
            instrument,
            lots: Vec::new(),
            head: 0,
            next_lot_id: 1,
        }
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    /// Append a new lot for a buy transaction.
    ///
    /// # Errors
    /// `InvalidTransaction` for a non-buy, a foreign instrument, non-positive
    /// quantity or price, or a buy older than the newest lot. The ledger is
    /// not mutated on error.
    pub fn enqueue(&mut self, buy: &Transaction) -> Result<LotId, EngineError> {
        if buy.side != Side::Buy {
            return Err(buy.invalid("only buy transactions open lots"));
        }
        if buy.instrument != self.instrument {
            return Err(buy.invalid(format!(
                "instrument {} does not belong to the {} ledger",
                buy.instrument, self.instrument
            )));
        }
        buy.check_amounts()?;
        if let Some(newest) = self.lots.last() {
            if buy.executed_at < newest.bought_at {
                return Err(buy.invalid(format!(
                    "bought at {} before the newest lot at {}",
                    buy.executed_at, newest.bought_at
                )));
            }
        }

        let lot_id = self.next_lot_id;
        self.next_lot_id += 1;
        self.lots.push(Lot {
            lot_id,
            instrument: buy.instrument.clone(),
            buy_txn_key: buy.txn_key.clone(),
            original_quantity: buy.quantity,
            remaining_quantity: buy.quantity,
            unit_cost: buy.price,
            bought_at: buy.executed_at,
        });
        tracing::debug!(
            instrument = %self.instrument,
            lot_id,
            quantity = %buy.quantity,
            unit_cost = %buy.price,
            "lot enqueued"
        );
        Ok(lot_id)
    }

    /// The earliest lot with remaining quantity, if any.
    pub fn peek_oldest(&self) -> Option<&Lot> {
        self.lots[self.head..].iter().find(|lot| lot.is_open())
    }

    /// Decrement a lot's remaining quantity.
    ///
    /// The lot leaves the open set when its remainder reaches exactly zero.
    ///
    /// # Errors
    /// `OverConsumption` if `quantity` exceeds the lot's remainder, is not
    /// positive, or the lot is unknown or already closed.
    pub(crate) fn consume(&mut self, lot_id: LotId, quantity: Decimal) -> Result<(), EngineError> {
        let lot = self.lots[self.head..]
            .iter_mut()
            .find(|lot| lot.lot_id == lot_id);
        let Some(lot) = lot else {
            return Err(EngineError::OverConsumption {
                lot: lot_id,
                requested: quantity,
                remaining: Decimal::zero(),
            });
        };
        if !quantity.is_positive() || quantity > lot.remaining_quantity {
            return Err(EngineError::OverConsumption {
                lot: lot_id,
                requested: quantity,
                remaining: lot.remaining_quantity,
            });
        }

        lot.remaining_quantity -= quantity;
        while self.head < self.lots.len() && !self.lots[self.head].is_open() {
            self.head += 1;
        }
        Ok(())
    }

    /// All open lots in FIFO order.
    pub fn snapshot(&self) -> Vec<Lot> {
        self.open_lots().cloned().collect()
    }

    pub fn open_lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots[self.head..].iter().filter(|lot| lot.is_open())
    }

    /// Σ remaining quantity over open lots.
    pub fn open_quantity(&self) -> Decimal {
        self.open_lots().map(|lot| lot.remaining_quantity).sum()
    }

    /// Σ remaining quantity over open lots bought at or before `at`.
    pub fn open_quantity_at(&self, at: NaiveDateTime) -> Decimal {
        self.open_lots()
            .take_while(|lot| lot.bought_at <= at)
            .map(|lot| lot.remaining_quantity)
            .sum()
    }

    pub fn is_flat(&self) -> bool {
        self.peek_oldest().is_none()
    }

    /// Total quantity ever enqueued (open + matched).
    pub fn enqueued_quantity(&self) -> Decimal {
        self.lots.iter().map(|lot| lot.original_quantity).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn txn(id: i64, side: Side, qty: &str, px: &str, day: u32) -> Transaction {
        Transaction::new(
            Some(id),
            Instrument::new("7203"),
            side,
            d(qty),
            d(px),
            NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        )
    }

    fn ledger() -> LotLedger {
        LotLedger::new(Instrument::new("7203"))
    }

    #[test]
    fn test_enqueue_assigns_sequential_ids() {
        let mut l = ledger();
        assert_eq!(l.enqueue(&txn(1, Side::Buy, "100", "10", 1)).unwrap(), 1);
        assert_eq!(l.enqueue(&txn(2, Side::Buy, "50", "11", 2)).unwrap(), 2);
        assert_eq!(l.open_quantity(), d("150"));
        assert_eq!(l.peek_oldest().unwrap().buy_txn_key, "txn:1");
    }

    #[test]
    fn test_enqueue_rejects_invalid_without_mutation() {
        let mut l = ledger();
        assert!(l.enqueue(&txn(1, Side::Buy, "0", "10", 1)).is_err());
        assert!(l.enqueue(&txn(2, Side::Buy, "10", "-1", 1)).is_err());
        assert!(l.enqueue(&txn(3, Side::Sell, "10", "10", 1)).is_err());
        assert!(l.is_flat());
        assert_eq!(l.enqueued_quantity(), Decimal::zero());
    }

    #[test]
    fn test_enqueue_rejects_foreign_instrument() {
        let mut l = ledger();
        let mut other = txn(1, Side::Buy, "10", "10", 1);
        other.instrument = Instrument::new("6758");
        assert!(matches!(
            l.enqueue(&other),
            Err(EngineError::InvalidTransaction { .. })
        ));
    }

    #[test]
    fn test_enqueue_enforces_buy_time_order() {
        let mut l = ledger();
        l.enqueue(&txn(1, Side::Buy, "10", "10", 5)).unwrap();
        assert!(l.enqueue(&txn(2, Side::Buy, "10", "10", 4)).is_err());
        assert!(l.enqueue(&txn(3, Side::Buy, "10", "10", 5)).is_ok());
    }

    #[test]
    fn test_consume_retires_exhausted_lot() {
        let mut l = ledger();
        l.enqueue(&txn(1, Side::Buy, "100", "10", 1)).unwrap();
        l.enqueue(&txn(2, Side::Buy, "50", "11", 2)).unwrap();

        l.consume(1, d("40")).unwrap();
        assert_eq!(l.peek_oldest().unwrap().remaining_quantity, d("60"));

        l.consume(1, d("60")).unwrap();
        let oldest = l.peek_oldest().unwrap();
        assert_eq!(oldest.lot_id, 2);
        assert_eq!(l.snapshot().len(), 1);
        assert_eq!(l.enqueued_quantity(), d("150"));
    }

    #[test]
    fn test_consume_over_remaining_fails() {
        let mut l = ledger();
        l.enqueue(&txn(1, Side::Buy, "100", "10", 1)).unwrap();

        let err = l.consume(1, d("100.5")).unwrap_err();
        assert_eq!(
            err,
            EngineError::OverConsumption {
                lot: 1,
                requested: d("100.5"),
                remaining: d("100"),
            }
        );
        assert_eq!(l.open_quantity(), d("100"));
    }

    #[test]
    fn test_consume_closed_or_unknown_lot_fails() {
        let mut l = ledger();
        l.enqueue(&txn(1, Side::Buy, "10", "10", 1)).unwrap();
        l.consume(1, d("10")).unwrap();
        assert!(l.consume(1, d("1")).is_err());
        assert!(l.consume(99, d("1")).is_err());
    }

    #[test]
    fn test_open_quantity_at_excludes_later_lots() {
        let mut l = ledger();
        l.enqueue(&txn(1, Side::Buy, "10", "10", 1)).unwrap();
        l.enqueue(&txn(2, Side::Buy, "20", "10", 10)).unwrap();
        let cutoff = NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(l.open_quantity_at(cutoff), d("10"));
    }
}
