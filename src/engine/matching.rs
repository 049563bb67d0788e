//! FIFO matching of a sell against the lot ledger.

use super::ledger::LotLedger;
use crate::domain::{Match, Side, Transaction};
use crate::error::EngineError;

/// Match `sell` against the ledger, oldest lot first.
///
/// Only lots bought at or before the sell are eligible. If the eligible open
/// quantity cannot cover the sell, `OverSell` is returned before any lot is
/// touched, so no partial match exists for the excess.
///
/// Deterministic: the same ledger state and sell always yield the same matches.
pub fn match_sell(sell: &Transaction, ledger: &mut LotLedger) -> Result<Vec<Match>, EngineError> {
    if sell.side != Side::Sell {
        return Err(sell.invalid("only sell transactions are matched"));
    }
    if &sell.instrument != ledger.instrument() {
        return Err(sell.invalid(format!(
            "instrument {} does not belong to the {} ledger",
            sell.instrument,
            ledger.instrument()
        )));
    }
    sell.check_amounts()?;

    let available = ledger.open_quantity_at(sell.executed_at);
    if sell.quantity > available {
        tracing::warn!(
            instrument = %sell.instrument,
            txn = %sell.txn_key,
            requested = %sell.quantity,
            available = %available,
            "sell exceeds open position"
        );
        return Err(EngineError::OverSell {
            instrument: sell.instrument.clone(),
            txn: sell.txn_key.clone(),
            requested: sell.quantity,
            available,
        });
    }

    let mut matches = Vec::new();
    let mut unmatched = sell.quantity;

    while unmatched.is_positive() {
        let Some(lot) = ledger.peek_oldest() else {
            break;
        };
        let take = unmatched.min(lot.remaining_quantity);
        let record = Match {
            instrument: lot.instrument.clone(),
            lot_id: lot.lot_id,
            buy_txn_key: lot.buy_txn_key.clone(),
            sell_txn_key: sell.txn_key.clone(),
            quantity: take,
            unit_cost: lot.unit_cost,
            unit_price: sell.price,
            cost: take * lot.unit_cost,
            revenue: take * sell.price,
            bought_at: lot.bought_at,
            sold_at: sell.executed_at,
        };

        ledger.consume(record.lot_id, take)?;
        unmatched -= take;

        tracing::debug!(
            instrument = %record.instrument,
            lot_id = record.lot_id,
            sell = %record.sell_txn_key,
            quantity = %take,
            profit = %record.realized_profit(),
            "matched"
        );
        matches.push(record);
    }

    Ok(matches)
}
