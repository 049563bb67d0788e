//! Mark-to-market valuation of open lots.

use crate::domain::{Decimal, Instrument, Lot, MonthKey};
use crate::error::EngineError;
use serde::Serialize;
use std::collections::BTreeMap;

/// Caller-supplied current prices keyed by instrument.
pub type PriceMap = BTreeMap<Instrument, Decimal>;

/// Current state of one instrument's open position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSnapshot {
    pub open_quantity: Decimal,
    pub open_cost: Decimal,
    /// Weighted-average cost of the open quantity; `None` when flat.
    pub average_cost: Option<Decimal>,
    pub current_price: Decimal,
    pub market_value: Decimal,
    pub unrealized_profit: Decimal,
    /// `None` when open cost is zero (no open position).
    pub unrealized_ratio: Option<Decimal>,
}

/// Value the open lots at `current_price`. Pure: no ledger mutation.
///
/// # Errors
/// `InvalidPrice` if the price is not strictly positive.
pub fn value_position(
    open_lots: &[Lot],
    current_price: Decimal,
) -> Result<PositionSnapshot, EngineError> {
    if !current_price.is_positive() {
        return Err(EngineError::InvalidPrice {
            price: current_price,
        });
    }

    let open_quantity: Decimal = open_lots.iter().map(|lot| lot.remaining_quantity).sum();
    let open_cost: Decimal = open_lots.iter().map(Lot::open_cost).sum();
    let market_value = open_quantity * current_price;
    let unrealized_profit = market_value - open_cost;

    Ok(PositionSnapshot {
        open_quantity,
        open_cost,
        average_cost: open_cost.checked_div(open_quantity),
        current_price,
        market_value,
        unrealized_profit,
        unrealized_ratio: unrealized_profit.checked_div(open_cost),
    })
}

/// Unrealized profit of open lots bucketed by each lot's buy month.
///
/// # Errors
/// `InvalidPrice` if the price is not strictly positive.
pub fn unrealized_by_buy_month(
    open_lots: &[Lot],
    current_price: Decimal,
) -> Result<BTreeMap<MonthKey, Decimal>, EngineError> {
    if !current_price.is_positive() {
        return Err(EngineError::InvalidPrice {
            price: current_price,
        });
    }

    let mut by_month: BTreeMap<MonthKey, Decimal> = BTreeMap::new();
    for lot in open_lots.iter().filter(|lot| lot.is_open()) {
        let profit = lot.remaining_quantity * current_price - lot.open_cost();
        *by_month.entry(lot.buy_month()).or_default() += profit;
    }
    Ok(by_month)
}
