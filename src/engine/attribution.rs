//! Monthly profit attribution by buy month.
//!
//! Realized profit is always grouped under the calendar month of the buy
//! that opened the lot, never the month of the sell. A January buy sold in
//! March and June contributes both matches to January.

use crate::domain::{Decimal, Instrument, Match, MonthKey, MonthRange, Side, Transaction};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Aggregate for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyAttribution {
    pub month: MonthKey,
    /// Full cost of every buy executed this month, matched or not.
    pub buy_cost: Decimal,
    /// Realized profit of matches whose lot was bought this month.
    pub realized_profit: Decimal,
    /// Number of buy transactions this month.
    pub buy_count: usize,
    /// Distinct instruments bought this month.
    pub instruments_bought: usize,
    /// Quantity of this month's buys already matched by sells.
    pub matched_quantity: Decimal,
    /// Cost basis of the matched quantity.
    pub matched_cost: Decimal,
    /// Sell revenue of the matched quantity.
    pub sell_revenue: Decimal,
    /// `realized_profit / buy_cost`; `None` when the month has no buys.
    pub realized_rate: Option<Decimal>,
}

impl MonthlyAttribution {
    fn empty(month: MonthKey) -> Self {
        MonthlyAttribution {
            month,
            buy_cost: Decimal::zero(),
            realized_profit: Decimal::zero(),
            buy_count: 0,
            instruments_bought: 0,
            matched_quantity: Decimal::zero(),
            matched_cost: Decimal::zero(),
            sell_revenue: Decimal::zero(),
            realized_rate: None,
        }
    }

    pub fn has_buys(&self) -> bool {
        self.buy_count > 0
    }

    /// Buy cost plus matched sell revenue.
    pub fn turnover(&self) -> Decimal {
        self.buy_cost + self.sell_revenue
    }
}

/// Bucket matches and buys into every month of `range`.
///
/// Every month in the range is present in the output, including months
/// without activity. Sells passed in `buys` are ignored. An empty range
/// yields an empty map.
pub fn aggregate_monthly(
    matches: &[Match],
    buys: &[Transaction],
    range: MonthRange,
) -> BTreeMap<MonthKey, MonthlyAttribution> {
    let mut out: BTreeMap<MonthKey, MonthlyAttribution> = range
        .months()
        .map(|m| (m, MonthlyAttribution::empty(m)))
        .collect();
    let mut instruments: BTreeMap<MonthKey, BTreeSet<&Instrument>> = BTreeMap::new();

    for buy in buys.iter().filter(|t| t.side == Side::Buy) {
        let Some(bucket) = out.get_mut(&buy.month()) else {
            continue;
        };
        bucket.buy_cost += buy.notional();
        bucket.buy_count += 1;
        instruments
            .entry(bucket.month)
            .or_default()
            .insert(&buy.instrument);
    }

    for m in matches {
        let Some(bucket) = out.get_mut(&m.buy_month()) else {
            continue;
        };
        bucket.realized_profit += m.realized_profit();
        bucket.matched_quantity += m.quantity;
        bucket.matched_cost += m.cost;
        bucket.sell_revenue += m.revenue;
    }

    for bucket in out.values_mut() {
        bucket.instruments_bought = instruments.get(&bucket.month).map_or(0, BTreeSet::len);
        bucket.realized_rate = if bucket.has_buys() {
            bucket.realized_profit.checked_div(bucket.buy_cost)
        } else {
            None
        };
    }

    out
}

/// Σ realized profit over all months of an aggregate.
pub fn total_realized(aggregate: &BTreeMap<MonthKey, MonthlyAttribution>) -> Decimal {
    aggregate.values().map(|a| a.realized_profit).sum()
}
