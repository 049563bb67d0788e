//! Open buy lots and the realized-profit records produced by matching.

use crate::domain::{Decimal, Instrument, MonthKey};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Ledger-assigned lot identifier, unique within one instrument replay.
pub type LotId = u64;

/// The not-yet-matched slice of one buy transaction.
///
/// Invariant: `0 <= remaining_quantity <= original_quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lot {
    pub lot_id: LotId,
    pub instrument: Instrument,
    /// Key of the originating buy transaction.
    pub buy_txn_key: String,
    pub original_quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub unit_cost: Decimal,
    pub bought_at: NaiveDateTime,
}

impl Lot {
    pub fn is_open(&self) -> bool {
        self.remaining_quantity.is_positive()
    }

    /// Cost of the still-open quantity.
    pub fn open_cost(&self) -> Decimal {
        self.remaining_quantity * self.unit_cost
    }

    pub fn buy_month(&self) -> MonthKey {
        MonthKey::of(self.bought_at)
    }
}

/// Realized-profit record: sell quantity paired against one lot.
///
/// Produced only by the matching engine and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub instrument: Instrument,
    pub lot_id: LotId,
    pub buy_txn_key: String,
    pub sell_txn_key: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub unit_price: Decimal,
    /// quantity × unit_cost
    pub cost: Decimal,
    /// quantity × unit_price
    pub revenue: Decimal,
    pub bought_at: NaiveDateTime,
    pub sold_at: NaiveDateTime,
}

impl Match {
    pub fn realized_profit(&self) -> Decimal {
        self.revenue - self.cost
    }

    /// Realized profit over cost; `None` for a zero-cost lot.
    pub fn profit_ratio(&self) -> Option<Decimal> {
        self.realized_profit().checked_div(self.cost)
    }

    /// Attribution month: the month of the originating buy.
    pub fn buy_month(&self) -> MonthKey {
        MonthKey::of(self.bought_at)
    }

    pub fn sell_month(&self) -> MonthKey {
        MonthKey::of(self.sold_at)
    }

    /// Canonical single-line rendering used for replay fingerprints.
    pub fn canonical_line(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.instrument,
            self.lot_id,
            self.buy_txn_key,
            self.sell_txn_key,
            self.quantity.to_canonical_string(),
            self.unit_cost.to_canonical_string(),
            self.unit_price.to_canonical_string(),
            self.bought_at.format("%Y-%m-%dT%H:%M:%S%.f"),
            self.sold_at.format("%Y-%m-%dT%H:%M:%S%.f"),
        )
    }
}
