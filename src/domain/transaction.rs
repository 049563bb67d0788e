//! Transaction type representing one executed trade logged in the journal.

use crate::domain::{Decimal, Instrument, MonthKey, Side};
use crate::error::EngineError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// How a profit-taking target is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum TargetTrigger {
    /// Absolute price at which to take profit.
    Price(Decimal),
    /// Profit ratio over the buy price (0.1 = +10%).
    ProfitRatio(Decimal),
}

/// One step of a partial profit-taking plan attached to a buy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitTarget {
    /// Execution order of the target within its plan.
    pub sequence: u32,
    pub trigger: TargetTrigger,
    /// Fraction of the original buy quantity to sell at this target.
    pub sell_ratio: Decimal,
}

impl ProfitTarget {
    pub fn at_price(sequence: u32, price: Decimal, sell_ratio: Decimal) -> Self {
        ProfitTarget {
            sequence,
            trigger: TargetTrigger::Price(price),
            sell_ratio,
        }
    }

    pub fn at_ratio(sequence: u32, ratio: Decimal, sell_ratio: Decimal) -> Self {
        ProfitTarget {
            sequence,
            trigger: TargetTrigger::ProfitRatio(ratio),
            sell_ratio,
        }
    }
}

/// A single executed trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Stable unique identifier for this transaction.
    pub txn_key: String,
    /// Journal row id, when the surrounding system has one.
    pub id: Option<i64>,
    pub instrument: Instrument,
    pub side: Side,
    pub quantity: Decimal,
    /// Unit price.
    pub price: Decimal,
    pub executed_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profit_targets: Vec<ProfitTarget>,
}

impl Transaction {
    pub fn new(
        id: Option<i64>,
        instrument: Instrument,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        executed_at: NaiveDateTime,
    ) -> Self {
        let txn_key =
            Self::compute_txn_key(id, &instrument, side, &quantity, &price, executed_at);
        Transaction {
            txn_key,
            id,
            instrument,
            side,
            quantity,
            price,
            executed_at,
            stop_loss: None,
            profit_targets: Vec::new(),
        }
    }

    pub fn with_stop_loss(mut self, stop_loss: Decimal) -> Self {
        self.stop_loss = Some(stop_loss);
        self
    }

    pub fn with_profit_targets(mut self, targets: Vec<ProfitTarget>) -> Self {
        self.profit_targets = targets;
        self
    }

    /// Generate a stable unique key for this transaction.
    ///
    /// Priority: journal `id` (if present) > hash of the trade fields.
    /// Variable-length fields are length-prefixed. Two identical trades without
    /// ids still share a key; lots are told apart by `LotId`, not by this key.
    pub fn compute_txn_key(
        id: Option<i64>,
        instrument: &Instrument,
        side: Side,
        quantity: &Decimal,
        price: &Decimal,
        executed_at: NaiveDateTime,
    ) -> String {
        if let Some(id) = id {
            return format!("txn:{}", id);
        }

        use sha2::{Digest, Sha256};

        fn hash_var(hasher: &mut Sha256, data: &str) {
            hasher.update((data.len() as u32).to_le_bytes());
            hasher.update(data.as_bytes());
        }

        let mut hasher = Sha256::new();
        hash_var(&mut hasher, instrument.as_str());
        hasher.update(if side == Side::Buy { b"B" } else { b"S" });
        hash_var(&mut hasher, &quantity.to_canonical_string());
        hash_var(&mut hasher, &price.to_canonical_string());
        hasher.update(executed_at.and_utc().timestamp().to_le_bytes());
        hasher.update(executed_at.and_utc().timestamp_subsec_nanos().to_le_bytes());
        let hash = hasher.finalize();
        format!("hash:{}", hex::encode(&hash[..16]))
    }

    pub fn txn_key(&self) -> &str {
        &self.txn_key
    }

    /// Quantity × unit price.
    pub fn notional(&self) -> Decimal {
        self.quantity * self.price
    }

    /// Attribution month of this transaction.
    pub fn month(&self) -> MonthKey {
        MonthKey::of(self.executed_at)
    }

    /// Reject non-positive quantity, price or stop loss.
    pub fn check_amounts(&self) -> Result<(), EngineError> {
        if !self.quantity.is_positive() {
            return Err(self.invalid(format!("quantity must be > 0, got {}", self.quantity)));
        }
        if !self.price.is_positive() {
            return Err(self.invalid(format!("price must be > 0, got {}", self.price)));
        }
        if let Some(stop) = self.stop_loss {
            if !stop.is_positive() {
                return Err(self.invalid(format!("stop loss must be > 0, got {}", stop)));
            }
        }
        Ok(())
    }

    pub(crate) fn invalid(&self, reason: impl Into<String>) -> EngineError {
        EngineError::InvalidTransaction {
            txn: self.txn_key.clone(),
            reason: reason.into(),
        }
    }
}
