use crate::domain::{Decimal, Instrument, LotId, MonthKey};
use thiserror::Error;

/// Structured errors raised by the matching and attribution engine.
///
/// The engine only classifies; callers decide what an error means to a user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Rejected at ingest. Collected per transaction; the replay continues.
    #[error("Invalid transaction {txn}: {reason}")]
    InvalidTransaction { txn: String, reason: String },

    /// Sell quantity exceeds the open position. Fatal to the instrument's replay.
    #[error("Oversell on {instrument}: {txn} sells {requested} but only {available} is open")]
    OverSell {
        instrument: Instrument,
        txn: String,
        requested: Decimal,
        available: Decimal,
    },

    /// Internal invariant violation; unreachable through the matching engine.
    #[error("Lot {lot} over-consumed: requested {requested}, remaining {remaining}")]
    OverConsumption {
        lot: LotId,
        requested: Decimal,
        remaining: Decimal,
    },

    #[error("Invalid price: {price} (must be > 0)")]
    InvalidPrice { price: Decimal },

    #[error("Invalid expectation scenario table: {0}")]
    InvalidScenarioTable(String),

    #[error("Month {month} is outside the projection window")]
    MonthOutsideProjection { month: MonthKey },

    #[error("Comparison requested for {requested} but the aggregate is for {actual}")]
    MonthMismatch { requested: MonthKey, actual: MonthKey },
}

impl EngineError {
    /// True for errors that poison an instrument's whole replay.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::OverSell { .. } | EngineError::OverConsumption { .. }
        )
    }
}
