//! Domain types for the trade journal engine.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Domain primitives: Instrument, Side, MonthKey, MonthRange
//! - Transaction, Lot and Match records
//! - Feed ordering checks (the engine never re-sorts)

pub mod decimal;
pub mod lot;
pub mod ordering;
pub mod primitives;
pub mod transaction;

pub use decimal::Decimal;
pub use lot::{Lot, LotId, Match};
pub use ordering::{is_chronological, OrderingGuard};
pub use primitives::{Instrument, MonthKey, MonthRange, Side};
pub use transaction::{ProfitTarget, TargetTrigger, Transaction};
