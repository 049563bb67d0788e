//! Pure computation engine for trade matching and profit attribution.
//!
//! Everything here is a deterministic function of its inputs: no IO, no
//! clock, no shared state. Instruments are independent of each other; one
//! instrument's ledger must only be replayed by one caller at a time.

pub mod attribution;
pub mod expectation;
pub mod holding;
pub mod ledger;
pub mod matching;
pub mod replay;
pub mod stats;
pub mod targets;
pub mod valuation;

pub use attribution::{aggregate_monthly, total_realized, MonthlyAttribution};
pub use expectation::{
    compare_month, compare_months, ExpectationModel, ExpectationScenario, MonthComparison,
    ProjectedMonth, Projection,
};
pub use holding::{holding_by_lineage, holding_days, weighted_holding_days, LineageHolding};
pub use ledger::LotLedger;
pub use matching::match_sell;
pub use replay::{
    compute_ledger_and_matches, replay_fingerprint, replay_journal, value_open_lots,
    JournalReplay, LedgerReplay, OpenValuation,
};
pub use stats::TradeStats;
pub use targets::{plan_exits, ExitPlan, TargetStatus};
pub use valuation::{unrealized_by_buy_month, value_position, PositionSnapshot, PriceMap};
