pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod feed;
pub mod report;

pub use config::Config;
pub use domain::{Decimal, Instrument, Lot, Match, MonthKey, MonthRange, Side, Transaction};
pub use engine::{
    aggregate_monthly, compute_ledger_and_matches, match_sell, value_position, ExpectationModel,
    LotLedger, PriceMap,
};
pub use error::EngineError;
pub use feed::FeedError;
pub use report::{build_report, JournalReport, ReportSettings};
