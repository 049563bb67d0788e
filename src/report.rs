//! End-to-end journal report: replay, valuation, attribution, projection and
//! comparison in one serialisable document.

use crate::config::Config;
use crate::domain::{Decimal, Instrument, Lot, Match, MonthKey, MonthRange, Side, Transaction};
use crate::engine::{
    aggregate_monthly, compare_months, holding_by_lineage, plan_exits, replay_fingerprint,
    replay_journal, total_realized, value_open_lots, value_position, ExitPlan, ExpectationModel,
    ExpectationScenario, LedgerReplay, LineageHolding, MonthComparison, MonthlyAttribution,
    PositionSnapshot, PriceMap, ProjectedMonth, TradeStats,
};
use crate::error::EngineError;
use serde::Serialize;
use std::collections::BTreeMap;

/// Inputs of the expectation side of a report.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub scenarios: Vec<ExpectationScenario>,
    pub trading_days_per_month: Decimal,
    pub starting_capital: Decimal,
    pub projection_months: u32,
    pub projection_start: Option<MonthKey>,
}

impl From<&Config> for ReportSettings {
    fn from(config: &Config) -> Self {
        ReportSettings {
            scenarios: config.scenarios.clone(),
            trading_days_per_month: config.trading_days_per_month,
            starting_capital: config.starting_capital,
            projection_months: config.projection_months,
            projection_start: config.projection_start,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentReport {
    pub instrument: Instrument,
    /// `None` when no current price was supplied.
    pub position: Option<PositionSnapshot>,
    pub open_lots: Vec<Lot>,
    pub matches: Vec<Match>,
    pub stats: TradeStats,
    pub lineages: Vec<LineageHolding>,
    pub exit_plans: Vec<ExitPlan>,
    /// Rejected transactions and invalid exit plans.
    pub errors: Vec<String>,
}

/// An instrument whose replay aborted; none of its figures are reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentFailure {
    pub instrument: Instrument,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalReport {
    pub transaction_count: usize,
    pub instruments: Vec<InstrumentReport>,
    pub failures: Vec<InstrumentFailure>,
    pub overall: TradeStats,
    pub monthly: Vec<MonthlyAttribution>,
    pub total_realized: Decimal,
    pub unrealized_by_month: BTreeMap<MonthKey, Decimal>,
    pub missing_prices: Vec<Instrument>,
    pub model: ExpectationModel,
    pub projection_start: Option<MonthKey>,
    pub projection: Vec<ProjectedMonth>,
    /// Fewer months than configured: capital left the decimal range.
    pub projection_truncated: bool,
    pub final_capital: Decimal,
    pub comparisons: Vec<MonthComparison>,
    /// SHA-256 over every reported match; stable for an unchanged journal.
    pub fingerprint: String,
}

/// Replay a mixed journal and assemble the full report.
///
/// Instruments whose replay aborts are listed under `failures` and excluded
/// from every aggregate.
///
/// A non-positive current price is recorded in that instrument's `errors`
/// and the instrument is listed under `missing_prices` when it has open lots.
///
/// # Errors
/// `InvalidScenarioTable` for a bad scenario table.
pub fn build_report(
    settings: &ReportSettings,
    transactions: &[Transaction],
    prices: &PriceMap,
) -> Result<JournalReport, EngineError> {
    let model = ExpectationModel::new(settings.scenarios.clone(), settings.trading_days_per_month)?;

    let mut replays: Vec<LedgerReplay> = Vec::new();
    let mut failures = Vec::new();
    for (instrument, outcome) in replay_journal(transactions) {
        match outcome {
            Ok(replay) => replays.push(replay),
            Err(err) => {
                tracing::error!(instrument = %instrument, error = %err, "instrument replay aborted");
                failures.push(InstrumentFailure {
                    instrument,
                    error: err.to_string(),
                });
            }
        }
    }

    let instruments: Vec<InstrumentReport> = replays
        .iter()
        .map(|replay| instrument_report(replay, prices))
        .collect();

    let all_matches: Vec<Match> = replays.iter().flat_map(|r| r.matches.clone()).collect();
    let all_buys: Vec<Transaction> = replays.iter().flat_map(|r| r.buys.clone()).collect();

    let range = MonthRange::covering(
        replays
            .iter()
            .flat_map(|r| r.buys.iter().map(Transaction::month))
            .chain(all_matches.iter().map(Match::sell_month)),
    );
    let aggregate = range
        .map(|range| aggregate_monthly(&all_matches, &all_buys, range))
        .unwrap_or_default();

    // Non-positive prices were reported per instrument; value the rest as if
    // those prices were missing.
    let usable_prices: PriceMap = prices
        .iter()
        .filter(|(_, price)| price.is_positive())
        .map(|(instrument, price)| (instrument.clone(), *price))
        .collect();
    let valuation = value_open_lots(&replays, &usable_prices)?;

    let projection_start = settings
        .projection_start
        .or_else(|| all_buys.iter().map(Transaction::month).min());
    let (projection, final_capital, comparisons): (Vec<ProjectedMonth>, Decimal, Vec<MonthComparison>) =
        match projection_start {
            Some(start) => {
                let projection =
                    model.project(settings.starting_capital, start, settings.projection_months);
                let comparisons = compare_months(&aggregate, &valuation.by_month, &projection);
                (projection.iter().collect(), projection.final_capital(), comparisons)
            }
            None => (Vec::new(), settings.starting_capital, Vec::new()),
        };

    tracing::info!(
        instruments = instruments.len(),
        failures = failures.len(),
        months = aggregate.len(),
        comparisons = comparisons.len(),
        "report built"
    );

    Ok(JournalReport {
        transaction_count: transactions.len(),
        instruments,
        failures,
        overall: TradeStats::from_matches(&all_matches),
        total_realized: total_realized(&aggregate),
        monthly: aggregate.into_values().collect(),
        unrealized_by_month: valuation.by_month,
        missing_prices: valuation.missing_prices,
        model,
        projection_start,
        projection_truncated: projection_start.is_some()
            && projection.len() < settings.projection_months as usize,
        projection,
        final_capital,
        comparisons,
        fingerprint: replay_fingerprint(&all_matches),
    })
}

fn instrument_report(replay: &LedgerReplay, prices: &PriceMap) -> InstrumentReport {
    let mut errors: Vec<String> = replay.errors.iter().map(ToString::to_string).collect();

    let position = match prices.get(&replay.instrument) {
        Some(price) => match value_position(&replay.open_lots, *price) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                errors.push(err.to_string());
                None
            }
        },
        None => None,
    };
    let mut exit_plans = Vec::new();
    for (buy, lot_id) in replay
        .buys_with_lots()
        .filter(|(b, _)| b.side == Side::Buy && !b.profit_targets.is_empty())
    {
        match plan_exits(buy, lot_id, &replay.matches) {
            Ok(plan) => exit_plans.push(plan),
            Err(err) => errors.push(err.to_string()),
        }
    }

    InstrumentReport {
        instrument: replay.instrument.clone(),
        position,
        open_lots: replay.open_lots.clone(),
        matches: replay.matches.clone(),
        stats: TradeStats::from_matches(&replay.matches),
        lineages: holding_by_lineage(&replay.matches, &replay.open_lots),
        exit_plans,
        errors,
    }
}
