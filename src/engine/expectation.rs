//! Probability-weighted expectation baseline and actual-vs-expected join.
//!
//! The model is static configuration: a scenario table of
//! (probability, return ratio, max holding days) rows. From it we derive the
//! expected return per trade, expected holding days, monthly turnover and an
//! expected monthly return rate, which compounds against a capital base.
//!
//! Comparisons judge a month on total profit (realized + unrealized on that
//! month's still-open buys). Realized-only comparisons make months with large
//! open gains look like underperformers against a model that assumes every
//! trade completes.

use super::attribution::MonthlyAttribution;
use crate::domain::{Decimal, MonthKey};
use crate::error::EngineError;
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One probability-weighted outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectationScenario {
    pub probability: Decimal,
    /// May be negative.
    pub return_ratio: Decimal,
    pub max_holding_days: Decimal,
}

impl ExpectationScenario {
    pub fn new(probability: Decimal, return_ratio: Decimal, max_holding_days: Decimal) -> Self {
        Self {
            probability,
            return_ratio,
            max_holding_days,
        }
    }
}

/// Tolerance on Σ probability = 1.
fn probability_epsilon() -> Decimal {
    Decimal::new(RustDecimal::new(1, 6))
}

/// Constants derived from a validated scenario table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectationModel {
    pub scenarios: Vec<ExpectationScenario>,
    pub trading_days_per_month: Decimal,
    pub expected_return_per_trade: Decimal,
    pub expected_holding_days: Decimal,
    pub monthly_turnover: Decimal,
    pub expected_monthly_return_rate: Decimal,
}

impl ExpectationModel {
    /// # Errors
    /// `InvalidScenarioTable` if the table is empty, a probability is outside
    /// [0, 1], probabilities do not sum to 1, a holding period or the
    /// trading-day count is not positive.
    pub fn new(
        scenarios: Vec<ExpectationScenario>,
        trading_days_per_month: Decimal,
    ) -> Result<Self, EngineError> {
        if scenarios.is_empty() {
            return Err(EngineError::InvalidScenarioTable(
                "at least one scenario is required".to_string(),
            ));
        }
        if !trading_days_per_month.is_positive() {
            return Err(EngineError::InvalidScenarioTable(format!(
                "trading days per month must be > 0, got {}",
                trading_days_per_month
            )));
        }
        for (i, s) in scenarios.iter().enumerate() {
            if s.probability.is_negative() || s.probability > Decimal::one() {
                return Err(EngineError::InvalidScenarioTable(format!(
                    "scenario {} probability {} is outside [0, 1]",
                    i, s.probability
                )));
            }
            if !s.max_holding_days.is_positive() {
                return Err(EngineError::InvalidScenarioTable(format!(
                    "scenario {} max holding days must be > 0, got {}",
                    i, s.max_holding_days
                )));
            }
        }
        let total: Decimal = scenarios.iter().map(|s| s.probability).sum();
        if (total - Decimal::one()).abs() > probability_epsilon() {
            return Err(EngineError::InvalidScenarioTable(format!(
                "probabilities sum to {}, expected 1",
                total
            )));
        }

        let expected_return_per_trade: Decimal = scenarios
            .iter()
            .map(|s| s.probability * s.return_ratio)
            .sum();
        let expected_holding_days: Decimal = scenarios
            .iter()
            .map(|s| s.probability * s.max_holding_days)
            .sum();
        let monthly_turnover = trading_days_per_month
            .checked_div(expected_holding_days)
            .ok_or_else(|| {
                EngineError::InvalidScenarioTable("expected holding days is zero".to_string())
            })?;

        Ok(Self {
            scenarios,
            trading_days_per_month,
            expected_return_per_trade,
            expected_holding_days,
            monthly_turnover,
            expected_monthly_return_rate: expected_return_per_trade * monthly_turnover,
        })
    }

    /// Compound the monthly rate over `months` starting at `start_month`.
    pub fn project(
        &self,
        starting_capital: Decimal,
        start_month: MonthKey,
        months: u32,
    ) -> Projection {
        Projection {
            monthly_rate: self.expected_monthly_return_rate,
            starting_capital,
            start_month,
            months,
        }
    }
}

/// One month of a capital projection. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedMonth {
    pub index: u32,
    pub month: MonthKey,
    pub starting_capital: Decimal,
    pub expected_profit: Decimal,
    pub ending_capital: Decimal,
}

/// A finite compounding projection. Holds no iteration state: every call to
/// [`iter`](Projection::iter) restarts from the starting capital.
///
/// Iteration ends early at the first month whose capital would overflow the
/// decimal range, so a long horizon may yield fewer than `months` points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub monthly_rate: Decimal,
    pub starting_capital: Decimal,
    pub start_month: MonthKey,
    pub months: u32,
}

impl Projection {
    pub fn iter(&self) -> ProjectionIter {
        ProjectionIter {
            monthly_rate: self.monthly_rate,
            capital: self.starting_capital,
            month: self.start_month,
            index: 0,
            months: self.months,
        }
    }

    /// The projected month for a calendar month, if inside the window.
    pub fn point_for(&self, month: MonthKey) -> Option<ProjectedMonth> {
        let offset = self.start_month.months_until(month);
        if offset < 0 || offset >= self.months as i64 {
            return None;
        }
        self.iter().nth(offset as usize)
    }

    /// Capital after the final projected month.
    pub fn final_capital(&self) -> Decimal {
        self.iter()
            .last()
            .map_or(self.starting_capital, |p| p.ending_capital)
    }
}

impl<'a> IntoIterator for &'a Projection {
    type Item = ProjectedMonth;
    type IntoIter = ProjectionIter;

    fn into_iter(self) -> ProjectionIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct ProjectionIter {
    monthly_rate: Decimal,
    capital: Decimal,
    month: MonthKey,
    index: u32,
    months: u32,
}

impl Iterator for ProjectionIter {
    type Item = ProjectedMonth;

    fn next(&mut self) -> Option<ProjectedMonth> {
        if self.index >= self.months {
            return None;
        }
        let starting_capital = self.capital;
        let compounded = starting_capital
            .checked_mul(self.monthly_rate)
            .and_then(|profit| Some((profit, starting_capital.checked_add(profit)?)));
        let Some((expected_profit, ending_capital)) = compounded else {
            tracing::warn!(
                month = %self.month,
                index = self.index + 1,
                "projected capital exceeds the decimal range; projection truncated"
            );
            self.months = self.index;
            return None;
        };
        self.index += 1;
        let point = ProjectedMonth {
            index: self.index,
            month: self.month,
            starting_capital,
            expected_profit,
            ending_capital,
        };
        self.capital = ending_capital;
        self.month = self.month.next();
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some((self.months - self.index) as usize))
    }
}

/// Actual vs expected for one month.
///
/// Differences are `actual - expected`; percentage differences are relative
/// to the absolute expected value, in percent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthComparison {
    pub month: MonthKey,
    pub projection_index: u32,
    pub buy_cost: Decimal,
    pub realized_profit: Decimal,
    pub unrealized_profit: Decimal,
    /// realized + unrealized
    pub actual_profit: Decimal,
    /// `actual_profit / buy_cost`; `None` when the month has no buys.
    pub actual_rate: Option<Decimal>,
    pub expected_profit: Decimal,
    pub expected_rate: Decimal,
    pub profit_difference: Decimal,
    pub profit_difference_pct: Option<Decimal>,
    pub rate_difference: Option<Decimal>,
    pub rate_difference_pct: Option<Decimal>,
}

fn pct_of(diff: Decimal, base: Decimal) -> Option<Decimal> {
    diff.checked_div(base.abs()).map(|r| r * Decimal::hundred())
}

/// Join one month's attribution (plus the unrealized profit of that month's
/// still-open buys) against the projection.
///
/// # Errors
/// `MonthMismatch` if `actual` is for another month; `MonthOutsideProjection`
/// if the month falls outside the projection window.
pub fn compare_month(
    month: MonthKey,
    actual: &MonthlyAttribution,
    actual_unrealized: Decimal,
    projection: &Projection,
) -> Result<MonthComparison, EngineError> {
    if actual.month != month {
        return Err(EngineError::MonthMismatch {
            requested: month,
            actual: actual.month,
        });
    }
    let point = projection
        .point_for(month)
        .ok_or(EngineError::MonthOutsideProjection { month })?;

    let actual_profit = actual.realized_profit + actual_unrealized;
    let actual_rate = if actual.has_buys() {
        actual_profit.checked_div(actual.buy_cost)
    } else {
        None
    };
    let expected_rate = projection.monthly_rate;
    let profit_difference = actual_profit - point.expected_profit;
    let rate_difference = actual_rate.map(|r| r - expected_rate);

    Ok(MonthComparison {
        month,
        projection_index: point.index,
        buy_cost: actual.buy_cost,
        realized_profit: actual.realized_profit,
        unrealized_profit: actual_unrealized,
        actual_profit,
        actual_rate,
        expected_profit: point.expected_profit,
        expected_rate,
        profit_difference,
        profit_difference_pct: pct_of(profit_difference, point.expected_profit),
        rate_difference,
        rate_difference_pct: rate_difference.and_then(|d| pct_of(d, expected_rate)),
    })
}

/// Compare every aggregated month that falls inside the projection.
///
/// Months missing from `unrealized` are treated as having no open gains.
pub fn compare_months(
    aggregate: &BTreeMap<MonthKey, MonthlyAttribution>,
    unrealized: &BTreeMap<MonthKey, Decimal>,
    projection: &Projection,
) -> Vec<MonthComparison> {
    aggregate
        .iter()
        .filter(|(month, _)| projection.point_for(**month).is_some())
        .filter_map(|(month, actual)| {
            let open = unrealized.get(month).copied().unwrap_or_default();
            compare_month(*month, actual, open, projection).ok()
        })
        .collect()
}
