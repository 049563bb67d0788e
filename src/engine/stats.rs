//! Win/loss statistics over realized matches.

use super::holding::weighted_holding_days;
use crate::domain::{Decimal, Match};
use serde::Serialize;

/// Outcome counts and ratios for a list of matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeStats {
    pub match_count: usize,
    pub wins: usize,
    pub losses: usize,
    pub flat: usize,
    /// wins / match_count; `None` without matches.
    pub win_rate: Option<Decimal>,
    pub realized_profit: Decimal,
    pub matched_cost: Decimal,
    /// Σ profit / Σ cost over all matches.
    pub profit_ratio: Option<Decimal>,
    pub average_holding_days: Option<Decimal>,
}

impl TradeStats {
    pub fn from_matches(matches: &[Match]) -> Self {
        let mut wins = 0;
        let mut losses = 0;
        let mut flat = 0;
        for m in matches {
            let profit = m.realized_profit();
            if profit.is_positive() {
                wins += 1;
            } else if profit.is_negative() {
                losses += 1;
            } else {
                flat += 1;
            }
        }

        let realized_profit: Decimal = matches.iter().map(Match::realized_profit).sum();
        let matched_cost: Decimal = matches.iter().map(|m| m.cost).sum();

        TradeStats {
            match_count: matches.len(),
            wins,
            losses,
            flat,
            win_rate: Decimal::from(wins as i64).checked_div(Decimal::from(matches.len() as i64)),
            realized_profit,
            matched_cost,
            profit_ratio: realized_profit.checked_div(matched_cost),
            average_holding_days: weighted_holding_days(matches),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Instrument;
    use chrono::NaiveDate;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn matched(qty: &str, cost: &str, price: &str, days: u32) -> Match {
        Match {
            instrument: Instrument::new("6758"),
            lot_id: 1,
            buy_txn_key: "txn:1".to_string(),
            sell_txn_key: "txn:2".to_string(),
            quantity: d(qty),
            unit_cost: d(cost),
            unit_price: d(price),
            cost: d(qty) * d(cost),
            revenue: d(qty) * d(price),
            bought_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            sold_at: NaiveDate::from_ymd_opt(2024, 1, 1 + days)
                .unwrap()
                .and_hms_opt(14, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_stats_over_mixed_outcomes() {
        let matches = [
            matched("100", "10", "12", 4),
            matched("100", "10", "9", 2),
            matched("100", "10", "10", 0),
            matched("100", "10", "11", 10),
        ];
        let stats = TradeStats::from_matches(&matches);

        assert_eq!(stats.match_count, 4);
        assert_eq!(stats.wins, 2);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.flat, 1);
        assert_eq!(stats.win_rate, Some(d("0.5")));
        assert_eq!(stats.realized_profit, d("200"));
        assert_eq!(stats.matched_cost, d("4000"));
        assert_eq!(stats.profit_ratio, Some(d("0.05")));
        assert_eq!(stats.average_holding_days, Some(d("4")));
    }

    #[test]
    fn test_empty_stats() {
        let stats = TradeStats::from_matches(&[]);
        assert_eq!(stats.match_count, 0);
        assert_eq!(stats.win_rate, None);
        assert_eq!(stats.profit_ratio, None);
        assert_eq!(stats.average_holding_days, None);
    }
}
