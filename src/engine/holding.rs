//! Holding-period calculation over realized matches.
//!
//! Calendar days, not trading days. Open lots never contribute a figure.

use crate::domain::{Decimal, Instrument, Lot, LotId, Match};
use serde::Serialize;
use std::collections::BTreeMap;

/// Whole calendar days between the buy date and the sell date (same day = 0).
pub fn holding_days(m: &Match) -> i64 {
    (m.sold_at.date() - m.bought_at.date()).num_days().max(0)
}

/// Quantity-weighted average holding days: Σ(q × days) / Σ(q).
///
/// `None` when there is no matched quantity.
pub fn weighted_holding_days<'a, I>(matches: I) -> Option<Decimal>
where
    I: IntoIterator<Item = &'a Match>,
{
    let (weighted, quantity) = matches.into_iter().fold(
        (Decimal::zero(), Decimal::zero()),
        |(weighted, quantity), m| {
            (
                weighted + m.quantity * Decimal::from(holding_days(m)),
                quantity + m.quantity,
            )
        },
    );
    weighted.checked_div(quantity)
}

/// Holding figures for one buy lot across all of its (partial) exits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageHolding {
    pub instrument: Instrument,
    pub lot_id: LotId,
    pub buy_txn_key: String,
    pub matched_quantity: Decimal,
    pub exits: usize,
    pub weighted_days: Decimal,
    /// True when no quantity of the lot remains open.
    pub fully_closed: bool,
}

/// Group matches by originating lot and compute each lineage's weighted days.
///
/// Lot ids are only unique within an instrument, so lineages are keyed by
/// both. `open_lots` marks which lineages are still partially open.
pub fn holding_by_lineage(matches: &[Match], open_lots: &[Lot]) -> Vec<LineageHolding> {
    let mut grouped: BTreeMap<(&Instrument, LotId), Vec<&Match>> = BTreeMap::new();
    for m in matches {
        grouped.entry((&m.instrument, m.lot_id)).or_default().push(m);
    }

    grouped
        .into_iter()
        .filter_map(|((instrument, lot_id), group)| {
            let weighted_days = weighted_holding_days(group.iter().copied())?;
            Some(LineageHolding {
                instrument: instrument.clone(),
                lot_id,
                buy_txn_key: group[0].buy_txn_key.clone(),
                matched_quantity: group.iter().map(|m| m.quantity).sum(),
                exits: group.len(),
                weighted_days,
                fully_closed: !open_lots.iter().any(|lot| {
                    lot.lot_id == lot_id && &lot.instrument == instrument && lot.is_open()
                }),
            })
        })
        .collect()
}
