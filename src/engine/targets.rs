//! Partial profit-taking plans attached to buys.

use crate::domain::{Decimal, LotId, Match, ProfitTarget, Side, TargetTrigger, Transaction};
use crate::error::EngineError;
use serde::Serialize;

/// One resolved step of an exit plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetStatus {
    pub sequence: u32,
    pub trigger_price: Decimal,
    pub planned_quantity: Decimal,
    pub planned_profit: Decimal,
    /// Some sell of this buy's lot executed at or above the trigger price.
    pub reached: bool,
}

/// Resolved plan for one buy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitPlan {
    pub lot_id: LotId,
    pub buy_txn_key: String,
    pub targets: Vec<TargetStatus>,
    /// Fraction of the buy not covered by any target.
    pub unplanned_ratio: Decimal,
    /// Loss if the whole buy were stopped out; `None` without a stop below cost.
    pub risk_amount: Option<Decimal>,
    /// Σ planned profit / risk amount.
    pub reward_risk_ratio: Option<Decimal>,
}

/// Resolve a buy's profit targets against the matches of the lot it opened.
///
/// Only matches against `lot_id` of the buy's instrument count as sells of
/// this buy; the transaction key is not used for the lookup.
///
/// # Errors
/// `InvalidTransaction` if `buy` is not a valid buy, a sell ratio is outside
/// (0, 1], sell ratios sum above 1, or a trigger is not positive.
pub fn plan_exits(
    buy: &Transaction,
    lot_id: LotId,
    matches: &[Match],
) -> Result<ExitPlan, EngineError> {
    if buy.side != Side::Buy {
        return Err(buy.invalid("exit plans apply to buys only"));
    }
    buy.check_amounts()?;

    let mut ordered: Vec<&ProfitTarget> = buy.profit_targets.iter().collect();
    ordered.sort_by_key(|t| t.sequence);

    let own_sells: Vec<&Match> = matches
        .iter()
        .filter(|m| m.lot_id == lot_id && m.instrument == buy.instrument)
        .collect();

    let mut planned_ratio = Decimal::zero();
    let mut targets = Vec::with_capacity(ordered.len());
    for target in ordered {
        if !target.sell_ratio.is_positive() || target.sell_ratio > Decimal::one() {
            return Err(buy.invalid(format!(
                "target {} sell ratio {} is outside (0, 1]",
                target.sequence, target.sell_ratio
            )));
        }
        planned_ratio += target.sell_ratio;
        if planned_ratio > Decimal::one() {
            return Err(buy.invalid(format!(
                "target sell ratios sum to {} (> 1)",
                planned_ratio
            )));
        }

        let trigger_price = match target.trigger {
            TargetTrigger::Price(price) => price,
            TargetTrigger::ProfitRatio(ratio) => buy.price * (Decimal::one() + ratio),
        };
        if !trigger_price.is_positive() {
            return Err(buy.invalid(format!(
                "target {} trigger price {} must be > 0",
                target.sequence, trigger_price
            )));
        }

        let planned_quantity = buy.quantity * target.sell_ratio;
        targets.push(TargetStatus {
            sequence: target.sequence,
            trigger_price,
            planned_quantity,
            planned_profit: planned_quantity * (trigger_price - buy.price),
            reached: own_sells.iter().any(|m| m.unit_price >= trigger_price),
        });
    }

    let risk_amount = buy
        .stop_loss
        .filter(|stop| *stop < buy.price)
        .map(|stop| buy.quantity * (buy.price - stop));
    let planned_reward: Decimal = targets.iter().map(|t| t.planned_profit).sum();

    Ok(ExitPlan {
        lot_id,
        buy_txn_key: buy.txn_key.clone(),
        targets,
        unplanned_ratio: Decimal::one() - planned_ratio,
        risk_amount,
        reward_risk_ratio: risk_amount.and_then(|risk| planned_reward.checked_div(risk)),
    })
}
