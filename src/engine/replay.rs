//! Full replay of transaction feeds into lots and matches.
//!
//! Matches are derived state: any edit to the history means replaying the
//! instrument from its first transaction. There is no incremental patch path.

use super::ledger::LotLedger;
use super::matching::match_sell;
use super::valuation::{unrealized_by_buy_month, PriceMap};
use crate::domain::{
    Decimal, Instrument, Lot, LotId, Match, MonthKey, OrderingGuard, Side, Transaction,
};
use crate::error::EngineError;
use std::collections::BTreeMap;

/// Result of replaying one instrument's feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerReplay {
    pub instrument: Instrument,
    /// Open lots in FIFO order.
    pub open_lots: Vec<Lot>,
    pub matches: Vec<Match>,
    /// Buys accepted into the ledger.
    pub buys: Vec<Transaction>,
    /// Lot opened by each entry of `buys`, index-aligned.
    pub buy_lots: Vec<LotId>,
    /// Per-transaction rejections; the replay continued past each of them.
    pub errors: Vec<EngineError>,
}

impl LedgerReplay {
    pub fn bought_quantity(&self) -> Decimal {
        self.buys.iter().map(|b| b.quantity).sum()
    }

    pub fn matched_quantity(&self) -> Decimal {
        self.matches.iter().map(|m| m.quantity).sum()
    }

    pub fn open_quantity(&self) -> Decimal {
        self.open_lots.iter().map(|l| l.remaining_quantity).sum()
    }

    pub fn is_flat(&self) -> bool {
        self.open_lots.is_empty()
    }

    /// Accepted buys paired with the lot each one opened.
    pub fn buys_with_lots(&self) -> impl Iterator<Item = (&Transaction, LotId)> {
        self.buys.iter().zip(self.buy_lots.iter().copied())
    }
}

/// Replay one instrument's feed from scratch.
///
/// The feed must already be ascending by timestamp; the engine does not sort.
/// Invalid transactions (bad amounts, foreign instrument, out of order) are
/// collected into `errors` and skipped.
///
/// # Errors
/// `OverSell` aborts the whole replay: matches after an inconsistent sell
/// cannot be trusted.
pub fn compute_ledger_and_matches(
    instrument: &Instrument,
    transactions: &[Transaction],
) -> Result<LedgerReplay, EngineError> {
    let mut ledger = LotLedger::new(instrument.clone());
    let mut guard = OrderingGuard::new();
    let mut matches = Vec::new();
    let mut buys = Vec::new();
    let mut buy_lots = Vec::new();
    let mut errors = Vec::new();

    for txn in transactions {
        if let Err(err) = admit(instrument, &mut guard, txn) {
            tracing::warn!(instrument = %instrument, error = %err, "transaction rejected");
            errors.push(err);
            continue;
        }

        let applied = match txn.side {
            Side::Buy => ledger.enqueue(txn).map(|lot_id| {
                buys.push(txn.clone());
                buy_lots.push(lot_id);
            }),
            Side::Sell => match_sell(txn, &mut ledger).map(|m| matches.extend(m)),
        };
        match applied {
            Ok(()) => {}
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                tracing::warn!(instrument = %instrument, error = %err, "transaction rejected");
                errors.push(err);
            }
        }
    }

    let replay = LedgerReplay {
        instrument: instrument.clone(),
        open_lots: ledger.snapshot(),
        matches,
        buys,
        buy_lots,
        errors,
    };
    tracing::info!(
        instrument = %instrument,
        buys = replay.buys.len(),
        matches = replay.matches.len(),
        open_lots = replay.open_lots.len(),
        rejected = replay.errors.len(),
        "replay complete"
    );
    Ok(replay)
}

fn admit(
    instrument: &Instrument,
    guard: &mut OrderingGuard,
    txn: &Transaction,
) -> Result<(), EngineError> {
    if &txn.instrument != instrument {
        return Err(txn.invalid(format!(
            "instrument {} in the {} feed",
            txn.instrument, instrument
        )));
    }
    txn.check_amounts()?;
    guard.admit(txn)
}

/// Per-instrument replay outcomes of a mixed journal.
pub type JournalReplay = BTreeMap<Instrument, Result<LedgerReplay, EngineError>>;

/// Partition a mixed feed by instrument (keeping logged order) and replay
/// each independently. An `OverSell` poisons only its own instrument.
pub fn replay_journal(transactions: &[Transaction]) -> JournalReplay {
    let mut feeds: BTreeMap<&Instrument, Vec<Transaction>> = BTreeMap::new();
    for txn in transactions {
        feeds.entry(&txn.instrument).or_default().push(txn.clone());
    }

    feeds
        .into_iter()
        .map(|(instrument, feed)| {
            let outcome = compute_ledger_and_matches(instrument, &feed);
            (instrument.clone(), outcome)
        })
        .collect()
}

/// Unrealized profit of open lots across instruments, keyed by buy month.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenValuation {
    pub by_month: BTreeMap<MonthKey, Decimal>,
    /// Instruments with open lots but no supplied price; excluded from `by_month`.
    pub missing_prices: Vec<Instrument>,
}

/// Mark every replay's open lots to the supplied prices.
///
/// # Errors
/// `InvalidPrice` if a supplied price is not positive.
pub fn value_open_lots<'a, I>(replays: I, prices: &PriceMap) -> Result<OpenValuation, EngineError>
where
    I: IntoIterator<Item = &'a LedgerReplay>,
{
    let mut out = OpenValuation::default();
    for replay in replays {
        if replay.is_flat() {
            continue;
        }
        let Some(price) = prices.get(&replay.instrument) else {
            tracing::warn!(instrument = %replay.instrument, "no current price for open lots");
            out.missing_prices.push(replay.instrument.clone());
            continue;
        };
        for (month, profit) in unrealized_by_buy_month(&replay.open_lots, *price)? {
            *out.by_month.entry(month).or_default() += profit;
        }
    }
    Ok(out)
}

/// SHA-256 over the canonical rendering of a match list.
///
/// Identical transaction streams always produce identical fingerprints.
pub fn replay_fingerprint(matches: &[Match]) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    for m in matches {
        hasher.update(m.canonical_line());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
