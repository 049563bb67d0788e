use chrono::{NaiveDate, NaiveDateTime};
use tradelens::engine::{aggregate_monthly, replay_journal, total_realized};
use tradelens::{Decimal, Instrument, Match, MonthKey, MonthRange, Side, Transaction};

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn at(m: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, m, day)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap()
}

fn mk(m: u32) -> MonthKey {
    MonthKey::new(2024, m).unwrap()
}

fn txn(id: i64, inst: &str, side: Side, qty: &str, px: &str, when: NaiveDateTime) -> Transaction {
    Transaction::new(Some(id), Instrument::new(inst), side, d(qty), d(px), when)
}

fn journal() -> Vec<Transaction> {
    vec![
        txn(1, "7203", Side::Buy, "1000", "10", at(1, 10)),
        txn(2, "6758", Side::Buy, "50", "200", at(1, 20)),
        txn(3, "7203", Side::Sell, "400", "11", at(3, 5)),
        txn(4, "6758", Side::Sell, "50", "190", at(3, 6)),
        txn(5, "9984", Side::Buy, "10", "80", at(4, 1)),
        txn(6, "7203", Side::Sell, "600", "12", at(6, 28)),
    ]
}

fn replayed() -> (Vec<Match>, Vec<Transaction>) {
    let mut matches = Vec::new();
    let mut buys = Vec::new();
    for (_, outcome) in replay_journal(&journal()) {
        let replay = outcome.unwrap();
        matches.extend(replay.matches);
        buys.extend(replay.buys);
    }
    (matches, buys)
}

#[test]
fn test_profit_rolls_up_to_buy_month() {
    let (matches, buys) = replayed();
    let aggregate = aggregate_monthly(&matches, &buys, MonthRange::new(mk(1), mk(6)));

    // 7203: 400*(11-10) + 600*(12-10); 6758: 50*(190-200)
    assert_eq!(aggregate[&mk(1)].realized_profit, d("1100"));
    assert_eq!(aggregate[&mk(1)].buy_cost, d("20000"));
    assert_eq!(aggregate[&mk(1)].instruments_bought, 2);
    assert_eq!(aggregate[&mk(3)].realized_profit, d("0"));
    assert_eq!(aggregate[&mk(6)].realized_profit, d("0"));
}

#[test]
fn test_attribution_totals_match_all_matches() {
    let (matches, buys) = replayed();
    let aggregate = aggregate_monthly(&matches, &buys, MonthRange::new(mk(1), mk(6)));

    let from_matches: Decimal = matches.iter().map(Match::realized_profit).sum();
    assert_eq!(total_realized(&aggregate), from_matches);
}

#[test]
fn test_rate_is_zero_with_buys_and_null_without() {
    let (matches, buys) = replayed();
    let aggregate = aggregate_monthly(&matches, &buys, MonthRange::new(mk(1), mk(6)));

    // April bought but nothing realized yet.
    assert_eq!(aggregate[&mk(4)].realized_rate, Some(Decimal::zero()));
    // February had no buys at all.
    assert_eq!(aggregate[&mk(2)].buy_count, 0);
    assert_eq!(aggregate[&mk(2)].realized_rate, None);
    assert_eq!(aggregate[&mk(1)].realized_rate, Some(d("0.055")));
}
