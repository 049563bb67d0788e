//! CSV loaders for journal exports and price snapshots.
//!
//! Transactions file columns (header required):
//! `id,instrument,side,quantity,price,executed_at,stop_loss,targets`
//! where `id`, `stop_loss` and `targets` may be empty or absent. `targets` is a
//! `;`-separated list of `price:<px>:<sell_ratio>` or `ratio:<r>:<sell_ratio>`
//! entries, sequenced in the order written.
//!
//! Prices file columns: `instrument,price`.

use crate::domain::{Decimal, Instrument, ProfitTarget, Side, Transaction};
use crate::engine::PriceMap;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Line {line}: invalid {field}: {reason}")]
    Field {
        line: u64,
        field: &'static str,
        reason: String,
    },
}

#[derive(Debug, Deserialize)]
struct TransactionRow {
    #[serde(default)]
    id: Option<String>,
    instrument: String,
    side: String,
    quantity: String,
    price: String,
    executed_at: String,
    #[serde(default)]
    stop_loss: Option<String>,
    #[serde(default)]
    targets: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    instrument: String,
    price: String,
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.trim().is_empty())
}

fn field_err(line: u64, field: &'static str, reason: impl Into<String>) -> FeedError {
    FeedError::Field {
        line,
        field,
        reason: reason.into(),
    }
}

/// 1-based line on which the record starts; quoted fields may span lines.
fn record_line(record: &csv::StringRecord) -> u64 {
    record.position().map_or(0, csv::Position::line)
}

fn parse_decimal(line: u64, field: &'static str, raw: &str) -> Result<Decimal, FeedError> {
    Decimal::from_str_canonical(raw).map_err(|e| field_err(line, field, e.to_string()))
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]` and `YYYY-MM-DDTHH:MM:SS`.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_targets(line: u64, raw: &str) -> Result<Vec<ProfitTarget>, FeedError> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(i, entry)| {
            let parts: Vec<&str> = entry.split(':').collect();
            let [kind, value, sell_ratio] = parts.as_slice() else {
                return Err(field_err(
                    line,
                    "targets",
                    format!("expected kind:value:sell_ratio, got '{}'", entry),
                ));
            };
            let value = parse_decimal(line, "targets", value)?;
            let sell_ratio = parse_decimal(line, "targets", sell_ratio)?;
            let sequence = i as u32 + 1;
            match kind.trim() {
                "price" => Ok(ProfitTarget::at_price(sequence, value, sell_ratio)),
                "ratio" => Ok(ProfitTarget::at_ratio(sequence, value, sell_ratio)),
                other => Err(field_err(
                    line,
                    "targets",
                    format!("unknown target kind '{}'", other),
                )),
            }
        })
        .collect()
}

/// Read transactions in file order. The engine does not sort them.
pub fn load_transactions<R: io::Read>(reader: R) -> Result<Vec<Transaction>, FeedError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut out = Vec::new();

    for result in csv_reader.records() {
        let record = result?;
        let line = record_line(&record);
        let row: TransactionRow = record.deserialize(Some(&headers))?;

        let id = non_empty(row.id)
            .map(|raw| {
                raw.parse::<i64>()
                    .map_err(|e| field_err(line, "id", e.to_string()))
            })
            .transpose()?;
        let side = row
            .side
            .parse::<Side>()
            .map_err(|e| field_err(line, "side", e))?;
        let quantity = parse_decimal(line, "quantity", &row.quantity)?;
        let price = parse_decimal(line, "price", &row.price)?;
        let executed_at = parse_timestamp(&row.executed_at).ok_or_else(|| {
            field_err(
                line,
                "executed_at",
                format!("unrecognised timestamp '{}'", row.executed_at),
            )
        })?;

        let mut txn = Transaction::new(
            id,
            Instrument::new(row.instrument),
            side,
            quantity,
            price,
            executed_at,
        );
        if let Some(stop) = non_empty(row.stop_loss) {
            txn = txn.with_stop_loss(parse_decimal(line, "stop_loss", &stop)?);
        }
        if let Some(targets) = non_empty(row.targets) {
            txn = txn.with_profit_targets(parse_targets(line, &targets)?);
        }
        out.push(txn);
    }

    tracing::debug!(count = out.len(), "transactions loaded");
    Ok(out)
}

pub fn load_transactions_path(path: impl AsRef<Path>) -> Result<Vec<Transaction>, FeedError> {
    let file = std::fs::File::open(path)?;
    load_transactions(io::BufReader::new(file))
}

/// Read a current-price snapshot. Later rows override earlier ones.
pub fn load_prices<R: io::Read>(reader: R) -> Result<PriceMap, FeedError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut prices = PriceMap::new();

    for result in csv_reader.records() {
        let record = result?;
        let line = record_line(&record);
        let row: PriceRow = record.deserialize(Some(&headers))?;
        let price = parse_decimal(line, "price", &row.price)?;
        prices.insert(Instrument::new(row.instrument), price);
    }
    Ok(prices)
}

pub fn load_prices_path(path: impl AsRef<Path>) -> Result<PriceMap, FeedError> {
    let file = std::fs::File::open(path)?;
    load_prices(io::BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TargetTrigger;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-01-15 09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-15T09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-15 09:30"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-01-15"),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("15/01/2024"), None);
    }

    #[test]
    fn test_load_transactions_with_optional_columns() {
        let data = "\
id,instrument,side,quantity,price,executed_at,stop_loss,targets
1,7203,buy,1000,10.00,2024-01-01,9.5,ratio:0.1:0.5;price:13:0.5
,7203,sell,500,12.00,2024-02-01 10:00:00,,
";
        let txns = load_transactions(data.as_bytes()).unwrap();
        assert_eq!(txns.len(), 2);

        assert_eq!(txns[0].txn_key, "txn:1");
        assert_eq!(txns[0].stop_loss, Some(d("9.5")));
        assert_eq!(txns[0].profit_targets.len(), 2);
        assert_eq!(
            txns[0].profit_targets[1].trigger,
            TargetTrigger::Price(d("13"))
        );
        assert_eq!(txns[0].profit_targets[1].sequence, 2);

        assert_eq!(txns[1].id, None);
        assert!(txns[1].txn_key.starts_with("hash:"));
        assert_eq!(txns[1].side, Side::Sell);
        assert!(txns[1].profit_targets.is_empty());
    }

    #[test]
    fn test_load_transactions_without_optional_columns() {
        let data = "instrument,side,quantity,price,executed_at\nAAPL,buy,3,190.5,2024-03-01\n";
        let txns = load_transactions(data.as_bytes()).unwrap();
        assert_eq!(txns[0].quantity, d("3"));
        assert_eq!(txns[0].stop_loss, None);
    }

    #[test]
    fn test_bad_field_reports_line() {
        let data = "instrument,side,quantity,price,executed_at\n\
AAPL,buy,3,190.5,2024-03-01\n\
AAPL,hold,3,190.5,2024-03-02\n";
        match load_transactions(data.as_bytes()) {
            Err(FeedError::Field { line, field, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(field, "side");
            }
            other => panic!("Expected Field error, got {:?}", other),
        }
    }

    #[test]
    fn test_line_numbers_follow_multiline_records() {
        let data = "instrument,side,quantity,price,executed_at,targets\n\
AAPL,buy,3,190.5,2024-03-01,\"price:200:0.5;\nprice:210:0.5\"\n\
AAPL,hold,3,190.5,2024-03-02,\n";
        match load_transactions(data.as_bytes()) {
            Err(FeedError::Field { line, field, .. }) => {
                assert_eq!(line, 4);
                assert_eq!(field, "side");
            }
            other => panic!("Expected Field error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_target_entry() {
        let data = "instrument,side,quantity,price,executed_at,targets\n\
AAPL,buy,3,190.5,2024-03-01,moon:1:1\n";
        assert!(matches!(
            load_transactions(data.as_bytes()),
            Err(FeedError::Field { field: "targets", .. })
        ));
    }

    #[test]
    fn test_load_prices() {
        let data = "instrument,price\n7203,11.00\nAAPL,190\n7203,11.5\n";
        let prices = load_prices(data.as_bytes()).unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[&Instrument::new("7203")], d("11.5"));
    }
}
