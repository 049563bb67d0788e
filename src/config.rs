use crate::domain::{Decimal, MonthKey};
use crate::engine::ExpectationScenario;
use std::collections::HashMap;
use thiserror::Error;

const DEFAULT_SCENARIOS: &str = "0.3:0.15:20,0.3:0.05:10,0.4:-0.05:5";

#[derive(Debug, Clone)]
pub struct Config {
    pub journal_csv: String,
    pub prices_csv: Option<String>,
    pub trading_days_per_month: Decimal,
    pub starting_capital: Decimal,
    pub projection_months: u32,
    /// Defaults to the earliest buy month when unset.
    pub projection_start: Option<MonthKey>,
    pub scenarios: Vec<ExpectationScenario>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

fn positive_decimal(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<Decimal, ConfigError> {
    let raw = env_map.get(key).map(|s| s.as_str()).unwrap_or(default);
    Decimal::from_str_canonical(raw)
        .ok()
        .filter(Decimal::is_positive)
        .ok_or_else(|| {
            ConfigError::InvalidValue(key.to_string(), "must be a positive decimal".to_string())
        })
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let journal_csv = env_map
            .get("JOURNAL_CSV")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("JOURNAL_CSV".to_string()))?;

        let prices_csv = env_map
            .get("PRICES_CSV")
            .filter(|s| !s.trim().is_empty())
            .cloned();

        let trading_days_per_month = positive_decimal(&env_map, "TRADING_DAYS_PER_MONTH", "22")?;
        let starting_capital = positive_decimal(&env_map, "STARTING_CAPITAL", "10000000")?;

        let projection_months = env_map
            .get("PROJECTION_MONTHS")
            .map(|s| s.as_str())
            .unwrap_or("24")
            .parse::<u32>()
            .ok()
            .filter(|m| *m > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "PROJECTION_MONTHS".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        let projection_start = env_map
            .get("PROJECTION_START")
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                s.parse::<MonthKey>()
                    .map_err(|e| ConfigError::InvalidValue("PROJECTION_START".to_string(), e))
            })
            .transpose()?;

        let scenarios = parse_scenarios_from_map(&env_map)?;

        Ok(Config {
            journal_csv,
            prices_csv,
            trading_days_per_month,
            starting_capital,
            projection_months,
            projection_start,
            scenarios,
        })
    }
}

fn parse_scenarios_from_map(
    env_map: &HashMap<String, String>,
) -> Result<Vec<ExpectationScenario>, ConfigError> {
    if let Some(table) = env_map.get("EXPECTATION_SCENARIOS") {
        parse_scenario_rows(table.split(','), "EXPECTATION_SCENARIOS")
    } else if let Some(file_path) = env_map.get("EXPECTATION_SCENARIOS_FILE") {
        let content = std::fs::read_to_string(file_path).map_err(|_| {
            ConfigError::InvalidValue(
                "EXPECTATION_SCENARIOS_FILE".to_string(),
                "file not found or unreadable".to_string(),
            )
        })?;
        parse_scenario_rows(content.lines(), "EXPECTATION_SCENARIOS_FILE")
    } else {
        parse_scenario_rows(DEFAULT_SCENARIOS.split(','), "EXPECTATION_SCENARIOS")
    }
}

/// Rows are `probability:return_ratio:max_holding_days`; blank rows and
/// `#` comments are skipped. Table-level invariants are checked by the model.
fn parse_scenario_rows<'a, I>(rows: I, key: &str) -> Result<Vec<ExpectationScenario>, ConfigError>
where
    I: Iterator<Item = &'a str>,
{
    let invalid = |row: &str| {
        ConfigError::InvalidValue(
            key.to_string(),
            format!("expected probability:return:days, got '{}'", row),
        )
    };

    rows.map(str::trim)
        .filter(|row| !row.is_empty() && !row.starts_with('#'))
        .map(|row| {
            let fields: Vec<Decimal> = row
                .split(':')
                .map(Decimal::from_str_canonical)
                .collect::<Result<_, _>>()
                .map_err(|_| invalid(row))?;
            match fields.as_slice() {
                [p, r, days] => Ok(ExpectationScenario::new(*p, *r, *days)),
                _ => Err(invalid(row)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("JOURNAL_CSV".to_string(), "/tmp/journal.csv".to_string());
        map
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.journal_csv, "/tmp/journal.csv");
        assert_eq!(config.prices_csv, None);
        assert_eq!(config.trading_days_per_month, d("22"));
        assert_eq!(config.starting_capital, d("10000000"));
        assert_eq!(config.projection_months, 24);
        assert_eq!(config.projection_start, None);
        assert_eq!(config.scenarios.len(), 3);
        assert_eq!(config.scenarios[2].return_ratio, d("-0.05"));
    }

    #[test]
    fn test_missing_journal_csv() {
        let result = Config::from_env_map(HashMap::new());
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "JOURNAL_CSV"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_trading_days() {
        let mut env_map = setup_required_env();
        env_map.insert("TRADING_DAYS_PER_MONTH".to_string(), "0".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "TRADING_DAYS_PER_MONTH"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_projection_months() {
        let mut env_map = setup_required_env();
        env_map.insert("PROJECTION_MONTHS".to_string(), "-3".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PROJECTION_MONTHS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_projection_start() {
        let mut env_map = setup_required_env();
        env_map.insert("PROJECTION_START".to_string(), "2024-04".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.projection_start, MonthKey::new(2024, 4));

        let mut env_map = setup_required_env();
        env_map.insert("PROJECTION_START".to_string(), "April".to_string());
        assert!(Config::from_env_map(env_map).is_err());
    }

    #[test]
    fn test_inline_scenarios() {
        let mut env_map = setup_required_env();
        env_map.insert(
            "EXPECTATION_SCENARIOS".to_string(),
            "0.5:0.10:10, 0.5:-0.05:5".to_string(),
        );
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.scenarios.len(), 2);
        assert_eq!(config.scenarios[0].max_holding_days, d("10"));
    }

    #[test]
    fn test_malformed_scenario_row() {
        let mut env_map = setup_required_env();
        env_map.insert("EXPECTATION_SCENARIOS".to_string(), "0.5:0.10".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "EXPECTATION_SCENARIOS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_scenarios_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# p:r:days").unwrap();
        writeln!(file, "0.6:0.08:15").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "0.4:-0.04:6").unwrap();

        let mut env_map = setup_required_env();
        env_map.insert(
            "EXPECTATION_SCENARIOS_FILE".to_string(),
            file.path().to_string_lossy().to_string(),
        );
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.scenarios.len(), 2);
        assert_eq!(config.scenarios[1].probability, d("0.4"));
    }
}
