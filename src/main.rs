use anyhow::Context;
use tradelens::feed::{load_prices_path, load_transactions_path};
use tradelens::{build_report, Config, PriceMap, ReportSettings};

fn main() {
    // Initialize tracing on stderr; stdout carries the report
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&config) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(config: &Config) -> anyhow::Result<()> {
    let transactions = load_transactions_path(&config.journal_csv)
        .with_context(|| format!("failed to load journal {}", config.journal_csv))?;

    let prices = match &config.prices_csv {
        Some(path) => {
            load_prices_path(path).with_context(|| format!("failed to load prices {}", path))?
        }
        None => PriceMap::new(),
    };

    tracing::info!(
        transactions = transactions.len(),
        prices = prices.len(),
        "journal loaded"
    );

    let report = build_report(&ReportSettings::from(config), &transactions, &prices)
        .context("failed to build report")?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
