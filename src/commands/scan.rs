//! Scan command - evaluate every symbol once and print the results

use anyhow::{Context, Result};
use tracing::info;

use reversion_scanner::present::{OutputFormat, Presenter};
use reversion_scanner::{Config, Scanner, Symbol};

pub fn run(
    config_path: Option<String>,
    symbols_override: Option<String>,
    format: OutputFormat,
    alerts: bool,
) -> Result<()> {
    let mut config = Config::load(config_path.as_deref())?;

    if let Some(symbols) = symbols_override {
        config.scan.symbols = symbols
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        info!("Overriding symbols to: {:?}", config.scan.symbols);
    }
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let scanner = Scanner::from_config(&config, alerts)?;
    let symbols: Vec<Symbol> = config.scan.symbols();
    let deadline = config.sources.batch_deadline();

    info!(
        symbols = ?config.scan.symbols,
        candle_count = config.scan.candle_count,
        "Starting scan"
    );

    let results = runtime.block_on(scanner.evaluate_batch(&symbols, Some(deadline)));

    let rendered = format.presenter().render(&results)?;
    println!("{}", rendered);

    Ok(())
}
