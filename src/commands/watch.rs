//! Watch command - run a scan every interval until Ctrl+C
//!
//! Each cycle is an independent batch with a deadline equal to the interval.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use reversion_scanner::present::{Presenter, TextPresenter};
use reversion_scanner::{Config, Scanner};

pub fn run(config_path: Option<String>, interval_override: Option<u64>) -> Result<()> {
    let mut config = Config::load(config_path.as_deref())?;
    if let Some(secs) = interval_override {
        config.scan.interval_secs = secs;
    }
    config.validate()?;

    if config.scan.interval_secs == 0 {
        anyhow::bail!("interval must be greater than zero");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run_async(config))
}

async fn run_async(config: Config) -> Result<()> {
    let scanner = Scanner::from_config(&config, true)?;
    let symbols = config.scan.symbols();
    let period = Duration::from_secs(config.scan.interval_secs);

    info!(
        symbols = ?config.scan.symbols,
        interval_secs = config.scan.interval_secs,
        "Starting watch loop"
    );

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut cycle: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                cycle += 1;
                info!("━━━ Scan cycle {} ━━━", cycle);

                let results = scanner.evaluate_batch(&symbols, Some(period)).await;
                match TextPresenter.render(&results) {
                    Ok(rendered) => println!("{}", rendered),
                    Err(e) => error!("Failed to render results: {:#}", e),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("Error setting up signal handler: {}", e);
                }
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    info!("Watch session ended after {} cycles", cycle);
    Ok(())
}
