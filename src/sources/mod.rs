//! Market data sources
//!
//! Every source implements [`DataSourceAdapter`]: it resolves a symbol to its
//! own identifier and fetches a [`RawPayload`]. Normalization, indicators and
//! detection are shared and never duplicated per source.
//!
//! - **Binance**: exchange klines, true OHLCV (no API key)
//! - **CoinGecko**: hourly point prices, approximate OHLC
//! - **CSV**: key-value rows from local files

mod binance;
mod coingecko;
mod csv_file;

pub use binance::BinanceSource;
pub use coingecko::CoinGeckoSource;
pub use csv_file::CsvSource;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SourcesConfig;
use crate::error::ScanResult;
use crate::normalize::{normalize, RawPayload};
use crate::{CandleSequence, Symbol};

/// Data source enum for selecting a venue in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Binance,
    CoinGecko,
    Csv,
}

impl std::str::FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "binance" => Ok(DataSource::Binance),
            "coingecko" => Ok(DataSource::CoinGecko),
            "csv" => Ok(DataSource::Csv),
            _ => Err(format!(
                "Unknown data source: {}. Use 'binance', 'coingecko' or 'csv'",
                s
            )),
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Binance => write!(f, "binance"),
            DataSource::CoinGecko => write!(f, "coingecko"),
            DataSource::Csv => write!(f, "csv"),
        }
    }
}

/// Supplier of closed hourly candle history for a symbol
#[async_trait]
pub trait DataSourceAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Source-specific identifier for `symbol`, or `InvalidSymbol`
    fn resolve(&self, symbol: &Symbol) -> ScanResult<String>;

    /// Fetch the raw payload holding at least `count` hourly candles when available
    async fn fetch_raw(&self, symbol: &Symbol, count: usize) -> ScanResult<RawPayload>;

    /// Fetch and normalize the most recent `count` closed candles
    async fn fetch(
        &self,
        symbol: &Symbol,
        count: usize,
        evaluated_at: DateTime<Utc>,
    ) -> ScanResult<CandleSequence> {
        let payload = self.fetch_raw(symbol, count).await?;
        normalize(&payload, count, evaluated_at)
    }
}

/// Build the enabled sources in configured order
pub fn build_sources(config: &SourcesConfig) -> Result<Vec<Arc<dyn DataSourceAdapter>>> {
    let timeout = Duration::from_secs(config.timeout_secs);

    config
        .enabled
        .iter()
        .map(|source| {
            let adapter: Arc<dyn DataSourceAdapter> = match source {
                DataSource::Binance => Arc::new(BinanceSource::new(timeout)?),
                DataSource::CoinGecko => {
                    Arc::new(CoinGeckoSource::new(timeout, config.coingecko_ids.clone())?)
                }
                DataSource::Csv => Arc::new(CsvSource::new(&config.data_dir)),
            };
            Ok(adapter)
        })
        .collect()
}
