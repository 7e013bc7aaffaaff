//! Binance kline source
//!
//! No API key required for public market data endpoints.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::DataSourceAdapter;
use crate::error::{ScanError, ScanResult};
use crate::normalize::RawPayload;
use crate::Symbol;

/// Base URL for Binance API
const BINANCE_API_BASE: &str = "https://api.binance.com/api/v3";

/// Maximum klines per request (Binance limit)
const MAX_KLINES_PER_REQUEST: usize = 1000;

const INTERVAL: &str = "1h";

const QUOTE_ASSET: &str = "USDT";

/// Binance public kline client
#[derive(Debug, Clone)]
pub struct BinanceSource {
    client: Client,
    base_url: String,
}

impl BinanceSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(BinanceSource {
            client,
            base_url: BINANCE_API_BASE.to_string(),
        })
    }

    /// Accept only upper-case USDT pairs such as "BTCUSDT"
    pub fn to_binance_pair(symbol: &str) -> Option<String> {
        let base = symbol.strip_suffix(QUOTE_ASSET)?;
        let valid = !base.is_empty()
            && base
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());

        valid.then(|| symbol.to_string())
    }

    /// Fetch raw kline rows for `pair`
    async fn get_klines(&self, pair: &str, limit: usize) -> Result<Vec<Vec<serde_json::Value>>> {
        let url = format!("{}/klines", self.base_url);
        let params = [
            ("symbol", pair.to_string()),
            ("interval", INTERVAL.to_string()),
            ("limit", limit.to_string()),
        ];

        debug!(pair, limit, "Fetching Binance klines");

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .context("Failed to send request to Binance")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error {}: {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse Binance response")
    }
}

#[async_trait]
impl DataSourceAdapter for BinanceSource {
    fn name(&self) -> &'static str {
        "binance"
    }

    fn resolve(&self, symbol: &Symbol) -> ScanResult<String> {
        Self::to_binance_pair(symbol.as_str())
            .ok_or_else(|| ScanError::InvalidSymbol(symbol.to_string()))
    }

    async fn fetch_raw(&self, symbol: &Symbol, count: usize) -> ScanResult<RawPayload> {
        let pair = self.resolve(symbol)?;
        // One extra row covers the candle that is still forming
        let limit = (count + 1).min(MAX_KLINES_PER_REQUEST);

        let rows = self
            .get_klines(&pair, limit)
            .await
            .map_err(|e| ScanError::fetch(self.name(), format!("{:#}", e)))?;

        Ok(RawPayload::Klines(rows))
    }
}
