//! CoinGecko market-chart source
//!
//! Returns hourly point prices and volumes, not OHLC. The normalizer derives
//! approximate candles from consecutive points.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::DataSourceAdapter;
use crate::error::{ScanError, ScanResult};
use crate::normalize::{PointSeries, RawPayload};
use crate::Symbol;

const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";

const VS_CURRENCY: &str = "usd";

#[derive(Debug, Clone)]
pub struct CoinGeckoSource {
    client: Client,
    base_url: String,
    /// Symbol to coin id, e.g. "BTCUSDT" -> "bitcoin"
    ids: HashMap<String, String>,
}

impl CoinGeckoSource {
    pub fn new(timeout: Duration, ids: HashMap<String, String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(CoinGeckoSource {
            client,
            base_url: COINGECKO_API_BASE.to_string(),
            ids,
        })
    }

    /// Days of history covering `count` hourly candles plus slack
    pub fn days_for(count: usize) -> usize {
        count / 24 + 2
    }

    async fn get_market_chart(&self, coin_id: &str, days: usize) -> Result<PointSeries> {
        let url = format!("{}/coins/{}/market_chart", self.base_url, coin_id);
        let params = [
            ("vs_currency", VS_CURRENCY.to_string()),
            ("days", days.to_string()),
            ("interval", "hourly".to_string()),
        ];

        debug!(coin_id, days, "Fetching CoinGecko market chart");

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .context("Failed to send request to CoinGecko")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("CoinGecko API error {}: {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse CoinGecko response")
    }
}

#[async_trait]
impl DataSourceAdapter for CoinGeckoSource {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    fn resolve(&self, symbol: &Symbol) -> ScanResult<String> {
        self.ids
            .get(&symbol.as_str().to_uppercase())
            .cloned()
            .ok_or_else(|| ScanError::InvalidSymbol(symbol.to_string()))
    }

    async fn fetch_raw(&self, symbol: &Symbol, count: usize) -> ScanResult<RawPayload> {
        let coin_id = self.resolve(symbol)?;

        let series = self
            .get_market_chart(&coin_id, Self::days_for(count))
            .await
            .map_err(|e| ScanError::fetch(self.name(), format!("{:#}", e)))?;

        Ok(RawPayload::PointSeries(series))
    }
}
