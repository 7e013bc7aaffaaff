//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files with environment
//! variable support for alert credentials. The binary builds a [`Config`] once
//! at start-up and passes it down; nothing below reads the environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::indicators::BB_PERIOD;
use crate::sources::DataSource;
use crate::Symbol;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(contents).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` (or defaults) and apply Telegram credentials from the environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p).context(format!("Failed to load config from {}", p))?,
            None => Config::default(),
        };

        config.telegram.apply_overrides(
            std::env::var("TELEGRAM_TOKEN").ok(),
            std::env::var("TELEGRAM_CHAT_ID").ok(),
        );

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan.symbols.is_empty() {
            anyhow::bail!("scan.symbols must list at least one symbol");
        }
        if self.scan.candle_count < 2 {
            anyhow::bail!("scan.candle_count must be at least 2");
        }
        if self.scan.candle_count <= BB_PERIOD {
            warn!(
                candle_count = self.scan.candle_count,
                "candle_count leaves no room for two sampled bars; no signal can fire"
            );
        }
        if self.sources.enabled.is_empty() {
            anyhow::bail!("sources.enabled must list at least one data source");
        }
        if self.sources.timeout_secs == 0 {
            anyhow::bail!("sources.timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

/// What to scan and how much history to request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    #[serde(default = "default_candle_count")]
    pub candle_count: usize,
    /// Seconds between cycles in `watch` mode
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_symbols() -> Vec<String> {
    vec![
        "BTCUSDT".to_string(),
        "ETHUSDT".to_string(),
        "SOLUSDT".to_string(),
        "RENDERUSDT".to_string(),
    ]
}

fn default_candle_count() -> usize {
    50
}

fn default_interval_secs() -> u64 {
    3600
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            symbols: default_symbols(),
            candle_count: default_candle_count(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl ScanConfig {
    pub fn symbols(&self) -> Vec<Symbol> {
        self.symbols.iter().map(Symbol::new).collect()
    }
}

/// Market data sources, tried in order for each symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_enabled_sources")]
    pub enabled: Vec<DataSource>,
    /// Symbol to CoinGecko coin id
    #[serde(default = "default_coingecko_ids")]
    pub coingecko_ids: HashMap<String, String>,
    /// Directory holding `{SYMBOL}_1h.csv` files for the csv source
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_enabled_sources() -> Vec<DataSource> {
    vec![DataSource::CoinGecko, DataSource::Binance]
}

fn default_coingecko_ids() -> HashMap<String, String> {
    [
        ("BTCUSDT", "bitcoin"),
        ("ETHUSDT", "ethereum"),
        ("SOLUSDT", "solana"),
        ("RENDERUSDT", "render-token"),
    ]
    .into_iter()
    .map(|(symbol, id)| (symbol.to_string(), id.to_string()))
    .collect()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl SourcesConfig {
    /// Per-symbol deadline for a one-off scan: three request timeouts
    pub fn batch_deadline(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.saturating_mul(3))
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        SourcesConfig {
            enabled: default_enabled_sources(),
            coingecko_ids: default_coingecko_ids(),
            data_dir: default_data_dir(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Telegram alert credentials (optional)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

impl TelegramConfig {
    /// Non-empty values replace the file settings
    pub fn apply_overrides(&mut self, token: Option<String>, chat_id: Option<String>) {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.token = Some(token);
        }
        if let Some(chat_id) = chat_id.filter(|c| !c.trim().is_empty()) {
            self.chat_id = Some(chat_id);
        }
    }

    /// Both token and chat id, if configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.token.as_deref(), self.chat_id.as_deref()) {
            (Some(token), Some(chat_id)) if !token.is_empty() && !chat_id.is_empty() => {
                Some((token, chat_id))
            }
            _ => None,
        }
    }
}
