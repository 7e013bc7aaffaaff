//! Alert dispatch
//!
//! Dispatchers are fire-and-forget from the scanner's point of view: a failed
//! delivery is logged by the caller and never affects detection results.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::TelegramConfig;
use crate::Signal;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, signal: &Signal) -> Result<()>;
}

/// Human-readable alert body
pub fn format_alert(signal: &Signal) -> String {
    format!(
        "🟢 New signal!\n{}\nEntry: {:.4}\nRebound: {:+.1}%\nTarget: {:.4}",
        signal.symbol,
        signal.entries.technical,
        signal.projections.technical,
        signal.target_price
    )
}

/// Posts alerts to a Telegram chat through the Bot API
#[derive(Debug, Clone)]
pub struct TelegramDispatcher {
    client: Client,
    token: String,
    chat_id: String,
}

impl TelegramDispatcher {
    pub fn new(
        token: impl Into<String>,
        chat_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(TelegramDispatcher {
            client,
            token: token.into(),
            chat_id: chat_id.into(),
        })
    }
}

#[async_trait]
impl AlertDispatcher for TelegramDispatcher {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn notify(&self, signal: &Signal) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API_BASE, self.token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": format_alert(signal),
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to send Telegram message")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Telegram API error {}: {}", status, text);
        }

        debug!(symbol = %signal.symbol, "Telegram alert delivered");
        Ok(())
    }
}

/// Writes alerts to the log when no chat is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDispatcher;

#[async_trait]
impl AlertDispatcher for LogDispatcher {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, signal: &Signal) -> Result<()> {
        info!(
            symbol = %signal.symbol,
            entry = signal.entries.technical,
            projection_pct = signal.projections.technical,
            target = signal.target_price,
            "Signal alert"
        );
        Ok(())
    }
}

/// Telegram when credentials are present, log otherwise
pub fn build_dispatcher(
    config: &TelegramConfig,
    timeout: Duration,
) -> Result<Arc<dyn AlertDispatcher>> {
    let dispatcher: Arc<dyn AlertDispatcher> = match config.credentials() {
        Some((token, chat_id)) => Arc::new(TelegramDispatcher::new(token, chat_id, timeout)?),
        None => Arc::new(LogDispatcher),
    };
    Ok(dispatcher)
}
