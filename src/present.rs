//! Rendering of evaluation results
//!
//! The scanner only produces typed [`EvaluationResult`]s; all formatting lives here.

use anyhow::{Context, Result};

use crate::{EvaluationResult, Outcome, Signal};

pub trait Presenter {
    fn render(&self, results: &[EvaluationResult]) -> Result<String>;
}

/// Output format selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use 'text' or 'json'", s)),
        }
    }
}

impl OutputFormat {
    pub fn presenter(self) -> Box<dyn Presenter> {
        match self {
            OutputFormat::Text => Box::new(TextPresenter),
            OutputFormat::Json => Box::new(JsonPresenter { pretty: true }),
        }
    }
}

/// Plain-text report, one section per symbol
#[derive(Debug, Clone, Copy, Default)]
pub struct TextPresenter;

impl TextPresenter {
    fn render_signal(out: &mut String, signal: &Signal) {
        let e = &signal.entries;
        let p = &signal.projections;
        out.push_str(&format!("🟢 {}\n", signal.symbol));
        out.push_str(&format!(
            "   Price: {:.4} | RSI: {:.1} | BB low: {:.4}\n",
            signal.price, signal.rsi, signal.bb_low
        ));
        out.push_str(&format!(
            "   • Aggressive:   {:.4} → {:+.1}%\n",
            e.aggressive, p.aggressive
        ));
        out.push_str(&format!(
            "   • Technical:    {:.4} → {:+.1}%\n",
            e.technical, p.technical
        ));
        out.push_str(&format!(
            "   • Conservative: {:.4} → {:+.1}%\n",
            e.conservative, p.conservative
        ));
        out.push_str(&format!("   🎯 Target: {:.4}\n", signal.target_price));
    }
}

impl Presenter for TextPresenter {
    fn render(&self, results: &[EvaluationResult]) -> Result<String> {
        let mut out = String::new();
        out.push_str("Mean Reversion Scanner\n");
        out.push_str(&format!("{}\n", "=".repeat(40)));

        for result in results {
            match &result.outcome {
                Outcome::Signal(signal) => Self::render_signal(&mut out, signal),
                Outcome::NoSignal => out.push_str(&format!("❌ {}: no signal\n", result.symbol)),
                Outcome::NoData { reason } => {
                    out.push_str(&format!("⚠️  {}: no data ({})\n", result.symbol, reason))
                }
            }
        }

        Ok(out)
    }
}

/// JSON array of results
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPresenter {
    pub pretty: bool,
}

impl Presenter for JsonPresenter {
    fn render(&self, results: &[EvaluationResult]) -> Result<String> {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(results)
        } else {
            serde_json::to_string(results)
        };
        rendered.context("Failed to serialize results")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Symbol, Tiers};
    use chrono::Utc;

    fn results() -> Vec<EvaluationResult> {
        let signal = Signal {
            symbol: Symbol::new("BTCUSDT"),
            evaluated_at: Utc::now(),
            price: 101.0,
            bb_low: 100.0,
            sma20: 100.0,
            rsi: 36.0,
            entries: Tiers {
                aggressive: 101.0,
                technical: 100.0,
                conservative: 99.5,
            },
            projections: Tiers {
                aggressive: -0.99,
                technical: 0.0,
                conservative: 0.5025,
            },
            target_price: 100.0,
        };
        vec![
            EvaluationResult {
                symbol: Symbol::new("BTCUSDT"),
                outcome: Outcome::Signal(signal),
            },
            EvaluationResult {
                symbol: Symbol::new("ETHUSDT"),
                outcome: Outcome::NoSignal,
            },
            EvaluationResult {
                symbol: Symbol::new("DOGEUSDT"),
                outcome: Outcome::NoData {
                    reason: "symbol DOGEUSDT is not served by any configured source".to_string(),
                },
            },
        ]
    }

    #[test]
    fn test_text_report() {
        let text = TextPresenter.render(&results()).unwrap();
        assert!(text.contains("🟢 BTCUSDT"));
        assert!(text.contains("Conservative: 99.5000 → +0.5%"));
        assert!(text.contains("❌ ETHUSDT: no signal"));
        assert!(text.contains("DOGEUSDT: no data"));
    }

    #[test]
    fn test_json_report() {
        let json = JsonPresenter { pretty: false }.render(&results()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value[0]["symbol"], "BTCUSDT");
        assert_eq!(value[0]["outcome"]["status"], "signal");
        assert_eq!(value[0]["outcome"]["entries"]["technical"], 100.0);
        assert_eq!(value[1]["outcome"]["status"], "no_signal");
        assert_eq!(value[2]["outcome"]["status"], "no_data");
        assert!(value[2]["outcome"]["reason"]
            .as_str()
            .unwrap()
            .contains("DOGEUSDT"));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert!("html".parse::<OutputFormat>().is_err());
    }
}
