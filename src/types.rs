//! Core data types shared by the normalizer, indicator engine and detector

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ScanError;

/// Validation errors for a single candle
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandleValidationError {
    #[error("close_time ({close_time}) must be after open_time ({open_time})")]
    NonIncreasingTime { open_time: i64, close_time: i64 },

    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("volume ({0}) must be >= 0")]
    NegativeVolume(f64),

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange { open: f64, low: f64, high: f64 },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange { close: f64, low: f64, high: f64 },

    #[error("prices must be positive and finite: open={open}, high={high}, low={low}, close={close}")]
    NonPositivePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

/// Hourly OHLCV candle. Timestamps are epoch milliseconds UTC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Create a new candle with validation
    pub fn new(
        open_time: i64,
        close_time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, CandleValidationError> {
        let candle = Self {
            open_time,
            close_time,
            open,
            high,
            low,
            close,
            volume,
        };
        candle.validate()?;
        Ok(candle)
    }

    /// Validate the candle data
    pub fn validate(&self) -> Result<(), CandleValidationError> {
        if self.close_time <= self.open_time {
            return Err(CandleValidationError::NonIncreasingTime {
                open_time: self.open_time,
                close_time: self.close_time,
            });
        }

        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(CandleValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(CandleValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.volume.is_nan() || self.volume < 0.0 {
            return Err(CandleValidationError::NegativeVolume(self.volume));
        }

        if self.open < self.low || self.open > self.high {
            return Err(CandleValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if self.close < self.low || self.close > self.high {
            return Err(CandleValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        Ok(())
    }

    /// `None` when the timestamps are too far apart to represent
    pub fn duration_ms(&self) -> Option<i64> {
        self.close_time.checked_sub(self.open_time)
    }
}

/// Validated candle history: at least two candles, strictly ascending by open time.
///
/// Only [`crate::normalize::normalize`] and [`CandleSequence::new`] construct it,
/// so every holder can rely on the ordering invariant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CandleSequence(Vec<Candle>);

impl CandleSequence {
    pub const MIN_LEN: usize = 2;

    pub fn new(candles: Vec<Candle>) -> Result<Self, ScanError> {
        if candles.len() < Self::MIN_LEN {
            return Err(ScanError::InsufficientData {
                available: candles.len(),
                required: Self::MIN_LEN,
            });
        }

        for pair in candles.windows(2) {
            if pair[1].open_time <= pair[0].open_time {
                return Err(ScanError::InvalidSource(format!(
                    "candles not strictly ascending: {} then {}",
                    pair[0].open_time, pair[1].open_time
                )));
            }
        }

        Ok(Self(candles))
    }

    pub fn candles(&self) -> &[Candle] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.0.iter().map(|c| c.close).collect()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.0.last()
    }
}

/// Trading pair symbol using Arc<str> for cheap cloning
///
/// Symbols are cloned into every spawned evaluation task and every result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(#[serde(with = "arc_str_serde")] std::sync::Arc<str>);

/// Custom serde for Arc<str>
mod arc_str_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s.as_str()))
    }
}

impl Symbol {
    pub fn new(s: impl AsRef<str>) -> Self {
        Symbol(std::sync::Arc::from(s.as_ref().trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Indicator values for one candle once both warm-up windows are filled
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSample {
    pub sma20: f64,
    pub stddev20: f64,
    pub bb_low: f64,
    pub rsi14: f64,
}

/// A candle paired with its indicator sample (absent during warm-up)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnnotatedCandle {
    pub candle: Candle,
    pub sample: Option<IndicatorSample>,
}

/// One value per entry tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tiers {
    pub aggressive: f64,
    pub technical: f64,
    pub conservative: f64,
}

impl Tiers {
    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Tiers {
            aggressive: f(self.aggressive),
            technical: f(self.technical),
            conservative: f(self.conservative),
        }
    }
}

/// A fired mean-reversion signal with tiered entries.
///
/// `projections` are percentages from each entry to `target_price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: Symbol,
    pub evaluated_at: DateTime<Utc>,
    pub price: f64,
    pub bb_low: f64,
    pub sma20: f64,
    pub rsi: f64,
    pub entries: Tiers,
    pub projections: Tiers,
    pub target_price: f64,
}

/// Per-symbol outcome of one evaluation cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    NoData { reason: String },
    NoSignal,
    Signal(Signal),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub symbol: Symbol,
    pub outcome: Outcome,
}

impl EvaluationResult {
    pub fn no_data(symbol: Symbol, err: &ScanError) -> Self {
        EvaluationResult {
            symbol,
            outcome: Outcome::NoData {
                reason: err.to_string(),
            },
        }
    }

    pub fn signal(&self) -> Option<&Signal> {
        match &self.outcome {
            Outcome::Signal(signal) => Some(signal),
            _ => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self.outcome, Outcome::NoData { .. })
    }
}
