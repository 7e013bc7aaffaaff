//! Candle normalization
//!
//! Turns source-specific payloads into a [`CandleSequence`] of fully closed,
//! hourly, strictly ascending candles. Three raw shapes are accepted:
//!
//! - Exchange kline rows: `[open_time, "open", "high", "low", "close", "volume", close_time, ...]`
//! - Point-price series: `prices` / `total_volumes` as `[timestamp_ms, value]` pairs
//! - Key-value rows with named OHLCV fields
//!
//! Point series carry no intrabar range. A candle is derived from each pair of
//! consecutive points: open and close are the two prices, high and low are
//! their max and min. That range is an approximation and understates the true
//! intrabar high/low.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{ScanError, ScanResult};
use crate::{Candle, CandleSequence};

/// Nominal candle length
pub const HOUR_MS: i64 = 3_600_000;

/// Allowed deviation from [`HOUR_MS`] to absorb source jitter
pub const SPACING_TOLERANCE_MS: i64 = 300_000;

/// Minimum number of fields in an exchange kline row
const KLINE_MIN_FIELDS: usize = 7;

/// Raw market-data payload as delivered by a source
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    Klines(Vec<Vec<serde_json::Value>>),
    PointSeries(PointSeries),
    Rows(Vec<CandleRow>),
}

/// Aggregated point-price series (e.g. a market-chart endpoint)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointSeries {
    pub prices: Vec<[f64; 2]>,
    #[serde(default)]
    pub total_volumes: Vec<[f64; 2]>,
}

/// Key-value candle record. `close_time` defaults to one hour after `open_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleRow {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub close_time: Option<i64>,
}

/// Normalize a raw payload into the most recent `desired_count` closed candles.
///
/// Malformed records fail the whole payload with `InvalidSource`. Records that
/// parse but break a candle invariant (bad OHLC, wrong duration, not yet
/// closed, duplicate or overlapping timestamp) are dropped one by one.
pub fn normalize(
    payload: &RawPayload,
    desired_count: usize,
    evaluated_at: DateTime<Utc>,
) -> ScanResult<CandleSequence> {
    let mut candidates = match payload {
        RawPayload::Klines(rows) => from_klines(rows)?,
        RawPayload::PointSeries(series) => from_point_series(series)?,
        RawPayload::Rows(rows) => from_rows(rows)?,
    };

    let parsed = candidates.len();
    candidates.sort_by_key(|c| c.open_time);

    let now_ms = evaluated_at.timestamp_millis();
    let mut accepted: Vec<Candle> = Vec::with_capacity(candidates.len());

    for candle in candidates {
        if let Err(e) = candle.validate() {
            trace!(open_time = candle.open_time, error = %e, "Dropping invalid candle");
            continue;
        }

        if !is_hourly(&candle) {
            trace!(
                open_time = candle.open_time,
                close_time = candle.close_time,
                "Dropping candle with non-hourly duration"
            );
            continue;
        }

        // Only fully closed candles
        if candle.close_time >= now_ms {
            trace!(open_time = candle.open_time, "Dropping still-forming candle");
            continue;
        }

        if let Some(prev) = accepted.last() {
            // Sorted input: an unrepresentable gap is a large one
            let too_close = candle
                .open_time
                .checked_sub(prev.open_time)
                .is_some_and(|gap| gap < HOUR_MS - SPACING_TOLERANCE_MS);
            if too_close {
                trace!(
                    open_time = candle.open_time,
                    prev_open_time = prev.open_time,
                    "Dropping duplicate or overlapping candle"
                );
                continue;
            }
        }

        accepted.push(candle);
    }

    if accepted.len() > desired_count {
        accepted.drain(..accepted.len() - desired_count);
    }

    debug!(
        parsed,
        accepted = accepted.len(),
        desired_count,
        "Normalized candle payload"
    );

    if accepted.len() < CandleSequence::MIN_LEN {
        return Err(ScanError::InsufficientData {
            available: accepted.len(),
            required: CandleSequence::MIN_LEN,
        });
    }

    CandleSequence::new(accepted)
}

/// Close time follows the `open + 3_599_999` convention, within tolerance
fn is_hourly(candle: &Candle) -> bool {
    candle
        .duration_ms()
        .is_some_and(|d| (d - (HOUR_MS - 1)).abs() <= SPACING_TOLERANCE_MS)
}

fn from_klines(rows: &[Vec<serde_json::Value>]) -> ScanResult<Vec<Candle>> {
    rows.iter()
        .enumerate()
        .map(|(idx, row)| {
            parse_kline(row)
                .ok_or_else(|| ScanError::InvalidSource(format!("malformed kline row {}", idx)))
        })
        .collect()
}

/// Parse one exchange kline row. Prices may be encoded as strings or numbers.
fn parse_kline(row: &[serde_json::Value]) -> Option<Candle> {
    if row.len() < KLINE_MIN_FIELDS {
        return None;
    }

    let candle = Candle {
        open_time: row[0].as_i64()?,
        open: json_f64(&row[1])?,
        high: json_f64(&row[2])?,
        low: json_f64(&row[3])?,
        close: json_f64(&row[4])?,
        volume: json_f64(&row[5])?,
        close_time: row[6].as_i64()?,
    };

    Some(candle)
}

fn json_f64(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::String(s) => s.parse::<f64>().ok()?,
        other => other.as_f64()?,
    };
    parsed.is_finite().then_some(parsed)
}

fn from_point_series(series: &PointSeries) -> ScanResult<Vec<Candle>> {
    for (idx, [ts, price]) in series.prices.iter().enumerate() {
        if !ts.is_finite() || !price.is_finite() {
            return Err(ScanError::InvalidSource(format!(
                "non-finite price point {}",
                idx
            )));
        }
    }

    let candles = series
        .prices
        .windows(2)
        .enumerate()
        .map(|(i, pair)| {
            let [open_ts, open] = pair[0];
            let [close_ts, close] = pair[1];
            // Volume point aligned with the closing price, 0 when the source has none
            let volume = series
                .total_volumes
                .get(i + 1)
                .map(|[_, v]| *v)
                .filter(|v| v.is_finite())
                .unwrap_or(0.0);

            Candle {
                open_time: open_ts as i64,
                close_time: close_ts as i64,
                open,
                high: open.max(close),
                low: open.min(close),
                close,
                volume,
            }
        })
        .collect();

    Ok(candles)
}

fn from_rows(rows: &[CandleRow]) -> ScanResult<Vec<Candle>> {
    rows.iter()
        .enumerate()
        .map(|(idx, row)| {
            let close_time = match row.close_time {
                Some(close_time) => close_time,
                None => row.open_time.checked_add(HOUR_MS - 1).ok_or_else(|| {
                    ScanError::InvalidSource(format!("open_time out of range in row {}", idx))
                })?,
            };

            Ok(Candle {
                open_time: row.open_time,
                close_time,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume.unwrap_or(0.0),
            })
        })
        .collect()
}
