//! Technical indicators
//!
//! Windowed computations over close prices. Every function returns one entry
//! per input value, `None` until its warm-up window is filled.
//!
//! Conventions:
//! - Standard deviation is the population form (divide by N), matching the
//!   usual Bollinger Band definition.
//! - RSI uses Wilder's smoothing, seeded with the simple mean of the first
//!   `period` gains and losses.

use tracing::trace;

use crate::{AnnotatedCandle, CandleSequence, IndicatorSample};

/// Bollinger Band window
pub const BB_PERIOD: usize = 20;

/// Band width in standard deviations
pub const BB_STD_DEV: f64 = 2.0;

/// RSI window
pub const RSI_PERIOD: usize = 14;

/// Middle band, its standard deviation and the lower band, per input value
#[derive(Debug, Clone, PartialEq)]
pub struct LowerBand {
    pub middle: Vec<Option<f64>>,
    pub std_dev: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// Calculate Simple Moving Average
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let mut result = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        if i + 1 < period {
            result.push(None);
        } else {
            let sum: f64 = values[i + 1 - period..=i].iter().sum();
            result.push(Some(sum / period as f64));
        }
    }

    result
}

/// Calculate rolling population standard deviation
pub fn rolling_std(values: &[f64], period: usize) -> Vec<Option<f64>> {
    std_around(values, period, &sma(values, period))
}

fn std_around(values: &[f64], period: usize, means: &[Option<f64>]) -> Vec<Option<f64>> {
    means
        .iter()
        .enumerate()
        .map(|(i, mean)| mean.map(|mid| window_std(&values[i + 1 - period..=i], mid)))
        .collect()
}

fn window_std(window: &[f64], mean: f64) -> f64 {
    let variance = window
        .iter()
        .map(|&x| {
            let diff = x - mean;
            diff * diff
        })
        .sum::<f64>()
        / window.len() as f64;
    variance.sqrt()
}

/// Calculate the middle and lower Bollinger Bands
pub fn bollinger_bands(values: &[f64], period: usize, num_std: f64) -> LowerBand {
    let middle = sma(values, period);
    let std_dev = std_around(values, period, &middle);

    let lower = middle
        .iter()
        .zip(&std_dev)
        .map(|(mid, sd)| match (mid, sd) {
            (Some(mid), Some(sd)) => Some(mid - num_std * sd),
            _ => None,
        })
        .collect();

    LowerBand {
        middle,
        std_dev,
        lower,
    }
}

/// Calculate RSI (Relative Strength Index) with Wilder's smoothing
///
/// The first value appears at index `period`, once `period` close-to-close
/// deltas exist. After that:
/// avg = (prev_avg * (period - 1) + current) / period
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];

    if period == 0 || values.len() <= period {
        return result;
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = values
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    // gains[k] is the delta ending at values[k + 1]
    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    result[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    let n = period as f64;
    for i in period + 1..values.len() {
        avg_gain = (avg_gain * (n - 1.0) + gains[i - 1]) / n;
        avg_loss = (avg_loss * (n - 1.0) + losses[i - 1]) / n;
        result[i] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    result
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}

/// Attach an [`IndicatorSample`] to every candle that has a full 20-bar band
/// and a 14-bar RSI.
pub fn annotate(candles: &CandleSequence) -> Vec<AnnotatedCandle> {
    let closes = candles.closes();
    let band = bollinger_bands(&closes, BB_PERIOD, BB_STD_DEV);
    let rsi_values = rsi(&closes, RSI_PERIOD);

    let annotated: Vec<AnnotatedCandle> = candles
        .candles()
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            let values = (band.middle[i], band.std_dev[i], band.lower[i], rsi_values[i]);
            let sample = match values {
                (Some(sma20), Some(stddev20), Some(bb_low), Some(rsi14)) => {
                    Some(IndicatorSample {
                        sma20,
                        stddev20,
                        bb_low,
                        rsi14,
                    })
                }
                _ => None,
            };
            AnnotatedCandle {
                candle: *candle,
                sample,
            }
        })
        .collect();

    trace!(
        candles = annotated.len(),
        samples = annotated.iter().filter(|a| a.sample.is_some()).count(),
        "Annotated candles"
    );

    annotated
}
