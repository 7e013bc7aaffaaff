//! Band re-entry detection and entry projections
//!
//! A signal fires on the single bar where price closes back inside the lower
//! Bollinger Band *and* RSI crosses up through the confirmation level. Both
//! crossings must happen on the same transition between the last two sampled
//! bars, so a bar that merely stays above the band never re-fires.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{AnnotatedCandle, Candle, IndicatorSample, Signal, Symbol, Tiers};

/// RSI level that must be crossed upward to confirm
pub const RSI_CONFIRM_LEVEL: f64 = 35.0;

/// Conservative entry sits this fraction of the lower band
pub const CONSERVATIVE_DISCOUNT: f64 = 0.995;

/// The bar on which a signal fired, with its indicator values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trigger {
    pub candle: Candle,
    pub sample: IndicatorSample,
}

/// `value` moved from below `prev_level` to at-or-above `curr_level`
fn crossed_up(prev_value: f64, prev_level: f64, curr_value: f64, curr_level: f64) -> bool {
    prev_value < prev_level && curr_value >= curr_level
}

/// Check the last two sampled bars for a band re-entry confirmed by RSI.
pub fn detect(annotated: &[AnnotatedCandle]) -> Option<Trigger> {
    let mut sampled = annotated
        .iter()
        .rev()
        .filter_map(|a| a.sample.map(|s| (a.candle, s)));

    let (curr_candle, curr) = sampled.next()?;
    let (prev_candle, prev) = sampled.next()?;

    let bb_reentry = crossed_up(prev_candle.close, prev.bb_low, curr_candle.close, curr.bb_low);
    let rsi_confirm = crossed_up(prev.rsi14, RSI_CONFIRM_LEVEL, curr.rsi14, RSI_CONFIRM_LEVEL);

    debug!(
        prev_close = prev_candle.close,
        prev_bb_low = prev.bb_low,
        curr_close = curr_candle.close,
        curr_bb_low = curr.bb_low,
        prev_rsi = prev.rsi14,
        curr_rsi = curr.rsi14,
        bb_reentry,
        rsi_confirm,
        "Evaluated crossover"
    );

    (bb_reentry && rsi_confirm).then_some(Trigger {
        candle: curr_candle,
        sample: curr,
    })
}

/// Percentage move from `entry` to `target`. Non-positive entries yield 0.
pub fn projection_pct(entry: f64, target: f64) -> f64 {
    if entry > 0.0 && entry.is_finite() {
        (target - entry) / entry * 100.0
    } else {
        0.0
    }
}

/// Build the tiered entries and their reversion projections to the 20-bar mean.
pub fn project(
    symbol: &Symbol,
    evaluated_at: DateTime<Utc>,
    curr: &Candle,
    sample: &IndicatorSample,
) -> Signal {
    let entries = Tiers {
        aggressive: curr.close,
        technical: sample.bb_low,
        conservative: sample.bb_low * CONSERVATIVE_DISCOUNT,
    };
    let target_price = sample.sma20;

    Signal {
        symbol: symbol.clone(),
        evaluated_at,
        price: curr.close,
        bb_low: sample.bb_low,
        sma20: sample.sma20,
        rsi: sample.rsi14,
        entries,
        projections: entries.map(|entry| projection_pct(entry, target_price)),
        target_price,
    }
}
