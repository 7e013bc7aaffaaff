//! Integration tests for the reversion scanner
//!
//! These tests run the full fetch → normalize → annotate → detect → project
//! chain through mock sources and dispatchers.

use approx::assert_relative_eq;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reversion_scanner::error::ScanResult;
use reversion_scanner::indicators::annotate;
use reversion_scanner::normalize::{normalize, CandleRow, RawPayload, HOUR_MS};
use reversion_scanner::notify::AlertDispatcher;
use reversion_scanner::scanner::{evaluate, evaluate_prefetched};
use reversion_scanner::signal::{detect, CONSERVATIVE_DISCOUNT};
use reversion_scanner::sources::{CsvSource, DataSourceAdapter};
use reversion_scanner::{Outcome, ScanError, Scanner, Signal, Symbol};

// =============================================================================
// Test Utilities
// =============================================================================

/// 30 bars oscillating ±0.2 around 100, a five-bar slide below the lower band,
/// then a rebound. The band re-entry with RSI cross happens at index 35.
fn reentry_closes() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..30)
        .map(|i| if i % 2 == 0 { 100.2 } else { 99.8 })
        .collect();
    closes.extend([99.0, 98.0, 97.0, 96.0, 94.0, 97.5, 98.0, 98.5]);
    closes
}

const REENTRY_INDEX: usize = 35;

/// Hour-aligned start so that `count` candles are all closed by now
fn start_time(count: usize) -> i64 {
    let now = Utc::now().timestamp_millis();
    (now / HOUR_MS - count as i64 - 2) * HOUR_MS
}

fn rows(closes: &[f64]) -> RawPayload {
    let t0 = start_time(closes.len());
    RawPayload::Rows(
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| CandleRow {
                open_time: t0 + i as i64 * HOUR_MS,
                open: close,
                high: close,
                low: close,
                close,
                volume: Some(1_000.0),
                close_time: None,
            })
            .collect(),
    )
}

/// Source serving canned payloads, optionally after a delay
#[derive(Default)]
struct MockSource {
    payloads: HashMap<String, Result<RawPayload, ScanError>>,
    delays: HashMap<String, Duration>,
}

impl MockSource {
    fn with(mut self, symbol: &str, payload: Result<RawPayload, ScanError>) -> Self {
        self.payloads.insert(symbol.to_string(), payload);
        self
    }

    fn delayed(mut self, symbol: &str, delay: Duration) -> Self {
        self.delays.insert(symbol.to_string(), delay);
        self
    }
}

#[async_trait]
impl DataSourceAdapter for MockSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn resolve(&self, symbol: &Symbol) -> ScanResult<String> {
        if self.payloads.contains_key(symbol.as_str()) {
            Ok(symbol.to_string())
        } else {
            Err(ScanError::InvalidSymbol(symbol.to_string()))
        }
    }

    async fn fetch_raw(&self, symbol: &Symbol, _count: usize) -> ScanResult<RawPayload> {
        if let Some(delay) = self.delays.get(symbol.as_str()) {
            tokio::time::sleep(*delay).await;
        }
        self.payloads
            .get(symbol.as_str())
            .cloned()
            .unwrap_or_else(|| Err(ScanError::InvalidSymbol(symbol.to_string())))
    }
}

#[derive(Default, Clone)]
struct RecordingDispatcher {
    sent: Arc<Mutex<Vec<Symbol>>>,
}

#[async_trait]
impl AlertDispatcher for RecordingDispatcher {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, signal: &Signal) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(signal.symbol.clone());
        Ok(())
    }
}

struct FailingDispatcher;

#[async_trait]
impl AlertDispatcher for FailingDispatcher {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn notify(&self, _signal: &Signal) -> anyhow::Result<()> {
        anyhow::bail!("chat unreachable")
    }
}

fn symbols(names: &[&str]) -> Vec<Symbol> {
    names.iter().map(Symbol::new).collect()
}

fn three_symbol_source() -> MockSource {
    MockSource::default()
        .with("BTCUSDT", Ok(rows(&reentry_closes()[..=REENTRY_INDEX])))
        .with(
            "ETHUSDT",
            Err(ScanError::fetch("mock", "connection reset by peer")),
        )
        .with("SOLUSDT", Ok(rows(&[100.0; 40])))
}

// =============================================================================
// Pipeline Tests
// =============================================================================

#[test]
fn test_pipeline_fires_on_reentry_bar() {
    let now = Utc::now();
    let closes = reentry_closes();
    let candles = normalize(&rows(&closes[..=REENTRY_INDEX]), 50, now).unwrap();

    let signal = evaluate(&Symbol::new("BTCUSDT"), &candles, now).expect("signal should fire");

    assert_eq!(signal.symbol, Symbol::new("BTCUSDT"));
    assert_eq!(signal.evaluated_at, now);
    assert_eq!(signal.price, 97.5);
    assert_eq!(signal.entries.aggressive, 97.5);
    assert_eq!(signal.entries.technical, signal.bb_low);
    assert_relative_eq!(
        signal.entries.conservative,
        signal.bb_low * CONSERVATIVE_DISCOUNT,
        max_relative = 1e-12
    );
    assert_relative_eq!(signal.bb_low, 95.7374, epsilon = 1e-3);
    assert!(signal.rsi >= 35.0);
    assert_eq!(signal.target_price, signal.sma20);
    assert!(signal.entries.conservative < signal.entries.technical);

    for (entry, pct) in [
        (signal.entries.aggressive, signal.projections.aggressive),
        (signal.entries.technical, signal.projections.technical),
        (signal.entries.conservative, signal.projections.conservative),
    ] {
        assert_relative_eq!(entry * (1.0 + pct / 100.0), signal.sma20, max_relative = 1e-9);
    }
}

#[test]
fn test_signal_fires_only_on_crossover_bar() {
    let now = Utc::now();
    let closes = reentry_closes();

    let fired: Vec<usize> = (2..=closes.len())
        .filter(|&n| {
            let candles = normalize(&rows(&closes[..n]), 50, now).unwrap();
            evaluate(&Symbol::new("BTCUSDT"), &candles, now).is_some()
        })
        .collect();

    assert_eq!(fired, vec![REENTRY_INDEX + 1]);
}

#[test]
fn test_detector_needs_two_sampled_bars() {
    let now = Utc::now();
    // Exactly one sampled bar after the 20-bar warm-up
    let candles = normalize(&rows(&reentry_closes()[..20]), 50, now).unwrap();
    let annotated = annotate(&candles);

    assert_eq!(annotated.iter().filter(|a| a.sample.is_some()).count(), 1);
    assert!(detect(&annotated).is_none());
}

#[test]
fn test_short_history_is_insufficient_data() {
    let now = Utc::now();
    for closes in [&[][..], &[100.0][..]] {
        assert!(matches!(
            normalize(&rows(closes), 50, now),
            Err(ScanError::InsufficientData { .. })
        ));
    }
}

#[test]
fn test_truncation_keeps_most_recent_candles() {
    let now = Utc::now();
    let closes = reentry_closes();
    let candles = normalize(&rows(&closes), 25, now).unwrap();

    assert_eq!(candles.len(), 25);
    assert_eq!(candles.last().unwrap().close, 98.5);
}

#[test]
fn test_prefetched_matches_single_evaluation() {
    let now = Utc::now();
    let payload = rows(&reentry_closes()[..=REENTRY_INDEX]);
    let inputs = vec![
        (Symbol::new("BTCUSDT"), payload.clone()),
        (Symbol::new("SOLUSDT"), rows(&[100.0; 40])),
    ];

    let results = evaluate_prefetched(&inputs, 50, now);
    let candles = normalize(&payload, 50, now).unwrap();
    let expected = evaluate(&Symbol::new("BTCUSDT"), &candles, now).unwrap();

    assert_eq!(results[0].signal(), Some(&expected));
    assert_eq!(results[1].outcome, Outcome::NoSignal);
}

// =============================================================================
// Batch Tests
// =============================================================================

#[tokio::test]
async fn test_batch_isolates_fetch_failure() {
    let scanner = Scanner::new(vec![Arc::new(three_symbol_source())], 50);
    let results = scanner
        .evaluate_batch(&symbols(&["BTCUSDT", "ETHUSDT", "SOLUSDT"]), None)
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].symbol, Symbol::new("BTCUSDT"));
    assert!(results[0].signal().is_some());

    assert_eq!(results[1].symbol, Symbol::new("ETHUSDT"));
    match &results[1].outcome {
        Outcome::NoData { reason } => assert!(reason.contains("connection reset")),
        other => panic!("expected NoData, got {:?}", other),
    }

    assert_eq!(results[2].outcome, Outcome::NoSignal);
}

#[tokio::test]
async fn test_unrouted_symbol_is_no_data() {
    let scanner = Scanner::new(vec![Arc::new(three_symbol_source())], 50);
    let results = scanner
        .evaluate_batch(&symbols(&["DOGEUSDT", "SOLUSDT"]), None)
        .await;

    match &results[0].outcome {
        Outcome::NoData { reason } => assert!(reason.contains("DOGEUSDT")),
        other => panic!("expected NoData, got {:?}", other),
    }
    assert_eq!(results[1].outcome, Outcome::NoSignal);
}

#[tokio::test]
async fn test_routing_falls_through_to_next_source() {
    let first = MockSource::default().with("SOLUSDT", Ok(rows(&[100.0; 40])));
    let second =
        MockSource::default().with("BTCUSDT", Ok(rows(&reentry_closes()[..=REENTRY_INDEX])));
    let scanner = Scanner::new(vec![Arc::new(first), Arc::new(second)], 50);

    let results = scanner
        .evaluate_batch(&symbols(&["BTCUSDT", "SOLUSDT"]), None)
        .await;

    assert!(results[0].signal().is_some());
    assert_eq!(results[1].outcome, Outcome::NoSignal);
}

#[tokio::test]
async fn test_deadline_only_affects_slow_symbol() {
    let source = three_symbol_source().delayed("SOLUSDT", Duration::from_secs(30));
    let scanner = Scanner::new(vec![Arc::new(source)], 50);

    let results = scanner
        .evaluate_batch(
            &symbols(&["BTCUSDT", "SOLUSDT"]),
            Some(Duration::from_millis(200)),
        )
        .await;

    assert!(results[0].signal().is_some());
    match &results[1].outcome {
        Outcome::NoData { reason } => assert!(reason.contains("deadline")),
        other => panic!("expected NoData, got {:?}", other),
    }
}

#[tokio::test]
async fn test_alerts_sent_for_signals_only() {
    let dispatcher = RecordingDispatcher::default();
    let scanner = Scanner::new(vec![Arc::new(three_symbol_source())], 50)
        .with_dispatcher(Arc::new(dispatcher.clone()));

    scanner
        .evaluate_batch(&symbols(&["BTCUSDT", "ETHUSDT", "SOLUSDT"]), None)
        .await;

    assert_eq!(*dispatcher.sent.lock().unwrap(), vec![Symbol::new("BTCUSDT")]);
}

#[tokio::test]
async fn test_failing_dispatcher_does_not_change_results() {
    let quiet = Scanner::new(vec![Arc::new(three_symbol_source())], 50);
    let noisy = Scanner::new(vec![Arc::new(three_symbol_source())], 50)
        .with_dispatcher(Arc::new(FailingDispatcher));
    let batch = symbols(&["BTCUSDT", "ETHUSDT", "SOLUSDT"]);

    let expected = quiet.evaluate_batch(&batch, None).await;
    let actual = noisy.evaluate_batch(&batch, None).await;

    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(&expected) {
        assert_eq!(a.symbol, e.symbol);
        assert_eq!(a.signal().is_some(), e.signal().is_some());
        assert_eq!(a.is_no_data(), e.is_no_data());
    }
}

#[tokio::test]
async fn test_csv_source_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let closes = reentry_closes();
    let t0 = start_time(closes.len());

    let mut csv = String::from("open_time,open,high,low,close,volume,close_time\n");
    for (i, close) in closes[..=REENTRY_INDEX].iter().enumerate() {
        let open_time = t0 + i as i64 * HOUR_MS;
        csv.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            open_time,
            close,
            close,
            close,
            close,
            500.0,
            open_time + HOUR_MS - 1
        ));
    }
    std::fs::write(dir.path().join("BTCUSDT_1h.csv"), csv).unwrap();

    let scanner = Scanner::new(vec![Arc::new(CsvSource::new(dir.path()))], 50);
    let results = scanner
        .evaluate_batch(&symbols(&["BTCUSDT", "ETHUSDT"]), None)
        .await;

    let signal = results[0].signal().expect("csv history should fire");
    assert_eq!(signal.price, 97.5);
    assert!(results[1].is_no_data());
}

#[tokio::test]
async fn test_candles_closing_after_evaluation_are_excluded() {
    let source = three_symbol_source();
    let long_ago: DateTime<Utc> = DateTime::from_timestamp_millis(0).unwrap();

    let err = source
        .fetch(&Symbol::new("BTCUSDT"), 50, long_ago)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ScanError::InsufficientData { available: 0, .. }
    ));
}
