//! Symbol evaluation
//!
//! [`evaluate`] is the pure core: candles in, optional [`Signal`] out.
//! [`Scanner::evaluate_batch`] wraps it with fetching, per-symbol isolation and
//! alert dispatch. A failure on one symbol becomes `NoData` for that symbol
//! only. Nothing is remembered between batches.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{ScanError, ScanResult};
use crate::indicators::annotate;
use crate::normalize::{normalize, RawPayload};
use crate::notify::{build_dispatcher, AlertDispatcher};
use crate::signal::{detect, project};
use crate::sources::{build_sources, DataSourceAdapter};
use crate::{CandleSequence, EvaluationResult, Outcome, Signal, Symbol};

/// Run indicators and crossover detection over one symbol's candles.
pub fn evaluate(
    symbol: &Symbol,
    candles: &CandleSequence,
    evaluated_at: DateTime<Utc>,
) -> Option<Signal> {
    let annotated = annotate(candles);
    let trigger = detect(&annotated)?;
    Some(project(symbol, evaluated_at, &trigger.candle, &trigger.sample))
}

fn outcome_for(
    symbol: Symbol,
    candles: ScanResult<CandleSequence>,
    evaluated_at: DateTime<Utc>,
) -> EvaluationResult {
    match candles {
        Ok(candles) => {
            let outcome = match evaluate(&symbol, &candles, evaluated_at) {
                Some(signal) => {
                    info!(
                        symbol = %symbol,
                        price = signal.price,
                        bb_low = signal.bb_low,
                        rsi = signal.rsi,
                        "Signal fired"
                    );
                    Outcome::Signal(signal)
                }
                None => {
                    debug!(symbol = %symbol, candles = candles.len(), "No signal");
                    Outcome::NoSignal
                }
            };
            EvaluationResult { symbol, outcome }
        }
        Err(e) => {
            warn!(symbol = %symbol, error = %e, "No data for symbol");
            EvaluationResult::no_data(symbol, &e)
        }
    }
}

/// Normalize and evaluate one pre-fetched payload
pub fn evaluate_payload(
    symbol: Symbol,
    payload: &RawPayload,
    desired_count: usize,
    evaluated_at: DateTime<Utc>,
) -> EvaluationResult {
    let candles = normalize(payload, desired_count, evaluated_at);
    outcome_for(symbol, candles, evaluated_at)
}

/// Evaluate pre-fetched payloads in parallel. Output order matches input order.
pub fn evaluate_prefetched(
    inputs: &[(Symbol, RawPayload)],
    desired_count: usize,
    evaluated_at: DateTime<Utc>,
) -> Vec<EvaluationResult> {
    inputs
        .par_iter()
        .map(|(symbol, payload)| {
            evaluate_payload(symbol.clone(), payload, desired_count, evaluated_at)
        })
        .collect()
}

/// Fetches candles from the configured sources and evaluates symbols in batches
#[derive(Clone)]
pub struct Scanner {
    sources: Vec<Arc<dyn DataSourceAdapter>>,
    dispatcher: Option<Arc<dyn AlertDispatcher>>,
    candle_count: usize,
}

impl Scanner {
    pub fn new(sources: Vec<Arc<dyn DataSourceAdapter>>, candle_count: usize) -> Self {
        Scanner {
            sources,
            dispatcher: None,
            candle_count,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn AlertDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Build sources and (optionally) the alert dispatcher from configuration
    pub fn from_config(config: &Config, alerts: bool) -> Result<Self> {
        let sources = build_sources(&config.sources)?;
        let scanner = Scanner::new(sources, config.scan.candle_count);

        if !alerts {
            return Ok(scanner);
        }

        let timeout = Duration::from_secs(config.sources.timeout_secs);
        let dispatcher = build_dispatcher(&config.telegram, timeout)?;
        info!(dispatcher = dispatcher.name(), "Alerts enabled");
        Ok(scanner.with_dispatcher(dispatcher))
    }

    /// First source able to serve `symbol`
    pub fn route(&self, symbol: &Symbol) -> ScanResult<Arc<dyn DataSourceAdapter>> {
        self.sources
            .iter()
            .find(|source| source.resolve(symbol).is_ok())
            .cloned()
            .ok_or_else(|| ScanError::InvalidSymbol(symbol.to_string()))
    }

    /// Fetch and evaluate a single symbol
    pub async fn evaluate_symbol(
        &self,
        symbol: Symbol,
        evaluated_at: DateTime<Utc>,
    ) -> EvaluationResult {
        let candles = match self.route(&symbol) {
            Ok(source) => {
                debug!(symbol = %symbol, source = source.name(), "Fetching candles");
                source.fetch(&symbol, self.candle_count, evaluated_at).await
            }
            Err(e) => Err(e),
        };
        outcome_for(symbol, candles, evaluated_at)
    }

    /// Evaluate every symbol concurrently and dispatch alerts for fired signals.
    ///
    /// Returns exactly one result per input symbol, in input order. A symbol
    /// that misses `deadline` is reported as `NoData`.
    pub async fn evaluate_batch(
        &self,
        symbols: &[Symbol],
        deadline: Option<Duration>,
    ) -> Vec<EvaluationResult> {
        let evaluated_at = Utc::now();
        let mut tasks = JoinSet::new();

        for (idx, symbol) in symbols.iter().cloned().enumerate() {
            let scanner = self.clone();
            tasks.spawn(async move {
                let evaluation = scanner.evaluate_symbol(symbol.clone(), evaluated_at);
                let result = match deadline {
                    Some(limit) => match tokio::time::timeout(limit, evaluation).await {
                        Ok(result) => result,
                        Err(_) => {
                            warn!(symbol = %symbol, ?limit, "Evaluation deadline exceeded");
                            EvaluationResult {
                                symbol,
                                outcome: Outcome::NoData {
                                    reason: format!("deadline of {:?} exceeded", limit),
                                },
                            }
                        }
                    },
                    None => evaluation.await,
                };
                (idx, result)
            });
        }

        let mut slots: Vec<Option<EvaluationResult>> = vec![None; symbols.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, result)) => slots[idx] = Some(result),
                Err(e) => error!(error = %e, "Evaluation task failed"),
            }
        }

        let results: Vec<EvaluationResult> = slots
            .into_iter()
            .zip(symbols)
            .map(|(slot, symbol)| {
                slot.unwrap_or_else(|| EvaluationResult {
                    symbol: symbol.clone(),
                    outcome: Outcome::NoData {
                        reason: "evaluation task failed".to_string(),
                    },
                })
            })
            .collect();

        self.dispatch_alerts(&results).await;

        let signals = results.iter().filter(|r| r.signal().is_some()).count();
        let no_data = results.iter().filter(|r| r.is_no_data()).count();
        info!(
            symbols = results.len(),
            signals,
            no_data,
            "Batch evaluation complete"
        );

        results
    }

    async fn dispatch_alerts(&self, results: &[EvaluationResult]) {
        let Some(dispatcher) = &self.dispatcher else {
            return;
        };

        for signal in results.iter().filter_map(EvaluationResult::signal) {
            if let Err(e) = dispatcher.notify(signal).await {
                error!(
                    symbol = %signal.symbol,
                    dispatcher = dispatcher.name(),
                    error = %format!("{:#}", e),
                    "Alert dispatch failed"
                );
            }
        }
    }
}
