//! Mean Reversion Scanner
//!
//! Detects Bollinger Band re-entries confirmed by an RSI cross on hourly
//! candles and derives tiered entry prices with projected reversion to the
//! 20-bar mean.
//!
//! Data flows strictly forward:
//! raw payload → [`normalize`] → [`indicators::annotate`] → [`signal::detect`]
//! → [`signal::project`]. The whole chain is synchronous and pure; network
//! access lives in [`sources`] and alert delivery in [`notify`].
//!
//! ## Example (pre-fetched data)
//! ```no_run
//! use chrono::Utc;
//! use reversion_scanner::normalize::{normalize, RawPayload};
//! use reversion_scanner::scanner::evaluate;
//! use reversion_scanner::Symbol;
//!
//! fn check(payload: &RawPayload) -> anyhow::Result<()> {
//!     let now = Utc::now();
//!     let candles = normalize(payload, 50, now)?;
//!     if let Some(signal) = evaluate(&Symbol::new("BTCUSDT"), &candles, now) {
//!         println!("entry {:.4} -> target {:.4}", signal.entries.technical, signal.target_price);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod indicators;
pub mod normalize;
pub mod notify;
pub mod present;
pub mod scanner;
pub mod signal;
pub mod sources;
pub mod types;

pub use config::Config;
pub use error::{ScanError, ScanResult};
pub use scanner::Scanner;
pub use types::*;
