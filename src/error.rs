//! Per-symbol error taxonomy
//!
//! Every variant is recoverable: the scanner turns any of them into a
//! `NoData` outcome for that symbol and keeps evaluating the rest.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// No configured source can serve the symbol
    #[error("symbol {0} is not served by any configured source")]
    InvalidSymbol(String),

    /// Transport or API failure while fetching candles
    #[error("{venue} fetch failed: {message}")]
    Fetch { venue: &'static str, message: String },

    /// Fewer valid closed candles than the minimum after normalization
    #[error("insufficient data: {available} valid closed candles, need at least {required}")]
    InsufficientData { available: usize, required: usize },

    /// The raw payload is structurally malformed
    #[error("invalid source payload: {0}")]
    InvalidSource(String),
}

impl ScanError {
    pub fn fetch(venue: &'static str, err: impl std::fmt::Display) -> Self {
        ScanError::Fetch {
            venue,
            message: err.to_string(),
        }
    }
}

pub type ScanResult<T> = Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_message() {
        let err = ScanError::fetch("binance", "HTTP 451");
        assert_eq!(err.to_string(), "binance fetch failed: HTTP 451");
        assert_eq!(
            err,
            ScanError::Fetch {
                venue: "binance",
                message: "HTTP 451".to_string()
            }
        );
    }
}
