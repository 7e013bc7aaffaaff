//! Local CSV source
//!
//! Reads `{data_dir}/{SYMBOL}_1h.csv` with header
//! `open_time,open,high,low,close,volume,close_time` (epoch ms). `volume` and
//! `close_time` may be left empty.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::DataSourceAdapter;
use crate::error::{ScanError, ScanResult};
use crate::normalize::{CandleRow, RawPayload};
use crate::Symbol;

#[derive(Debug, Clone)]
pub struct CsvSource {
    data_dir: PathBuf,
}

impl CsvSource {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        CsvSource {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, symbol: &Symbol) -> PathBuf {
        self.data_dir
            .join(format!("{}_1h.csv", symbol.as_str().to_uppercase()))
    }
}

/// Load candle rows from a CSV file
pub fn load_rows(path: impl AsRef<Path>) -> Result<Vec<CandleRow>> {
    let mut reader = csv::Reader::from_path(path.as_ref()).context("Failed to open CSV file")?;

    reader
        .deserialize()
        .enumerate()
        .map(|(idx, row)| row.context(format!("Failed to parse row {}", idx + 1)))
        .collect()
}

#[async_trait]
impl DataSourceAdapter for CsvSource {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn resolve(&self, symbol: &Symbol) -> ScanResult<String> {
        let path = self.path_for(symbol);
        if path.is_file() {
            Ok(path.display().to_string())
        } else {
            Err(ScanError::InvalidSymbol(symbol.to_string()))
        }
    }

    async fn fetch_raw(&self, symbol: &Symbol, _count: usize) -> ScanResult<RawPayload> {
        let path = PathBuf::from(self.resolve(symbol)?);
        debug!(path = %path.display(), "Loading candle rows");

        let rows = tokio::task::spawn_blocking(move || load_rows(&path))
            .await
            .map_err(|e| ScanError::fetch(self.name(), e))?
            .map_err(|e| ScanError::InvalidSource(format!("{:#}", e)))?;

        Ok(RawPayload::Rows(rows))
    }
}
