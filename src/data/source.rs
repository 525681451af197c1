//! # Return Source
//!
//! $$
//! \text{source} \to R \in \mathbb{R}^{T\times N}
//! $$
//!
//! Thin adapters that hand a [`ReturnMatrix`] to the rest of the crate.

use std::path::Path;
use std::path::PathBuf;

use chrono::NaiveDate;
use ndarray::Array2;
use tracing::debug;

use super::matrix::ReturnMatrix;
use crate::error::Error;
use crate::error::Result;

/// Anything that can supply the current return table.
pub trait ReturnSource {
  fn load(&self) -> Result<ReturnMatrix>;
}

/// What the numeric cells of a CSV table hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CsvContent {
  /// Daily log returns, used as-is.
  LogReturns,
  /// Close prices, converted to log returns.
  Prices,
}

/// Date-indexed CSV table: first column is the date, one column per asset.
///
/// Rows with an empty or unparsable cell are dropped.
#[derive(Clone, Debug)]
pub struct CsvReturnSource {
  path: PathBuf,
  content: CsvContent,
}

impl CsvReturnSource {
  pub fn log_returns(path: impl AsRef<Path>) -> Self {
    Self {
      path: path.as_ref().to_path_buf(),
      content: CsvContent::LogReturns,
    }
  }

  pub fn prices(path: impl AsRef<Path>) -> Self {
    Self {
      path: path.as_ref().to_path_buf(),
      content: CsvContent::Prices,
    }
  }

  fn unavailable(&self, reason: impl Into<String>) -> Error {
    Error::unavailable(self.path.display().to_string(), reason)
  }
}

impl ReturnSource for CsvReturnSource {
  fn load(&self) -> Result<ReturnMatrix> {
    let mut reader = csv::Reader::from_path(&self.path).map_err(|e| self.unavailable(e.to_string()))?;

    let headers = reader.headers().map_err(|e| self.unavailable(e.to_string()))?;
    let assets: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();
    if assets.is_empty() {
      return Err(self.unavailable("table has no asset columns"));
    }

    let mut dates = Vec::new();
    let mut flat = Vec::new();
    let mut dropped = 0usize;

    for record in reader.records() {
      let record = record.map_err(|e| self.unavailable(e.to_string()))?;
      let Some(date) = record.get(0).and_then(parse_date) else {
        dropped += 1;
        continue;
      };

      let row: Option<Vec<f64>> = (1..=assets.len())
        .map(|i| record.get(i).and_then(|c| c.trim().parse::<f64>().ok()))
        .map(|v| v.filter(|x| x.is_finite()))
        .collect();

      match row {
        Some(row) => {
          dates.push(date);
          flat.extend(row);
        }
        None => dropped += 1,
      }
    }

    debug!(
      path = %self.path.display(),
      rows = dates.len(),
      dropped,
      "loaded return table"
    );

    let values = Array2::from_shape_vec((dates.len(), assets.len()), flat)
      .map_err(|e| self.unavailable(e.to_string()))?;

    match self.content {
      CsvContent::LogReturns => ReturnMatrix::new(dates, assets, values),
      CsvContent::Prices => ReturnMatrix::from_prices(dates, assets, values),
    }
  }
}

/// Matrix already held in memory.
#[derive(Clone, Debug)]
pub struct InMemoryReturnSource(pub ReturnMatrix);

impl ReturnSource for InMemoryReturnSource {
  fn load(&self) -> Result<ReturnMatrix> {
    Ok(self.0.clone())
  }
}

/// Parse `YYYY-MM-DD`, tolerating a trailing time component.
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
  let raw = raw.trim();
  let head = raw.get(..10).unwrap_or(raw);
  NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use approx::assert_abs_diff_eq;

  use super::*;

  fn write_csv(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
  }

  #[test]
  fn loads_log_returns_and_drops_incomplete_rows() {
    let file = write_csv(
      "Date,BTC-USD,ETH-USD\n2024-01-01,0.01,0.02\n2024-01-02,,0.03\n2024-01-03 00:00:00,-0.01,0.00\n",
    );
    let m = CsvReturnSource::log_returns(file.path()).load().unwrap();

    assert_eq!(m.assets(), &["BTC-USD".to_string(), "ETH-USD".to_string()]);
    assert_eq!(m.len(), 2);
    assert_abs_diff_eq!(m.values()[[1, 0]], -0.01);
  }

  #[test]
  fn converts_prices_to_log_returns() {
    let file = write_csv("Date,A\n2024-01-01,100\n2024-01-02,105\n");
    let m = CsvReturnSource::prices(file.path()).load().unwrap();

    assert_eq!(m.len(), 1);
    assert_abs_diff_eq!(m.values()[[0, 0]], (1.05_f64).ln(), epsilon = 1e-12);
  }

  #[test]
  fn missing_file_is_data_unavailable() {
    let err = CsvReturnSource::log_returns("/nonexistent/returns.csv")
      .load()
      .unwrap_err();
    assert!(matches!(err, Error::DataUnavailable { .. }));
  }
}
