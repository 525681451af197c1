//! # Return Matrix
//!
//! $$
//! R_{t,i} = \ln\frac{P_{t,i}}{P_{t-1,i}}
//! $$
//!
//! Aligned multi-asset return table (rows = dates, columns = assets).

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::NaiveDate;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;
use ndarray::s;

use super::series::ReturnSeries;
use crate::error::Error;
use crate::error::Result;

/// How heterogeneous date indices are reconciled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Alignment {
  /// Keep only dates present in every series.
  #[default]
  Inner,
  /// Union of dates, each column carried forward; rows before all columns start are dropped.
  ForwardFill,
}

/// Returns of several assets on one shared date index.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnMatrix {
  dates: Vec<NaiveDate>,
  assets: Vec<String>,
  values: Array2<f64>,
}

impl ReturnMatrix {
  pub fn new(dates: Vec<NaiveDate>, assets: Vec<String>, values: Array2<f64>) -> Result<Self> {
    if values.nrows() != dates.len() || values.ncols() != assets.len() {
      return Err(Error::InvalidInput(format!(
        "matrix shape {:?} does not match {} dates x {} assets",
        values.dim(),
        dates.len(),
        assets.len()
      )));
    }

    if dates.windows(2).any(|w| w[0] >= w[1]) {
      return Err(Error::InvalidInput(
        "date index must be strictly increasing".to_string(),
      ));
    }

    let unique: BTreeSet<&String> = assets.iter().collect();
    if unique.len() != assets.len() {
      return Err(Error::InvalidInput("duplicate asset identifier".to_string()));
    }

    if values.iter().any(|v| !v.is_finite()) {
      return Err(Error::InvalidInput(
        "return matrix contains missing values".to_string(),
      ));
    }

    Ok(Self {
      dates,
      assets,
      values,
    })
  }

  /// Align per-asset series onto one index.
  pub fn align(series: Vec<(String, ReturnSeries)>, alignment: Alignment) -> Result<Self> {
    let assets: Vec<String> = series.iter().map(|(a, _)| a.clone()).collect();
    let columns: Vec<BTreeMap<NaiveDate, f64>> = series
      .iter()
      .map(|(_, s)| s.iter().collect::<BTreeMap<_, _>>())
      .collect();

    if columns.is_empty() {
      return Self::new(Vec::new(), assets, Array2::zeros((0, 0)));
    }

    let (dates, rows): (Vec<NaiveDate>, Vec<Vec<f64>>) = match alignment {
      Alignment::Inner => {
        let mut common: BTreeSet<NaiveDate> = columns[0].keys().copied().collect();
        for col in &columns[1..] {
          common.retain(|d| col.contains_key(d));
        }
        common
          .into_iter()
          .map(|d| (d, columns.iter().map(|c| c[&d]).collect()))
          .unzip()
      }
      Alignment::ForwardFill => {
        let all: BTreeSet<NaiveDate> = columns.iter().flat_map(|c| c.keys().copied()).collect();
        let mut last: Vec<Option<f64>> = vec![None; columns.len()];
        let mut dates = Vec::new();
        let mut rows = Vec::new();

        for d in all {
          for (slot, col) in last.iter_mut().zip(&columns) {
            if let Some(v) = col.get(&d) {
              *slot = Some(*v);
            }
          }
          if let Some(row) = last.iter().copied().collect::<Option<Vec<f64>>>() {
            dates.push(d);
            rows.push(row);
          }
        }
        (dates, rows)
      }
    };

    let n_assets = assets.len();
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    let values = Array2::from_shape_vec((dates.len(), n_assets), flat)
      .map_err(|e| Error::InvalidInput(e.to_string()))?;

    Self::new(dates, assets, values)
  }

  /// Log returns from a price table; rows with a non-finite return are dropped.
  pub fn from_prices(dates: Vec<NaiveDate>, assets: Vec<String>, prices: Array2<f64>) -> Result<Self> {
    if prices.nrows() != dates.len() || prices.ncols() != assets.len() {
      return Err(Error::InvalidInput(format!(
        "price table shape {:?} does not match {} dates x {} assets",
        prices.dim(),
        dates.len(),
        assets.len()
      )));
    }

    let mut out_dates = Vec::new();
    let mut flat = Vec::new();

    for t in 1..prices.nrows() {
      let row: Vec<f64> = (0..prices.ncols())
        .map(|i| (prices[[t, i]] / prices[[t - 1, i]]).ln())
        .collect();
      if row.iter().all(|r| r.is_finite()) {
        out_dates.push(dates[t]);
        flat.extend(row);
      }
    }

    let values = Array2::from_shape_vec((out_dates.len(), assets.len()), flat)
      .map_err(|e| Error::InvalidInput(e.to_string()))?;
    Self::new(out_dates, assets, values)
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  pub fn values(&self) -> &Array2<f64> {
    &self.values
  }

  /// Number of observations.
  pub fn len(&self) -> usize {
    self.dates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dates.is_empty()
  }

  pub fn n_assets(&self) -> usize {
    self.assets.len()
  }

  /// Trailing window of the most recent `n` observations.
  pub fn tail(&self, n: usize) -> Self {
    let start = self.len().saturating_sub(n);
    Self {
      dates: self.dates[start..].to_vec(),
      assets: self.assets.clone(),
      values: self.values.slice(s![start.., ..]).to_owned(),
    }
  }

  /// Column of one asset as a standalone series.
  pub fn column(&self, asset: &str) -> Option<ReturnSeries> {
    let idx = self.assets.iter().position(|a| a == asset)?;
    ReturnSeries::new(self.dates.clone(), self.values.column(idx).to_vec()).ok()
  }

  /// Per-asset sample mean (zeros for an empty matrix).
  pub fn mean_returns(&self) -> Array1<f64> {
    self
      .values
      .mean_axis(Axis(0))
      .unwrap_or_else(|| Array1::zeros(self.n_assets()))
  }

  /// Portfolio return per date for the given weights.
  pub fn portfolio_returns(&self, weights: &Array1<f64>) -> Array1<f64> {
    self.values.dot(weights)
  }
}
