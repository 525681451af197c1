//! # Volatility Summary
//!
//! $$
//! \bar\sigma_i = \frac{1}{W}\sum_{t=T-W+1}^{T} \hat\sigma_{i,t}
//! $$
//!
//! Forecast series and their scalar recent-window reductions.

use std::collections::BTreeMap;

use ndarray::Array1;
use serde::Serialize;

use crate::data::TimeSeries;
use crate::error::Error;
use crate::error::Result;
use crate::store::VolatilityStore;

/// Conditional-volatility forecast of one asset, one non-negative value per date.
#[derive(Clone, Debug, PartialEq)]
pub struct VolatilityEstimate(TimeSeries);

impl VolatilityEstimate {
  pub fn new(series: TimeSeries) -> Result<Self> {
    if let Some((date, v)) = series.iter().find(|(_, v)| *v < 0.0) {
      return Err(Error::InvalidInput(format!(
        "negative volatility {v} at {date}"
      )));
    }
    Ok(Self(series))
  }

  pub fn series(&self) -> &TimeSeries {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Mean of the last `window` observations.
  pub fn recent_mean(&self, window: usize) -> Option<f64> {
    self.0.tail(window).mean()
  }
}

/// Asset identifier to scalar volatility.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct VolatilitySummary {
  entries: BTreeMap<String, f64>,
}

impl VolatilitySummary {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, asset: impl Into<String>, volatility: f64) -> Result<()> {
    if !(volatility.is_finite() && volatility >= 0.0) {
      return Err(Error::InvalidInput(format!(
        "scalar volatility must be finite and non-negative, got {volatility}"
      )));
    }
    self.entries.insert(asset.into(), volatility);
    Ok(())
  }

  pub fn with(mut self, asset: impl Into<String>, volatility: f64) -> Result<Self> {
    self.insert(asset, volatility)?;
    Ok(self)
  }

  pub fn get(&self, asset: &str) -> Option<f64> {
    self.entries.get(asset).copied()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
    self.entries.iter().map(|(k, v)| (k.as_str(), *v))
  }

  /// Reduce cached forecasts of `assets` to their recent-window means.
  pub fn from_store<S>(store: &S, assets: &[String], window: usize) -> Result<Self>
  where
    S: VolatilityStore + ?Sized,
  {
    let mut summary = Self::new();
    for asset in assets {
      let estimate = store.get(asset)?;
      let mean = estimate
        .recent_mean(window)
        .ok_or_else(|| Error::unavailable(asset.as_str(), "cached forecast is empty"))?;
      summary.insert(asset.as_str(), mean)?;
    }
    Ok(summary)
  }

  /// Volatilities in the order of `assets`; any gap aborts with [`Error::MissingVolatility`].
  pub fn ordered(&self, assets: &[String]) -> Result<Array1<f64>> {
    assets
      .iter()
      .map(|a| self.get(a).ok_or_else(|| Error::MissingVolatility(a.clone())))
      .collect::<Result<Vec<f64>>>()
      .map(Array1::from)
  }
}
