//! # Volatility Estimator
//!
//! $$
//! (r_t)_{t\le T} \xrightarrow{\text{GARCH}(p,q)} (\hat\sigma_t)_{t\le T}
//! $$
//!
//! Per-asset training against the injected order configuration, with the
//! resulting forecast written to the volatility store.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::info;
use tracing::warn;

use super::garch::GarchModel;
use super::summary::VolatilityEstimate;
use crate::config::GarchConfig;
use crate::data::ReturnMatrix;
use crate::data::ReturnSeries;
use crate::error::Error;
use crate::error::Result;
use crate::store::VolatilityStore;

/// Per-asset outcomes of a batch run, in asset order.
#[derive(Debug)]
pub struct BatchReport<T> {
  pub entries: Vec<(String, Result<T>)>,
}

impl<T> BatchReport<T> {
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn get(&self, asset: &str) -> Option<&Result<T>> {
    self
      .entries
      .iter()
      .find(|(a, _)| a == asset)
      .map(|(_, r)| r)
  }

  pub fn succeeded(&self) -> impl Iterator<Item = (&str, &T)> {
    self
      .entries
      .iter()
      .filter_map(|(a, r)| r.as_ref().ok().map(|v| (a.as_str(), v)))
  }

  pub fn failed(&self) -> impl Iterator<Item = (&str, &Error)> {
    self
      .entries
      .iter()
      .filter_map(|(a, r)| r.as_ref().err().map(|e| (a.as_str(), e)))
  }
}

/// Fits configured models and caches their conditional volatility.
#[derive(Clone)]
pub struct VolatilityEstimator {
  config: GarchConfig,
  store: Arc<dyn VolatilityStore>,
}

impl VolatilityEstimator {
  pub fn new(config: GarchConfig, store: Arc<dyn VolatilityStore>) -> Self {
    Self { config, store }
  }

  pub fn config(&self) -> &GarchConfig {
    &self.config
  }

  pub fn store(&self) -> &Arc<dyn VolatilityStore> {
    &self.store
  }

  /// Fit `asset` on `returns` and persist the conditional volatility under `asset`.
  ///
  /// Nothing is written unless the fit succeeds.
  pub fn fit_series(&self, asset: &str, returns: &ReturnSeries) -> Result<VolatilityEstimate> {
    if returns.is_empty() {
      return Err(Error::unavailable(asset, "return series is empty"));
    }

    let order = self.config.order(asset)?;
    let fit = GarchModel::from_config(order, &self.config).fit(asset, returns)?;
    let estimate = fit.conditional_volatility()?;

    self.store.put(asset, &estimate)?;
    info!(
      asset,
      p = order.p,
      q = order.q,
      constant = order.constant,
      log_likelihood = fit.log_likelihood(),
      persistence = fit.params().persistence(),
      iterations = fit.iterations(),
      "trained volatility model"
    );

    Ok(estimate)
  }

  /// Train the column of `asset` from `returns`.
  pub fn train(&self, asset: &str, returns: &ReturnMatrix) -> Result<VolatilityEstimate> {
    let series = returns
      .column(asset)
      .ok_or_else(|| Error::unavailable(asset, "no return column"))?;
    self.fit_series(asset, &series)
  }

  /// Train every configured asset independently; failures are recorded per asset.
  pub fn train_all(&self, returns: &ReturnMatrix) -> BatchReport<VolatilityEstimate> {
    let assets: Vec<String> = self.config.assets().map(str::to_string).collect();

    let entries: Vec<(String, Result<VolatilityEstimate>)> = assets
      .into_par_iter()
      .map(|asset| {
        let outcome = self.train(&asset, returns);
        (asset, outcome)
      })
      .collect();

    let report = BatchReport { entries };
    for (asset, e) in report.failed() {
      warn!(asset, error = %e, "training failed");
    }
    report
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use ndarray::Array2;
  use rand::SeedableRng;
  use rand::rngs::StdRng;
  use tracing_test::traced_test;

  use super::*;
  use crate::config::GarchOrder;
  use crate::data::series::daily_dates;
  use crate::store::MemoryStore;
  use crate::volatility::GarchParams;

  fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()
  }

  fn simulated(n: usize, seed: u64) -> Vec<f64> {
    let params = GarchParams {
      mu: 0.0,
      omega: 2e-5,
      alpha: vec![0.1],
      beta: vec![0.85],
    };
    params.simulate(n, &mut StdRng::seed_from_u64(seed))
  }

  fn config() -> GarchConfig {
    GarchConfig::default()
      .with_order("BTC-USD", GarchOrder::new(1, 1, false))
      .with_order("ETH-USD", GarchOrder::new(1, 1, true))
      .with_order("ADA-USD", GarchOrder::new(1, 1, false))
  }

  #[test]
  fn empty_series_is_data_unavailable_without_write() {
    let store = Arc::new(MemoryStore::new());
    let estimator = VolatilityEstimator::new(config(), store.clone());

    let err = estimator
      .fit_series("BTC-USD", &ReturnSeries::default())
      .unwrap_err();

    assert!(matches!(err, Error::DataUnavailable { .. }));
    assert!(!store.contains("BTC-USD"));
  }

  #[test]
  fn unconfigured_asset_is_configuration_missing() {
    let store = Arc::new(MemoryStore::new());
    let estimator = VolatilityEstimator::new(config(), store.clone());
    let series = ReturnSeries::new(daily_dates(start(), 300), simulated(300, 1)).unwrap();

    let err = estimator.fit_series("DOGE-USD", &series).unwrap_err();

    assert!(matches!(err, Error::ConfigurationMissing(a) if a == "DOGE-USD"));
    assert!(store.is_empty());
  }

  #[test]
  fn successful_fit_is_persisted() {
    let store = Arc::new(MemoryStore::new());
    let estimator = VolatilityEstimator::new(config(), store.clone());
    let series = ReturnSeries::new(daily_dates(start(), 500), simulated(500, 3)).unwrap();

    let estimate = estimator.fit_series("BTC-USD", &series).unwrap();

    assert_eq!(estimate.len(), 500);
    assert_eq!(estimate.series().dates(), series.dates());
    assert!(estimate.series().values().iter().all(|v| *v > 0.0));
    assert_eq!(store.get("BTC-USD").unwrap(), estimate);
  }

  #[test]
  #[traced_test]
  fn train_all_records_failures_and_continues() {
    let n = 400;
    let btc = simulated(n, 11);
    let eth = simulated(n, 12);
    let values = Array2::from_shape_fn((n, 2), |(t, i)| if i == 0 { btc[t] } else { eth[t] });
    let matrix = ReturnMatrix::new(
      daily_dates(start(), n),
      vec!["BTC-USD".to_string(), "ETH-USD".to_string()],
      values,
    )
    .unwrap();

    let store = Arc::new(MemoryStore::new());
    let report = VolatilityEstimator::new(config(), store.clone()).train_all(&matrix);

    assert_eq!(report.len(), 3);
    assert!(report.get("BTC-USD").unwrap().is_ok());
    assert!(report.get("ETH-USD").unwrap().is_ok());
    assert!(matches!(
      report.get("ADA-USD").unwrap(),
      Err(Error::DataUnavailable { .. })
    ));
    assert_eq!(report.succeeded().count(), 2);
    assert_eq!(report.failed().count(), 1);
    assert!(store.contains("BTC-USD") && store.contains("ETH-USD"));
    assert!(!store.contains("ADA-USD"));
    assert!(logs_contain("training failed"));
    assert!(logs_contain("ADA-USD"));
  }

  #[test]
  fn expired_time_limit_fails_each_asset_without_aborting_batch() {
    let n = 300;
    let btc = simulated(n, 21);
    let eth = simulated(n, 22);
    let values = Array2::from_shape_fn((n, 2), |(t, i)| if i == 0 { btc[t] } else { eth[t] });
    let matrix = ReturnMatrix::new(
      daily_dates(start(), n),
      vec!["BTC-USD".to_string(), "ETH-USD".to_string()],
      values,
    )
    .unwrap();
    let config = GarchConfig {
      max_fit_seconds: Some(1e-9),
      ..config()
    };

    let store = Arc::new(MemoryStore::new());
    let report = VolatilityEstimator::new(config, store.clone()).train_all(&matrix);

    assert_eq!(report.len(), 3);
    for asset in ["BTC-USD", "ETH-USD"] {
      assert!(matches!(
        report.get(asset).unwrap(),
        Err(Error::FitFailure { .. })
      ));
    }
    assert!(store.is_empty());
  }
}
