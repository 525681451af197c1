//! # Config
//!
//! $$
//! \text{asset} \mapsto (p, q, \text{constant})
//! $$
//!
//! Injected configuration: per-asset model orders, optimizer and evaluation settings.

use std::collections::BTreeMap;
use std::path::Path;

use impl_new_derive::ImplNew;
use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::Result;

/// Order of the conditional-variance model fitted to one asset.
#[derive(ImplNew, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GarchOrder {
  /// Lagged conditional-variance terms.
  pub p: usize,
  /// Lagged squared-residual terms.
  pub q: usize,
  /// Estimate a constant mean (otherwise zero mean).
  pub constant: bool,
}

impl GarchOrder {
  pub fn validate(&self) -> Result<()> {
    if self.p == 0 || self.q == 0 {
      return Err(Error::InvalidInput(format!(
        "model order must satisfy p >= 1 and q >= 1 (got p={}, q={})",
        self.p, self.q
      )));
    }
    Ok(())
  }

  /// Number of free likelihood parameters.
  pub fn n_params(&self) -> usize {
    1 + self.p + self.q + usize::from(self.constant)
  }
}

/// Volatility estimator configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GarchConfig {
  /// Per-asset model orders; assets absent here cannot be trained.
  pub orders: BTreeMap<String, GarchOrder>,
  /// Iteration cap of the likelihood maximisation.
  pub max_iters: u64,
  /// Nelder-Mead standard-deviation tolerance on the negative log-likelihood.
  pub sd_tolerance: f64,
  /// Optional wall-clock limit for a single fit, in seconds.
  pub max_fit_seconds: Option<f64>,
}

impl Default for GarchConfig {
  fn default() -> Self {
    Self {
      orders: BTreeMap::new(),
      max_iters: 20_000,
      sd_tolerance: 1e-7,
      max_fit_seconds: None,
    }
  }
}

impl GarchConfig {
  pub fn with_order(mut self, asset: impl Into<String>, order: GarchOrder) -> Self {
    self.orders.insert(asset.into(), order);
    self
  }

  pub fn order(&self, asset: &str) -> Result<GarchOrder> {
    self
      .orders
      .get(asset)
      .copied()
      .ok_or_else(|| Error::ConfigurationMissing(asset.to_string()))
  }

  pub fn assets(&self) -> impl Iterator<Item = &str> {
    self.orders.keys().map(String::as_str)
  }
}

/// Starting point of the weight search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitPolicy {
  /// Uniform draw over the weight bounds, scaled by the sum of absolute values.
  #[default]
  Random,
  /// Deterministic `1/n` start.
  Equal,
}

/// Settings shared by both ratio optimizers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
  /// Observations in the trailing return window.
  pub trailing_window: usize,
  /// Observations averaged when reducing a forecast to a scalar.
  pub summary_window: usize,
  pub weight_lower_bound: f64,
  pub weight_upper_bound: f64,
  /// Risk-free rate of the variance form.
  pub variance_risk_free_rate: f64,
  /// Risk-free rate of the CVaR form (daily).
  pub cvar_risk_free_rate: f64,
  /// Tail probability of the CVaR form.
  pub cvar_alpha: f64,
  pub init: InitPolicy,
  /// Seed of the random start; `None` draws from entropy.
  pub seed: Option<u64>,
  /// Independent local searches, best one wins.
  pub restarts: usize,
  pub max_iters: u64,
  pub sd_tolerance: f64,
}

impl Default for OptimizerSettings {
  fn default() -> Self {
    Self {
      trailing_window: 30,
      summary_window: 30,
      weight_lower_bound: -1.0,
      weight_upper_bound: 1.0,
      variance_risk_free_rate: 0.0,
      cvar_risk_free_rate: 0.03 / 365.0,
      cvar_alpha: 0.05,
      init: InitPolicy::Random,
      seed: None,
      restarts: 1,
      max_iters: 5_000,
      sd_tolerance: 1e-12,
    }
  }
}

impl OptimizerSettings {
  pub fn validate(&self) -> Result<()> {
    if self.trailing_window < 2 {
      return Err(Error::InvalidInput(
        "trailing_window must be at least 2".to_string(),
      ));
    }
    if self.summary_window == 0 {
      return Err(Error::InvalidInput(
        "summary_window must be positive".to_string(),
      ));
    }
    if !(self.weight_lower_bound < self.weight_upper_bound) {
      return Err(Error::InvalidInput(format!(
        "weight bounds [{}, {}] are empty",
        self.weight_lower_bound, self.weight_upper_bound
      )));
    }
    if !(self.cvar_alpha > 0.0 && self.cvar_alpha < 1.0) {
      return Err(Error::InvalidInput(format!(
        "cvar_alpha must lie in (0, 1), got {}",
        self.cvar_alpha
      )));
    }
    if self.restarts == 0 {
      return Err(Error::InvalidInput("restarts must be at least 1".to_string()));
    }
    Ok(())
  }
}

/// Diagnostic evaluation settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSettings {
  /// Rolling window of the realized-volatility proxy.
  pub realized_window: usize,
}

impl Default for EvaluationSettings {
  fn default() -> Self {
    Self { realized_window: 30 }
  }
}

/// Top-level settings file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub garch: GarchConfig,
  pub optimizer: OptimizerSettings,
  pub evaluation: EvaluationSettings,
}

impl Settings {
  pub fn from_json_str(raw: &str) -> Result<Self> {
    let settings: Self = serde_json::from_str(raw)?;
    settings.validate()?;
    Ok(settings)
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
    let raw = std::fs::read_to_string(path)?;
    Self::from_json_str(&raw)
  }

  pub fn validate(&self) -> Result<()> {
    for order in self.garch.orders.values() {
      order.validate()?;
    }
    if let Some(secs) = self.garch.max_fit_seconds {
      if !(secs.is_finite() && secs > 0.0) {
        return Err(Error::InvalidInput(format!(
          "max_fit_seconds must be positive (got {secs})"
        )));
      }
    }
    if self.evaluation.realized_window < 2 {
      return Err(Error::InvalidInput(
        "realized_window must be at least 2".to_string(),
      ));
    }
    self.optimizer.validate()
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn reference_config_parses() {
    let settings = Settings::from_json_str(include_str!("../config/default.json")).unwrap();

    assert_eq!(settings.garch.order("BTC-USD").unwrap(), GarchOrder::new(4, 4, true));
    assert_eq!(settings.garch.order("BNB-USD").unwrap(), GarchOrder::new(3, 2, true));
    assert_eq!(settings.garch.order("ADA-USD").unwrap(), GarchOrder::new(3, 4, true));
    assert_eq!(settings.garch.orders.len(), 4);
    assert_eq!(settings.optimizer.trailing_window, 30);
  }

  #[test]
  fn defaults_keep_distinct_risk_free_conventions() {
    let settings = Settings::from_json_str("{}").unwrap();

    assert_eq!(settings.optimizer.variance_risk_free_rate, 0.0);
    assert_abs_diff_eq!(settings.optimizer.cvar_risk_free_rate, 0.03 / 365.0);
    assert_eq!(settings.optimizer.weight_lower_bound, -1.0);
    assert_eq!(settings.optimizer.weight_upper_bound, 1.0);
    assert_eq!(settings.optimizer.cvar_alpha, 0.05);
  }

  #[test]
  fn missing_order_is_configuration_missing() {
    let err = GarchConfig::default().order("DOGE-USD").unwrap_err();
    assert!(matches!(err, Error::ConfigurationMissing(a) if a == "DOGE-USD"));
  }

  #[test]
  fn zero_order_is_rejected() {
    let raw = r#"{ "garch": { "orders": { "X": { "p": 0, "q": 1, "constant": false } } } }"#;
    assert!(matches!(
      Settings::from_json_str(raw).unwrap_err(),
      Error::InvalidInput(_)
    ));
  }

  #[test]
  fn non_positive_fit_limit_is_rejected() {
    for secs in ["0.0", "-1.5"] {
      let raw = format!(r#"{{ "garch": {{ "max_fit_seconds": {secs} }} }}"#);
      assert!(matches!(
        Settings::from_json_str(&raw).unwrap_err(),
        Error::InvalidInput(_)
      ));
    }
    let raw = r#"{ "garch": { "max_fit_seconds": 2.5 } }"#;
    assert_eq!(Settings::from_json_str(raw).unwrap().garch.max_fit_seconds, Some(2.5));
  }
}
