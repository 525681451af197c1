//! # Allocation Engine
//!
//! $$
//! \mathbf{w}^\* = \operatorname{Optimize}(\mu, \Sigma \text{ or } R, \rho)
//! $$
//!
//! Entry point for both ratio forms over a trailing return window.

use tracing::info;

use super::covariance::build_covariance;
use super::optimizer::RatioObjective;
use super::optimizer::RatioOptimizer;
use super::risk::CvarRisk;
use super::risk::RiskMeasure;
use super::risk::VarianceRisk;
use super::types::OptimizationResult;
use super::types::OptimizerMethod;
use crate::config::OptimizerSettings;
use crate::data::ReturnMatrix;
use crate::error::Error;
use crate::error::Result;
use crate::volatility::VolatilitySummary;

/// Single entry-point engine for the Sharpe and Sharpe-CVaR allocations.
#[derive(Clone, Debug, Default)]
pub struct AllocationEngine {
  settings: OptimizerSettings,
}

impl AllocationEngine {
  pub fn new(settings: OptimizerSettings) -> Self {
    Self { settings }
  }

  pub fn settings(&self) -> &OptimizerSettings {
    &self.settings
  }

  /// Most recent `trailing_window` observations; fewer than two is unusable.
  pub fn trailing_window(&self, returns: &ReturnMatrix) -> Result<ReturnMatrix> {
    if returns.n_assets() == 0 {
      return Err(Error::unavailable("portfolio", "return matrix has no assets"));
    }
    let window = returns.tail(self.settings.trailing_window);
    if window.len() < 2 {
      return Err(Error::unavailable(
        "portfolio",
        format!("{} observations in the trailing window, need at least 2", window.len()),
      ));
    }
    Ok(window)
  }

  fn solve<M: RiskMeasure>(
    &self,
    method: OptimizerMethod,
    window: &ReturnMatrix,
    objective: RatioObjective<M>,
  ) -> Result<OptimizationResult> {
    self.settings.validate()?;
    let result = RatioOptimizer::from_settings(&self.settings).maximize(&objective, window.assets())?;
    info!(
      method = %method,
      assets = window.n_assets(),
      observations = window.len(),
      ratio = result.achieved_ratio,
      expected_return = result.expected_return,
      risk = result.risk,
      "optimized allocation"
    );
    Ok(result)
  }

  /// Maximise `(wᵀμ - r_f) / √(wᵀΣw)` with `Σ` built from `summary`.
  pub fn optimize_sharpe(
    &self,
    returns: &ReturnMatrix,
    summary: &VolatilitySummary,
  ) -> Result<OptimizationResult> {
    let window = self.trailing_window(returns)?;
    let cov = build_covariance(summary, &window)?;
    let objective = RatioObjective::new(
      window.mean_returns(),
      self.settings.variance_risk_free_rate,
      VarianceRisk::new(cov),
    );
    self.solve(OptimizerMethod::SharpeVariance, &window, objective)
  }

  /// Maximise `(wᵀμ - r_f) / CVaR_α(w)` on the raw trailing window.
  pub fn optimize_sharpe_cvar(&self, returns: &ReturnMatrix) -> Result<OptimizationResult> {
    let window = self.trailing_window(returns)?;
    let objective = RatioObjective::new(
      window.mean_returns(),
      self.settings.cvar_risk_free_rate,
      CvarRisk::new(window.values().to_owned(), self.settings.cvar_alpha),
    );
    self.solve(OptimizerMethod::SharpeCvar, &window, objective)
  }

  /// Dispatch on `method`; the variance form requires `summary`.
  pub fn optimize(
    &self,
    method: OptimizerMethod,
    returns: &ReturnMatrix,
    summary: Option<&VolatilitySummary>,
  ) -> Result<OptimizationResult> {
    match method {
      OptimizerMethod::SharpeVariance => {
        let summary = summary.ok_or_else(|| {
          Error::InvalidInput("the variance form needs a volatility summary".to_string())
        })?;
        self.optimize_sharpe(returns, summary)
      }
      OptimizerMethod::SharpeCvar => self.optimize_sharpe_cvar(returns),
    }
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use chrono::NaiveDate;
  use ndarray::Array2;

  use super::*;
  use crate::data::series::daily_dates;

  const SAMPLE: [f64; 30] = [
    0.01, -0.02, 0.015, 0.004, -0.006, 0.012, -0.003, 0.008, -0.011, 0.007, 0.002, -0.009, 0.013,
    -0.004, 0.006, 0.001, -0.014, 0.009, 0.003, -0.002, 0.011, -0.007, 0.005, 0.004, -0.001,
    0.010, -0.008, 0.006, 0.002, -0.005,
  ];

  fn two_asset_window() -> ReturnMatrix {
    let values = Array2::from_shape_fn((30, 2), |(t, i)| {
      if i == 0 { SAMPLE[t] } else { SAMPLE[29 - t] }
    });
    let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    ReturnMatrix::new(daily_dates(start, 30), vec!["A".into(), "B".into()], values).unwrap()
  }

  fn seeded() -> AllocationEngine {
    AllocationEngine::new(OptimizerSettings {
      seed: Some(11),
      ..OptimizerSettings::default()
    })
  }

  #[test]
  fn equal_volatility_equal_mean_assets_split_evenly() {
    let summary = VolatilitySummary::new()
      .with("A", 0.02)
      .and_then(|s| s.with("B", 0.02))
      .unwrap();

    let res = seeded().optimize_sharpe(&two_asset_window(), &summary).unwrap();

    assert_eq!(res.asset_order, vec!["A".to_string(), "B".to_string()]);
    assert_abs_diff_eq!(res.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(res.weights[0], 0.5, epsilon = 1e-3);
    assert_abs_diff_eq!(res.weights[1], 0.5, epsilon = 1e-3);
    assert!(res.achieved_ratio > 0.0);
  }

  #[test]
  fn missing_volatility_aborts_request() {
    let summary = VolatilitySummary::new().with("A", 0.02).unwrap();
    let err = seeded().optimize_sharpe(&two_asset_window(), &summary).unwrap_err();
    assert!(matches!(err, Error::MissingVolatility(a) if a == "B"));
  }

  #[test]
  fn cvar_form_respects_constraints() {
    let res = seeded().optimize_sharpe_cvar(&two_asset_window()).unwrap();

    assert_abs_diff_eq!(res.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
    assert!(res.weights.iter().all(|w| (-1.0..=1.0).contains(w)));
    assert!(res.risk >= 0.0);
  }

  #[test]
  fn single_observation_is_data_unavailable() {
    let window = two_asset_window().tail(1);
    let err = seeded().optimize_sharpe_cvar(&window).unwrap_err();
    assert!(matches!(err, Error::DataUnavailable { .. }));
  }

  #[test]
  fn variance_dispatch_requires_summary() {
    let err = seeded()
      .optimize(OptimizerMethod::SharpeVariance, &two_asset_window(), None)
      .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
  }

  #[test]
  fn trailing_window_takes_most_recent_rows() {
    let engine = AllocationEngine::new(OptimizerSettings {
      trailing_window: 10,
      ..OptimizerSettings::default()
    });
    let full = two_asset_window();
    let window = engine.trailing_window(&full).unwrap();

    assert_eq!(window.len(), 10);
    assert_eq!(window.dates(), &full.dates()[20..]);
  }
}
