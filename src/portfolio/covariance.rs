//! # Covariance Builder
//!
//! $$
//! \Sigma_{ij} = \bar\sigma_i \bar\sigma_j \rho_{ij}
//! $$
//!
//! Forecast volatilities combined with the empirical correlation of a trailing window.

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;

use crate::data::ReturnMatrix;
use crate::error::Result;
use crate::volatility::VolatilitySummary;

fn pearson(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
  let (Some(mx), Some(my)) = (x.mean(), y.mean()) else {
    return 0.0;
  };
  if x.len() < 2 || x.len() != y.len() {
    return 0.0;
  }

  let dx = x.mapv(|a| a - mx);
  let dy = y.mapv(|b| b - my);
  let denom = (dx.dot(&dx) * dy.dot(&dy)).sqrt();
  if denom < 1e-15 {
    return 0.0;
  }
  (dx.dot(&dy) / denom).clamp(-1.0, 1.0)
}

/// Pearson correlation of the columns of `returns`; the diagonal is exactly 1.
pub fn correlation_matrix(returns: &Array2<f64>) -> Array2<f64> {
  let n = returns.ncols();
  let mut corr = Array2::<f64>::eye(n);

  for i in 0..n {
    for j in (i + 1)..n {
      let r = pearson(returns.column(i), returns.column(j));
      corr[[i, j]] = r;
      corr[[j, i]] = r;
    }
  }

  corr
}

/// Square covariance matrix labelled by asset.
#[derive(Clone, Debug, PartialEq)]
pub struct CovarianceMatrix {
  assets: Vec<String>,
  values: Array2<f64>,
}

impl CovarianceMatrix {
  /// `diag(σ) · ρ · diag(σ)`
  pub fn from_parts(assets: Vec<String>, sigmas: &Array1<f64>, corr: &Array2<f64>) -> Self {
    let n = sigmas.len();
    let values = Array2::from_shape_fn((n, n), |(i, j)| sigmas[i] * sigmas[j] * corr[[i, j]]);
    Self { assets, values }
  }

  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  pub fn values(&self) -> &Array2<f64> {
    &self.values
  }

  pub fn dim(&self) -> usize {
    self.assets.len()
  }

  /// `wᵀΣw`
  pub fn portfolio_variance(&self, weights: &Array1<f64>) -> f64 {
    weights.dot(&self.values.dot(weights))
  }

  pub fn is_symmetric(&self, tol: f64) -> bool {
    let n = self.values.nrows();
    (0..n).all(|i| (0..i).all(|j| (self.values[[i, j]] - self.values[[j, i]]).abs() <= tol))
  }
}

/// Covariance of the window's columns with the forecast volatilities on the diagonal.
///
/// Every column needs a summary entry; a gap yields
/// [`Error::MissingVolatility`](crate::error::Error::MissingVolatility) and no matrix.
pub fn build_covariance(
  summary: &VolatilitySummary,
  window: &ReturnMatrix,
) -> Result<CovarianceMatrix> {
  let sigmas = summary.ordered(window.assets())?;
  let corr = correlation_matrix(window.values());
  Ok(CovarianceMatrix::from_parts(
    window.assets().to_vec(),
    &sigmas,
    &corr,
  ))
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use chrono::NaiveDate;
  use ndarray::array;

  use super::*;
  use crate::data::series::daily_dates;
  use crate::error::Error;

  fn window() -> ReturnMatrix {
    let values = array![
      [0.010, -0.020, 0.004],
      [-0.020, 0.010, 0.004],
      [0.015, -0.005, 0.004],
      [0.003, 0.012, 0.004],
      [-0.007, -0.011, 0.004],
      [0.011, 0.002, 0.004],
    ];
    let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    ReturnMatrix::new(
      daily_dates(start, 6),
      vec!["A".into(), "B".into(), "C".into()],
      values,
    )
    .unwrap()
  }

  fn summary() -> VolatilitySummary {
    VolatilitySummary::new()
      .with("A", 0.02)
      .and_then(|s| s.with("B", 0.03))
      .and_then(|s| s.with("C", 0.05))
      .unwrap()
  }

  #[test]
  fn correlation_is_unit_diagonal_and_bounded() {
    let corr = correlation_matrix(window().values());
    for i in 0..3 {
      assert_eq!(corr[[i, i]], 1.0);
      for j in 0..3 {
        assert!(corr[[i, j]].abs() <= 1.0);
      }
    }
    // constant column carries no correlation
    assert_eq!(corr[[0, 2]], 0.0);
    assert_eq!(corr[[1, 2]], 0.0);
  }

  #[test]
  fn covariance_is_symmetric_with_squared_diagonal() {
    let cov = build_covariance(&summary(), &window()).unwrap();

    assert!(cov.is_symmetric(1e-15));
    assert_abs_diff_eq!(cov.values()[[0, 0]], 0.02 * 0.02, epsilon = 1e-15);
    assert_abs_diff_eq!(cov.values()[[1, 1]], 0.03 * 0.03, epsilon = 1e-15);
    assert_abs_diff_eq!(cov.values()[[2, 2]], 0.05 * 0.05, epsilon = 1e-15);
    assert_eq!(cov.assets(), window().assets());
  }

  #[test]
  fn portfolio_variance_matches_quadratic_form() {
    let cov = build_covariance(&summary(), &window()).unwrap();
    let w = array![0.5, 0.3, 0.2];
    let direct: f64 = (0..3)
      .flat_map(|i| (0..3).map(move |j| (i, j)))
      .map(|(i, j)| w[i] * w[j] * cov.values()[[i, j]])
      .sum();
    assert_abs_diff_eq!(cov.portfolio_variance(&w), direct, epsilon = 1e-15);
  }

  #[test]
  fn missing_volatility_aborts_build() {
    let partial = VolatilitySummary::new()
      .with("A", 0.02)
      .and_then(|s| s.with("C", 0.05))
      .unwrap();

    let err = build_covariance(&partial, &window()).unwrap_err();
    assert!(matches!(err, Error::MissingVolatility(a) if a == "B"));
  }
}
