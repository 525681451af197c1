//! # Risk Measures
//!
//! $$
//! \sigma_p(\mathbf w)=\sqrt{\mathbf w^\top\Sigma\mathbf w},\qquad
//! \mathrm{CVaR}_\alpha(\mathbf w)=\Bigl|\mathbb E\bigl[r_p \mid r_p\le q_\alpha(r_p)\bigr]\Bigr|
//! $$
//!
//! Pluggable denominators of the risk-adjusted ratio.

use ndarray::Array1;
use ndarray::Array2;

use super::covariance::CovarianceMatrix;

/// Smallest risk value treated as defined.
pub const MIN_RISK: f64 = 1e-12;

/// Risk functional of a weight vector.
///
/// `None` marks a candidate where the functional is undefined (zero, empty
/// tail, non-finite); the optimizer ranks such candidates below any finite one.
pub trait RiskMeasure: Sync {
  fn name(&self) -> &'static str;

  fn risk(&self, weights: &Array1<f64>) -> Option<f64>;
}

fn defined(value: f64) -> Option<f64> {
  (value.is_finite() && value > MIN_RISK).then_some(value)
}

/// Portfolio standard deviation under a covariance matrix.
#[derive(Clone, Debug)]
pub struct VarianceRisk {
  cov: CovarianceMatrix,
}

impl VarianceRisk {
  pub fn new(cov: CovarianceMatrix) -> Self {
    Self { cov }
  }

  pub fn covariance(&self) -> &CovarianceMatrix {
    &self.cov
  }
}

impl RiskMeasure for VarianceRisk {
  fn name(&self) -> &'static str {
    "volatility"
  }

  fn risk(&self, weights: &Array1<f64>) -> Option<f64> {
    let var = self.cov.portfolio_variance(weights);
    if var < 0.0 {
      return None;
    }
    defined(var.sqrt())
  }
}

/// Historical CVaR of the portfolio return over a sample window.
#[derive(Clone, Debug)]
pub struct CvarRisk {
  window: Array2<f64>,
  alpha: f64,
}

impl CvarRisk {
  pub fn new(window: Array2<f64>, alpha: f64) -> Self {
    Self { window, alpha }
  }

  pub fn alpha(&self) -> f64 {
    self.alpha
  }
}

impl RiskMeasure for CvarRisk {
  fn name(&self) -> &'static str {
    "cvar"
  }

  fn risk(&self, weights: &Array1<f64>) -> Option<f64> {
    let port = self.window.dot(weights);
    empirical_cvar(port.as_slice()?, self.alpha).and_then(defined)
  }
}

/// `q`-quantile with linear interpolation between order statistics.
///
/// Sorts `xs` in place; `None` for an empty slice.
pub fn quantile(xs: &mut [f64], q: f64) -> Option<f64> {
  if xs.is_empty() {
    return None;
  }
  xs.sort_by(|a, b| a.total_cmp(b));

  let h = (xs.len() - 1) as f64 * q.clamp(0.0, 1.0);
  let lo = h.floor() as usize;
  let hi = (lo + 1).min(xs.len() - 1);
  Some(xs[lo] + (h - lo as f64) * (xs[hi] - xs[lo]))
}

/// Absolute mean of the returns at or below the `alpha`-quantile.
///
/// `None` when the sample or its tail is empty.
pub fn empirical_cvar(returns: &[f64], alpha: f64) -> Option<f64> {
  let mut sorted = returns.to_vec();
  let var = quantile(&mut sorted, alpha)?;

  let tail: Vec<f64> = sorted.into_iter().take_while(|r| *r <= var).collect();
  if tail.is_empty() {
    return None;
  }
  Some((tail.iter().sum::<f64>() / tail.len() as f64).abs())
}
