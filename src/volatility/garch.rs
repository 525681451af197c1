//! # GARCH
//!
//! $$
//! \sigma_t^2=\omega+\sum_{i=1}^{q}\alpha_i\varepsilon_{t-i}^2+\sum_{j=1}^{p}\beta_j\sigma_{t-j}^2,
//! \qquad \varepsilon_t=r_t-\mu
//! $$
//!
//! Gaussian quasi-maximum-likelihood fit of a GARCH(p, q) conditional variance.

use std::f64::consts::PI;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::core::State;
use argmin::core::TerminationReason;
use argmin::solver::neldermead::NelderMead;
use chrono::NaiveDate;
use rand::Rng;
use rand_distr::Distribution;
use rand_distr::StandardNormal;
use tracing::debug;

use crate::config::GarchConfig;
use crate::config::GarchOrder;
use crate::data::ReturnSeries;
use crate::data::TimeSeries;
use crate::error::Error;
use crate::error::Result;
use crate::volatility::VolatilityEstimate;

const BACKCAST_DECAY: f64 = 0.94;
const BACKCAST_LEN: usize = 75;
const START_ALPHA: f64 = 0.1;
const START_BETA: f64 = 0.85;
const MAX_EXPONENT: f64 = 50.0;

/// Fitted (or hypothesised) GARCH parameters.
///
/// `alpha` holds the `q` squared-residual coefficients, `beta` the `p`
/// lagged-variance coefficients.
#[derive(Clone, Debug, PartialEq)]
pub struct GarchParams {
  pub mu: f64,
  pub omega: f64,
  pub alpha: Vec<f64>,
  pub beta: Vec<f64>,
}

impl GarchParams {
  /// `Σα + Σβ`
  pub fn persistence(&self) -> f64 {
    self.alpha.iter().sum::<f64>() + self.beta.iter().sum::<f64>()
  }

  /// `ω / (1 - Σα - Σβ)`, `None` when the process is not covariance stationary.
  pub fn unconditional_variance(&self) -> Option<f64> {
    let denom = 1.0 - self.persistence();
    (denom > 0.0).then(|| self.omega / denom)
  }

  /// Conditional variance path for a residual series.
  pub fn filter(&self, residuals: &[f64]) -> Vec<f64> {
    let backcast = backcast(residuals);
    let mut sigma2 = vec![0.0; residuals.len()];

    for t in 0..residuals.len() {
      let mut var_t = self.omega;
      for (i, a) in self.alpha.iter().enumerate() {
        let lag = i + 1;
        let e2 = if t >= lag {
          residuals[t - lag].powi(2)
        } else {
          backcast
        };
        var_t += a * e2;
      }
      for (j, b) in self.beta.iter().enumerate() {
        let lag = j + 1;
        let s2 = if t >= lag { sigma2[t - lag] } else { backcast };
        var_t += b * s2;
      }
      sigma2[t] = var_t;
    }

    sigma2
  }

  /// Gaussian negative log-likelihood of `returns`; `+inf` when undefined.
  pub fn neg_log_likelihood(&self, returns: &[f64]) -> f64 {
    let residuals: Vec<f64> = returns.iter().map(|r| r - self.mu).collect();
    let sigma2 = self.filter(&residuals);

    let mut nll = 0.0;
    for (e, s2) in residuals.iter().zip(&sigma2) {
      if !(*s2 > 0.0) {
        return f64::INFINITY;
      }
      nll += (2.0 * PI).ln() + s2.ln() + e * e / s2;
    }
    nll *= 0.5;

    if nll.is_finite() {
      nll
    } else {
      f64::INFINITY
    }
  }

  /// Draw a path of `n` returns, starting from the unconditional variance.
  pub fn simulate<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<f64> {
    let start = self
      .unconditional_variance()
      .unwrap_or(self.omega / 1e-8);
    let mut eps = vec![0.0_f64; n];
    let mut sigma2 = vec![0.0; n];
    let mut out = vec![0.0; n];

    for t in 0..n {
      let mut var_t = self.omega;
      for (i, a) in self.alpha.iter().enumerate() {
        var_t += a * if t > i { eps[t - i - 1].powi(2) } else { start };
      }
      for (j, b) in self.beta.iter().enumerate() {
        var_t += b * if t > j { sigma2[t - j - 1] } else { start };
      }
      sigma2[t] = var_t;

      let z: f64 = StandardNormal.sample(rng);
      eps[t] = var_t.sqrt() * z;
      out[t] = self.mu + eps[t];
    }

    out
  }
}

/// Exponentially weighted mean of the first squared residuals.
fn backcast(residuals: &[f64]) -> f64 {
  let tau = residuals.len().min(BACKCAST_LEN);
  if tau == 0 {
    return 0.0;
  }

  let mut num = 0.0;
  let mut den = 0.0;
  let mut w = 1.0;
  for e in &residuals[..tau] {
    num += w * e * e;
    den += w;
    w *= BACKCAST_DECAY;
  }
  num / den
}

/// Maps an unconstrained vector onto the stationary parameter region.
#[derive(Clone, Debug)]
struct Transform {
  order: GarchOrder,
  mean_scale: f64,
}

impl Transform {
  fn offset(&self) -> usize {
    usize::from(self.order.constant)
  }

  fn to_params(&self, x: &[f64]) -> GarchParams {
    let k = self.offset();
    let mu = if self.order.constant {
      x[0] * self.mean_scale
    } else {
      0.0
    };
    let omega = x[k].clamp(-MAX_EXPONENT, MAX_EXPONENT).exp();

    let raw: Vec<f64> = x[k + 1..]
      .iter()
      .map(|v| v.clamp(-MAX_EXPONENT, MAX_EXPONENT).exp())
      .collect();
    let denom = 1.0 + raw.iter().sum::<f64>();
    let coeffs: Vec<f64> = raw.iter().map(|e| e / denom).collect();

    GarchParams {
      mu,
      omega,
      alpha: coeffs[..self.order.q].to_vec(),
      beta: coeffs[self.order.q..].to_vec(),
    }
  }

  fn to_unconstrained(&self, params: &GarchParams) -> Vec<f64> {
    let mut x = Vec::with_capacity(self.order.n_params());
    if self.order.constant {
      x.push(params.mu / self.mean_scale);
    }
    x.push(params.omega.max(f64::MIN_POSITIVE).ln());

    let slack = (1.0 - params.persistence()).max(1e-12);
    x.extend(
      params
        .alpha
        .iter()
        .chain(&params.beta)
        .map(|c| (c.max(1e-12) / slack).ln()),
    );
    x
  }
}

struct GarchCost<'a> {
  returns: &'a [f64],
  transform: Transform,
  started: Instant,
  time_limit: Option<Duration>,
  expired: &'a AtomicBool,
}

impl CostFunction for GarchCost<'_> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    // past the limit every point is rejected so the simplex winds down
    if let Some(limit) = self.time_limit {
      if self.expired.load(Ordering::Relaxed) || self.started.elapsed() >= limit {
        self.expired.store(true, Ordering::Relaxed);
        return Ok(f64::INFINITY);
      }
    }
    Ok(self.transform.to_params(x).neg_log_likelihood(self.returns))
  }
}

/// Result of a successful likelihood maximisation.
#[derive(Clone, Debug)]
pub struct GarchFit {
  order: GarchOrder,
  params: GarchParams,
  log_likelihood: f64,
  iterations: u64,
  dates: Vec<NaiveDate>,
  residuals: Vec<f64>,
  sigma2: Vec<f64>,
}

impl GarchFit {
  pub fn order(&self) -> GarchOrder {
    self.order
  }

  pub fn params(&self) -> &GarchParams {
    &self.params
  }

  pub fn log_likelihood(&self) -> f64 {
    self.log_likelihood
  }

  pub fn iterations(&self) -> u64 {
    self.iterations
  }

  /// Conditional variance at each fitting date.
  pub fn conditional_variance(&self) -> &[f64] {
    &self.sigma2
  }

  /// Conditional standard deviation at each fitting date.
  pub fn conditional_volatility(&self) -> Result<VolatilityEstimate> {
    let vol = self.sigma2.iter().map(|s2| s2.max(0.0).sqrt()).collect();
    VolatilityEstimate::new(TimeSeries::new(self.dates.clone(), vol)?)
  }

  /// Variance forecasts for horizons `1..=h` beyond the last fitting date.
  pub fn forecast_variance(&self, h: usize) -> Vec<f64> {
    let n = self.sigma2.len();
    let mut e2: Vec<f64> = self.residuals.iter().map(|e| e * e).collect();
    let mut s2 = self.sigma2.clone();
    let mut out = Vec::with_capacity(h);

    for step in 0..h {
      let t = n + step;
      let mut var_t = self.params.omega;
      for (i, a) in self.params.alpha.iter().enumerate() {
        if let Some(v) = t.checked_sub(i + 1).and_then(|k| e2.get(k)) {
          var_t += a * v;
        }
      }
      for (j, b) in self.params.beta.iter().enumerate() {
        if let Some(v) = t.checked_sub(j + 1).and_then(|k| s2.get(k)) {
          var_t += b * v;
        }
      }
      // future squared shocks are replaced by their expectation
      e2.push(var_t);
      s2.push(var_t);
      out.push(var_t);
    }

    out
  }
}

/// GARCH(p, q) estimator for one return series.
#[derive(Clone, Debug)]
pub struct GarchModel {
  order: GarchOrder,
  max_iters: u64,
  sd_tolerance: f64,
  time_limit: Option<Duration>,
}

impl GarchModel {
  pub fn new(order: GarchOrder) -> Self {
    let defaults = GarchConfig::default();
    Self {
      order,
      max_iters: defaults.max_iters,
      sd_tolerance: defaults.sd_tolerance,
      time_limit: None,
    }
  }

  /// Model with the solver limits of `config`.
  pub fn from_config(order: GarchOrder, config: &GarchConfig) -> Self {
    Self {
      order,
      max_iters: config.max_iters,
      sd_tolerance: config.sd_tolerance,
      time_limit: config
        .max_fit_seconds
        .filter(|s| s.is_finite() && *s > 0.0)
        .map(Duration::from_secs_f64),
    }
  }

  pub fn with_max_iters(mut self, max_iters: u64) -> Self {
    self.max_iters = max_iters;
    self
  }

  pub fn with_time_limit(mut self, limit: Duration) -> Self {
    self.time_limit = Some(limit);
    self
  }

  /// Starting point: persistence 0.95 split evenly, variance-targeted `ω`.
  fn start(&self, returns: &[f64]) -> GarchParams {
    let n = returns.len() as f64;
    let mu = if self.order.constant {
      returns.iter().sum::<f64>() / n
    } else {
      0.0
    };
    let var = returns.iter().map(|r| (r - mu).powi(2)).sum::<f64>() / n;

    GarchParams {
      mu,
      omega: (var * (1.0 - START_ALPHA - START_BETA)).max(1e-12),
      alpha: vec![START_ALPHA / self.order.q as f64; self.order.q],
      beta: vec![START_BETA / self.order.p as f64; self.order.p],
    }
  }

  /// Maximise the likelihood of `returns` for `asset`.
  pub fn fit(&self, asset: &str, returns: &ReturnSeries) -> Result<GarchFit> {
    self.order.validate()?;

    let data = returns.values();
    let min_obs = self.order.n_params() + 1;
    if data.len() < min_obs {
      return Err(Error::unavailable(
        asset,
        format!("{} observations, need at least {min_obs}", data.len()),
      ));
    }

    let start = self.start(data);
    let mean_scale = (start.omega / (1.0 - START_ALPHA - START_BETA)).sqrt().max(1e-8);
    let transform = Transform {
      order: self.order,
      mean_scale,
    };

    let x0 = transform.to_unconstrained(&start);
    let mut simplex = Vec::with_capacity(x0.len() + 1);
    simplex.push(x0.clone());
    for i in 0..x0.len() {
      let mut point = x0.clone();
      point[i] += if self.order.constant && i == 0 { 0.1 } else { 0.5 };
      simplex.push(point);
    }

    let expired = AtomicBool::new(false);
    let cost = GarchCost {
      returns: data,
      transform: transform.clone(),
      started: Instant::now(),
      time_limit: self.time_limit,
      expired: &expired,
    };

    let solver = NelderMead::new(simplex)
      .with_sd_tolerance(self.sd_tolerance)
      .map_err(|e| Error::fit_failure(asset, e.to_string()))?;
    let res = Executor::new(cost, solver)
      .configure(|state| state.max_iters(self.max_iters))
      .run()
      .map_err(|e| Error::fit_failure(asset, e.to_string()))?;

    let iterations = res.state.get_iter();
    if expired.load(Ordering::Relaxed) {
      let limit = self.time_limit.unwrap_or_default();
      return Err(Error::fit_failure(
        asset,
        format!("wall-clock limit of {limit:?} exceeded after {iterations} iterations"),
      ));
    }
    if let Some(TerminationReason::MaxItersReached) = res.state.get_termination_reason() {
      return Err(Error::fit_failure(
        asset,
        format!("likelihood did not converge within {iterations} iterations"),
      ));
    }

    let best_cost = res.state.best_cost;
    let best_x = res
      .state
      .best_param
      .ok_or_else(|| Error::fit_failure(asset, "solver returned no parameters"))?;
    if !best_cost.is_finite() {
      return Err(Error::fit_failure(asset, "log-likelihood is not finite"));
    }

    let params = transform.to_params(&best_x);
    let residuals: Vec<f64> = data.iter().map(|r| r - params.mu).collect();
    let sigma2 = params.filter(&residuals);

    debug!(
      asset,
      iterations,
      log_likelihood = -best_cost,
      persistence = params.persistence(),
      "garch fit converged"
    );

    Ok(GarchFit {
      order: self.order,
      params,
      log_likelihood: -best_cost,
      iterations,
      dates: returns.dates().to_vec(),
      residuals,
      sigma2,
    })
  }
}
