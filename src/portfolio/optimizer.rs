//! # Ratio Optimizer
//!
//! $$
//! \min_{\mathbf w}\ -\frac{\mathbf w^\top\mu-r_f}{\rho(\mathbf w)}
//! \quad\text{s.t.}\quad \mathbf 1^\top\mathbf w=1,\ \ l\le w_i\le u
//! $$
//!
//! One constrained Nelder-Mead driver shared by every risk functional.

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::solver::neldermead::NelderMead;
use ndarray::Array1;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use tracing::debug;

use super::risk::RiskMeasure;
use super::types::OptimizationResult;
use crate::config::InitPolicy;
use crate::config::OptimizerSettings;
use crate::error::Error;
use crate::error::Result;

const PROJECTION_STEPS: usize = 200;
const SIMPLEX_SCALE: f64 = 0.1;

/// Negative risk-adjusted ratio of a weight vector.
#[derive(Clone, Debug)]
pub struct RatioObjective<M> {
  mu: Array1<f64>,
  risk_free: f64,
  measure: M,
}

impl<M: RiskMeasure> RatioObjective<M> {
  pub fn new(mu: Array1<f64>, risk_free: f64, measure: M) -> Self {
    Self {
      mu,
      risk_free,
      measure,
    }
  }

  pub fn mu(&self) -> &Array1<f64> {
    &self.mu
  }

  pub fn measure(&self) -> &M {
    &self.measure
  }

  /// `(wᵀμ - r_f) / ρ(w)`
  pub fn ratio(&self, weights: &Array1<f64>) -> Result<f64> {
    let risk = self.measure.risk(weights).ok_or_else(|| {
      Error::OptimizationDegenerate(format!("{} undefined at {weights}", self.measure.name()))
    })?;
    let ratio = (weights.dot(&self.mu) - self.risk_free) / risk;
    if !ratio.is_finite() {
      return Err(Error::OptimizationDegenerate(format!(
        "non-finite ratio at {weights}"
      )));
    }
    Ok(ratio)
  }

  /// Value minimised by the solver.
  pub fn evaluate(&self, weights: &Array1<f64>) -> Result<f64> {
    self.ratio(weights).map(|r| -r)
  }
}

/// Euclidean projection onto `{w : Σw = 1, lower ≤ w_i ≤ upper}`.
///
/// The projection is `w_i = clamp(x_i - τ, lower, upper)` with the shift `τ`
/// found by bisection. Requires `n·lower ≤ 1 ≤ n·upper`.
pub fn project_onto_budget(x: &[f64], lower: f64, upper: f64) -> Array1<f64> {
  let shifted_sum = |tau: f64| -> f64 { x.iter().map(|v| (v - tau).clamp(lower, upper)).sum() };

  // every coordinate at `upper` below `lo`, at `lower` above `hi`
  let mut lo = x.iter().copied().fold(f64::INFINITY, f64::min) - upper;
  let mut hi = x.iter().copied().fold(f64::NEG_INFINITY, f64::max) - lower;

  for _ in 0..PROJECTION_STEPS {
    let mid = 0.5 * (lo + hi);
    if shifted_sum(mid) > 1.0 {
      lo = mid;
    } else {
      hi = mid;
    }
    if hi - lo <= f64::EPSILON * (1.0 + mid.abs()) {
      break;
    }
  }

  let tau = 0.5 * (lo + hi);
  x.iter().map(|v| (v - tau).clamp(lower, upper)).collect()
}

struct RatioCost<'a, M> {
  objective: &'a RatioObjective<M>,
  lower: f64,
  upper: f64,
}

impl<M: RiskMeasure> CostFunction for RatioCost<'_, M> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    if x.iter().any(|v| !v.is_finite()) {
      return Ok(f64::INFINITY);
    }
    let w = project_onto_budget(x, self.lower, self.upper);
    Ok(self.objective.evaluate(&w).unwrap_or(f64::INFINITY))
  }
}

/// Box- and budget-constrained maximiser of a [`RatioObjective`].
#[derive(Clone, Debug)]
pub struct RatioOptimizer {
  lower_bound: f64,
  upper_bound: f64,
  init: InitPolicy,
  seed: Option<u64>,
  restarts: usize,
  max_iters: u64,
  sd_tolerance: f64,
}

impl Default for RatioOptimizer {
  fn default() -> Self {
    Self::from_settings(&OptimizerSettings::default())
  }
}

impl RatioOptimizer {
  pub fn from_settings(settings: &OptimizerSettings) -> Self {
    Self {
      lower_bound: settings.weight_lower_bound,
      upper_bound: settings.weight_upper_bound,
      init: settings.init,
      seed: settings.seed,
      restarts: settings.restarts,
      max_iters: settings.max_iters,
      sd_tolerance: settings.sd_tolerance,
    }
  }

  pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
    self.lower_bound = lower;
    self.upper_bound = upper;
    self
  }

  pub fn with_init(mut self, init: InitPolicy) -> Self {
    self.init = init;
    self
  }

  pub fn with_seed(mut self, seed: u64) -> Self {
    self.seed = Some(seed);
    self
  }

  pub fn with_restarts(mut self, restarts: usize) -> Self {
    self.restarts = restarts;
    self
  }

  pub fn bounds(&self) -> (f64, f64) {
    (self.lower_bound, self.upper_bound)
  }

  fn check_feasible(&self, n: usize) -> Result<()> {
    if n == 0 {
      return Err(Error::InvalidInput("no assets to allocate".to_string()));
    }
    let (lb, ub) = self.bounds();
    if !(lb.is_finite() && ub.is_finite() && lb <= ub) {
      return Err(Error::InvalidInput(format!("weight bounds [{lb}, {ub}] are empty")));
    }
    let n = n as f64;
    if n * lb > 1.0 || n * ub < 1.0 {
      return Err(Error::InvalidInput(format!(
        "weights in [{lb}, {ub}] cannot sum to 1 over {n} assets"
      )));
    }
    if self.restarts == 0 {
      return Err(Error::InvalidInput("restarts must be at least 1".to_string()));
    }
    Ok(())
  }

  /// Uniform draw over the bounds scaled by its absolute sum.
  fn random_start<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<f64> {
    let (lb, ub) = self.bounds();
    let raw: Vec<f64> = (0..n).map(|_| rng.gen_range(lb..=ub)).collect();
    let abs_sum: f64 = raw.iter().map(|v| v.abs()).sum();

    if abs_sum < 1e-15 {
      vec![1.0 / n as f64; n]
    } else {
      raw.iter().map(|v| v / abs_sum).collect()
    }
  }

  /// Starting vectors of every restart, drawn in order from one generator.
  ///
  /// Under [`InitPolicy::Equal`] the first restart starts at `1/n`.
  pub fn starts(&self, n: usize) -> Vec<Vec<f64>> {
    let mut rng = match self.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };

    (0..self.restarts.max(1))
      .map(|k| match (self.init, k) {
        (InitPolicy::Equal, 0) => vec![1.0 / n as f64; n],
        _ => self.random_start(n, &mut rng),
      })
      .collect()
  }

  fn simplex(&self, x0: &[f64]) -> Vec<Vec<f64>> {
    let step = SIMPLEX_SCALE * (self.upper_bound - self.lower_bound).max(1e-3);
    let mut simplex = Vec::with_capacity(x0.len() + 1);
    simplex.push(x0.to_vec());
    for i in 0..x0.len() {
      let mut point = x0.to_vec();
      point[i] += step;
      simplex.push(point);
    }
    simplex
  }

  /// One Nelder-Mead run; `None` when no finite candidate was found.
  fn local_search<M: RiskMeasure>(
    &self,
    objective: &RatioObjective<M>,
    start: &[f64],
  ) -> Option<(Vec<f64>, f64)> {
    let cost = RatioCost {
      objective,
      lower: self.lower_bound,
      upper: self.upper_bound,
    };

    let solver = NelderMead::new(self.simplex(start))
      .with_sd_tolerance(self.sd_tolerance)
      .ok()?;
    let res = Executor::new(cost, solver)
      .configure(|state| state.max_iters(self.max_iters))
      .run()
      .ok()?;

    let best_cost = res.state.best_cost;
    let best_x = res.state.best_param?;
    best_cost.is_finite().then_some((best_x, best_cost))
  }

  /// Maximise `objective` over the feasible set, labelling weights with `assets`.
  pub fn maximize<M: RiskMeasure>(
    &self,
    objective: &RatioObjective<M>,
    assets: &[String],
  ) -> Result<OptimizationResult> {
    let n = objective.mu().len();
    if assets.len() != n {
      return Err(Error::InvalidInput(format!(
        "{} asset labels for {n} expected returns",
        assets.len()
      )));
    }
    self.check_feasible(n)?;

    let starts = self.starts(n);
    let runs: Vec<Option<(Vec<f64>, f64)>> = starts
      .par_iter()
      .map(|x0| self.local_search(objective, x0))
      .collect();

    let mut best: Option<(usize, Vec<f64>, f64)> = None;
    for (k, run) in runs.into_iter().enumerate() {
      match run {
        Some((x, c)) => {
          debug!(restart = k, objective = c, "local search finished");
          if best.as_ref().map_or(true, |(_, _, b)| c < *b) {
            best = Some((k, x, c));
          }
        }
        None => debug!(restart = k, "local search found no finite candidate"),
      }
    }

    let (restart, x, _) = best.ok_or_else(|| {
      Error::OptimizationFailure(format!(
        "no feasible weights with a finite {} ratio after {} restart(s)",
        objective.measure().name(),
        starts.len()
      ))
    })?;

    let weights = project_onto_budget(&x, self.lower_bound, self.upper_bound);
    let achieved_ratio = objective
      .ratio(&weights)
      .map_err(|e| Error::OptimizationFailure(e.to_string()))?;
    let risk = objective.measure().risk(&weights).unwrap_or(f64::NAN);

    debug!(restart, achieved_ratio, "selected optimum");

    Ok(OptimizationResult {
      expected_return: weights.dot(objective.mu()),
      weights: weights.to_vec(),
      achieved_ratio,
      asset_order: assets.to_vec(),
      risk,
    })
  }
}
