//! # Portfolio Types
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}} \frac{\mathbf w^\top\mu-r_f}{\rho(\mathbf w)}
//! $$
//!
//! Shared enums and result containers for the ratio optimizers.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;

/// Supported risk-adjusted ratio forms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptimizerMethod {
  /// Excess return over portfolio standard deviation from forecast volatilities.
  SharpeVariance,
  /// Excess return over historical CVaR of the trailing window.
  SharpeCvar,
}

impl OptimizerMethod {
  pub fn label(&self) -> &'static str {
    match self {
      Self::SharpeVariance => "sharpe",
      Self::SharpeCvar => "sharpe-cvar",
    }
  }
}

impl fmt::Display for OptimizerMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

impl FromStr for OptimizerMethod {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "sharpe" | "sharpe-variance" | "variance" => Ok(Self::SharpeVariance),
      "sharpe-cvar" | "cvar" => Ok(Self::SharpeCvar),
      other => Err(Error::InvalidInput(format!("unknown optimizer method '{other}'"))),
    }
  }
}

/// Output of a ratio optimization run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct OptimizationResult {
  /// Final weights, ordered as `asset_order`.
  pub weights: Vec<f64>,
  /// Maximised ratio `(wᵀμ - r_f) / ρ(w)`.
  pub achieved_ratio: f64,
  pub asset_order: Vec<String>,
  /// `wᵀμ`
  pub expected_return: f64,
  /// Risk functional at the optimum.
  pub risk: f64,
}

impl OptimizationResult {
  pub fn weight(&self, asset: &str) -> Option<f64> {
    self
      .asset_order
      .iter()
      .position(|a| a == asset)
      .and_then(|i| self.weights.get(i).copied())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn method_parses_cli_names() {
    assert_eq!("sharpe".parse::<OptimizerMethod>().unwrap(), OptimizerMethod::SharpeVariance);
    assert_eq!("Sharpe-CVaR".parse::<OptimizerMethod>().unwrap(), OptimizerMethod::SharpeCvar);
    assert!("hrp".parse::<OptimizerMethod>().is_err());
  }
}
