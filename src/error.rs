//! # Error
//!
//! $$
//! \text{Result}\langle T\rangle = T \;\vert\; \text{Error}
//! $$
//!
//! Error taxonomy shared by the estimator, the cache and both optimizers.

use thiserror::Error;

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while fitting volatility models or solving for weights.
#[derive(Debug, Error)]
pub enum Error {
  /// A required return series or cache entry is missing, empty or unreadable.
  #[error("data unavailable for {asset}: {reason}")]
  DataUnavailable {
    /// Asset (or cache key) that was requested.
    asset: String,
    /// Why the data could not be used.
    reason: String,
  },

  /// No model order is configured for the asset.
  #[error("no model order configured for {0}")]
  ConfigurationMissing(String),

  /// The likelihood maximisation did not converge.
  #[error("model fit failed for {asset}: {reason}")]
  FitFailure {
    /// Asset being fitted.
    asset: String,
    /// Solver diagnostic.
    reason: String,
  },

  /// Realized and predicted series share no dates after alignment.
  #[error("no overlapping observations for {0} after alignment")]
  AlignmentEmpty(String),

  /// Covariance build is missing the scalar volatility of an asset.
  #[error("missing volatility forecast for {0}")]
  MissingVolatility(String),

  /// Objective evaluated to a non-finite value at a candidate.
  #[error("objective is undefined at candidate: {0}")]
  OptimizationDegenerate(String),

  /// The solver never reached a feasible point with a finite objective.
  #[error("optimization failed: {0}")]
  OptimizationFailure(String),

  /// Inputs violate a structural precondition.
  #[error("invalid input: {0}")]
  InvalidInput(String),

  /// IO error
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// CSV error
  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  /// Configuration parse error
  #[error("configuration error: {0}")]
  Config(#[from] serde_json::Error),
}

impl Error {
  pub(crate) fn unavailable(asset: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::DataUnavailable {
      asset: asset.into(),
      reason: reason.into(),
    }
  }

  pub(crate) fn fit_failure(asset: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::FitFailure {
      asset: asset.into(),
      reason: reason.into(),
    }
  }

  /// Short machine-friendly label of the variant, used in reports.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::DataUnavailable { .. } => "DataUnavailable",
      Self::ConfigurationMissing(_) => "ConfigurationMissing",
      Self::FitFailure { .. } => "FitFailure",
      Self::AlignmentEmpty(_) => "AlignmentEmpty",
      Self::MissingVolatility(_) => "MissingVolatility",
      Self::OptimizationDegenerate(_) => "OptimizationDegenerate",
      Self::OptimizationFailure(_) => "OptimizationFailure",
      Self::InvalidInput(_) => "InvalidInput",
      Self::Io(_) => "Io",
      Self::Csv(_) => "Csv",
      Self::Config(_) => "Config",
    }
  }
}
