//! # Volatility
//!
//! $$
//! \sigma_t^2=\omega+\sum_{i=1}^{q}\alpha_i\varepsilon_{t-i}^2+\sum_{j=1}^{p}\beta_j\sigma_{t-j}^2
//! $$
//!
//! Conditional-volatility models, batch training and forecast diagnostics.

pub mod estimator;
pub mod evaluate;
pub mod garch;
pub mod summary;

pub use estimator::BatchReport;
pub use estimator::VolatilityEstimator;
pub use evaluate::AssetEvaluation;
pub use evaluate::ForecastMetrics;
pub use evaluate::evaluate_all;
pub use evaluate::evaluate_forecast;
pub use evaluate::realized_volatility;
pub use garch::GarchFit;
pub use garch::GarchModel;
pub use garch::GarchParams;
pub use summary::VolatilityEstimate;
pub use summary::VolatilitySummary;
