//! # Portfolio
//!
//! $$
//! \max_{\mathbf w}\ \frac{\mathbf w^\top\mu-r_f}{\rho(\mathbf w)},\qquad \sum_i w_i=1,\ \ w_i\in[l,u]
//! $$
//!
//! Covariance construction, risk functionals and the ratio optimizers.

pub mod covariance;
pub mod engine;
pub mod optimizer;
pub mod risk;
pub mod types;

pub use covariance::CovarianceMatrix;
pub use covariance::build_covariance;
pub use covariance::correlation_matrix;
pub use engine::AllocationEngine;
pub use optimizer::RatioObjective;
pub use optimizer::RatioOptimizer;
pub use optimizer::project_onto_budget;
pub use risk::CvarRisk;
pub use risk::RiskMeasure;
pub use risk::VarianceRisk;
pub use risk::empirical_cvar;
pub use risk::quantile;
pub use types::OptimizationResult;
pub use types::OptimizerMethod;
