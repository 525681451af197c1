//! # volalloc
//!
//! $$
//! r_{i,t}\ \xrightarrow{\ \text{GARCH}\ }\ \hat\sigma_{i,t}\ \xrightarrow{\ \Sigma\ \text{or}\ \text{CVaR}\ }\ \mathbf w^\*
//! $$
//!
//! Per-asset conditional-volatility forecasting and risk-adjusted allocation
//! under a variance or a historical tail-loss risk measure.

pub mod config;
pub mod data;
pub mod error;
pub mod portfolio;
pub mod report;
pub mod store;
pub mod volatility;

pub use error::Error;
pub use error::Result;
