//! # Report
//!
//! $$
//! V_t=\prod_{s\le t}\bigl(1+\mathbf w^\top r_s\bigr)
//! $$
//!
//! Presentation of allocations and batch outcomes as JSON or text tables.

use chrono::NaiveDate;
use ndarray::Array1;
use prettytable::Table;
use prettytable::format;
use prettytable::row;
use serde::Serialize;

use crate::data::ReturnMatrix;
use crate::error::Error;
use crate::error::Result;
use crate::portfolio::OptimizationResult;
use crate::portfolio::OptimizerMethod;
use crate::volatility::AssetEvaluation;
use crate::volatility::BatchReport;
use crate::volatility::ForecastMetrics;
use crate::volatility::VolatilityEstimate;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AssetWeight {
  pub asset: String,
  pub weight: f64,
}

/// Optimal allocation with labelled weights and its in-sample path.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AllocationReport {
  pub method: OptimizerMethod,
  pub assets: Vec<AssetWeight>,
  pub achieved_ratio: f64,
  pub expected_return: f64,
  pub risk: f64,
  /// Cumulative growth of one unit invested over the trailing window.
  pub cumulative: Vec<(NaiveDate, f64)>,
}

impl AllocationReport {
  /// Assemble `result`, replaying its weights over `window`.
  pub fn new(
    method: OptimizerMethod,
    result: &OptimizationResult,
    window: &ReturnMatrix,
  ) -> Result<Self> {
    if window.assets() != result.asset_order.as_slice() {
      return Err(Error::InvalidInput(
        "window columns differ from the optimized asset order".to_string(),
      ));
    }

    let weights = Array1::from(result.weights.clone());
    let mut value = 1.0;
    let cumulative = window
      .dates()
      .iter()
      .zip(window.portfolio_returns(&weights))
      .map(|(date, r)| {
        value *= 1.0 + r;
        (*date, value)
      })
      .collect();

    Ok(Self {
      method,
      assets: result
        .asset_order
        .iter()
        .zip(&result.weights)
        .map(|(asset, weight)| AssetWeight {
          asset: asset.clone(),
          weight: *weight,
        })
        .collect(),
      achieved_ratio: result.achieved_ratio,
      expected_return: result.expected_return,
      risk: result.risk,
      cumulative,
    })
  }

  /// Growth over the whole window, `V_T - 1`.
  pub fn total_return(&self) -> Option<f64> {
    self.cumulative.last().map(|(_, v)| v - 1.0)
  }

  pub fn table(&self) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(row!["Asset", "Weight"]);
    for w in &self.assets {
      table.add_row(row![w.asset, format!("{:.6}", w.weight)]);
    }
    table.add_row(row!["ratio", format!("{:.6}", self.achieved_ratio)]);
    table.add_row(row!["expected return", format!("{:.6}", self.expected_return)]);
    table.add_row(row!["risk", format!("{:.6}", self.risk)]);
    if let Some(total) = self.total_return() {
      table.add_row(row!["window return", format!("{:.6}", total)]);
    }
    table
  }
}

/// One line of a training batch.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrainingRow {
  pub asset: String,
  pub observations: Option<usize>,
  pub last_volatility: Option<f64>,
  pub error: Option<String>,
}

pub fn training_rows(report: &BatchReport<VolatilityEstimate>) -> Vec<TrainingRow> {
  report
    .entries
    .iter()
    .map(|(asset, outcome)| match outcome {
      Ok(estimate) => TrainingRow {
        asset: asset.clone(),
        observations: Some(estimate.len()),
        last_volatility: estimate.series().values().last().copied(),
        error: None,
      },
      Err(e) => TrainingRow {
        asset: asset.clone(),
        observations: None,
        last_volatility: None,
        error: Some(format!("{}: {e}", e.kind())),
      },
    })
    .collect()
}

pub fn training_table(rows: &[TrainingRow]) -> Table {
  let mut table = Table::new();
  table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
  table.set_titles(row!["Asset", "Observations", "Last volatility", "Error"]);
  for r in rows {
    table.add_row(row![
      r.asset,
      r.observations.map(|n| n.to_string()).unwrap_or_default(),
      r.last_volatility.map(|v| format!("{v:.6}")).unwrap_or_default(),
      r.error.clone().unwrap_or_default()
    ]);
  }
  table
}

/// One line of an evaluation batch.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EvaluationRow {
  pub asset: String,
  pub metrics: Option<ForecastMetrics>,
  pub error: Option<String>,
}

pub fn evaluation_rows(evaluations: &[AssetEvaluation]) -> Vec<EvaluationRow> {
  evaluations
    .iter()
    .map(|e| EvaluationRow {
      asset: e.asset.clone(),
      metrics: e.metrics().copied(),
      error: e
        .outcome
        .as_ref()
        .err()
        .map(|err| format!("{}: {err}", err.kind())),
    })
    .collect()
}

pub fn evaluation_table(rows: &[EvaluationRow]) -> Table {
  let mut table = Table::new();
  table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
  table.set_titles(row!["Asset", "N", "MSE", "RMSE", "MAE", "Error"]);
  for r in rows {
    match &r.metrics {
      Some(m) => table.add_row(row![
        r.asset,
        m.observations,
        format!("{:.3e}", m.mse),
        format!("{:.6}", m.rmse),
        format!("{:.6}", m.mae),
        ""
      ]),
      None => table.add_row(row![
        r.asset,
        "",
        "",
        "",
        "",
        r.error.clone().unwrap_or_default()
      ]),
    };
  }
  table
}
