//! # Forecast Evaluation
//!
//! $$
//! \mathrm{MSE}=\frac1n\sum_{t}(\sigma^{\text{real}}_t-\hat\sigma_t)^2,\quad
//! \mathrm{MAE}=\frac1n\sum_{t}|\sigma^{\text{real}}_t-\hat\sigma_t|
//! $$
//!
//! Diagnostic comparison of a volatility forecast against a rolling realized proxy.

use serde::Serialize;
use tracing::info;
use tracing::warn;

use super::summary::VolatilityEstimate;
use crate::data::ReturnMatrix;
use crate::data::ReturnSeries;
use crate::data::TimeSeries;
use crate::data::inner_join;
use crate::error::Error;
use crate::error::Result;
use crate::store::VolatilityStore;

/// Error metrics over the aligned observations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ForecastMetrics {
  /// Number of aligned observations.
  pub observations: usize,
  /// Mean Squared Error
  pub mse: f64,
  /// Root Mean Squared Error
  pub rmse: f64,
  /// Mean Absolute Error
  pub mae: f64,
}

impl ForecastMetrics {
  /// Metrics of two equally long, already aligned slices; `None` when empty.
  pub fn compute(realized: &[f64], predicted: &[f64]) -> Option<Self> {
    if realized.is_empty() || realized.len() != predicted.len() {
      return None;
    }
    let (sq, abs) = realized
      .iter()
      .zip(predicted)
      .fold((0.0_f64, 0.0_f64), |(sq, abs), (r, p)| {
        let d = r - p;
        (sq + d * d, abs + d.abs())
      });
    let n = realized.len() as f64;
    let mse = sq / n;
    Some(Self {
      observations: realized.len(),
      mse,
      rmse: mse.sqrt(),
      mae: abs / n,
    })
  }
}

/// Rolling sample standard deviation of returns.
pub fn realized_volatility(returns: &ReturnSeries, window: usize) -> TimeSeries {
  returns.rolling_std(window)
}

/// Realized and predicted volatility on their common dates.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignedVolatility {
  pub realized: TimeSeries,
  pub predicted: TimeSeries,
}

/// Compare `estimate` with the realized proxy of `returns`.
///
/// Both series are gap-free (forward-filled on load), so alignment is the date
/// intersection. An empty intersection is [`Error::AlignmentEmpty`].
pub fn evaluate_forecast(
  asset: &str,
  estimate: &VolatilityEstimate,
  returns: &ReturnSeries,
  window: usize,
) -> Result<(ForecastMetrics, AlignedVolatility)> {
  let realized = realized_volatility(returns, window);
  let (realized, predicted) = inner_join(&realized, estimate.series());

  let metrics = ForecastMetrics::compute(realized.values(), predicted.values())
    .ok_or_else(|| Error::AlignmentEmpty(asset.to_string()))?;

  Ok((
    metrics,
    AlignedVolatility {
      realized,
      predicted,
    },
  ))
}

/// Outcome of evaluating one asset inside a batch.
#[derive(Debug)]
pub struct AssetEvaluation {
  pub asset: String,
  pub outcome: Result<ForecastMetrics>,
}

impl AssetEvaluation {
  pub fn metrics(&self) -> Option<&ForecastMetrics> {
    self.outcome.as_ref().ok()
  }
}

/// Evaluate every asset; a failing asset is recorded and the batch continues.
pub fn evaluate_all<S>(
  returns: &ReturnMatrix,
  store: &S,
  assets: &[String],
  window: usize,
) -> Vec<AssetEvaluation>
where
  S: VolatilityStore + ?Sized,
{
  assets
    .iter()
    .map(|asset| {
      let outcome = returns
        .column(asset)
        .ok_or_else(|| Error::unavailable(asset.as_str(), "no return column"))
        .and_then(|series| {
          let estimate = store.get(asset)?;
          evaluate_forecast(asset, &estimate, &series, window).map(|(m, _)| m)
        });

      match &outcome {
        Ok(m) => info!(
          asset = asset.as_str(),
          observations = m.observations,
          mse = m.mse,
          rmse = m.rmse,
          mae = m.mae,
          "evaluated volatility forecast"
        ),
        Err(e) => warn!(asset = asset.as_str(), error = %e, "skipping asset in evaluation"),
      }

      AssetEvaluation {
        asset: asset.clone(),
        outcome,
      }
    })
    .collect()
}
