//! # Series
//!
//! $$
//! \{(t_i, x_i)\}_{i=1}^n,\quad t_1 < t_2 < \dots < t_n
//! $$
//!
//! Date-indexed scalar series used for returns, forecasts and realized volatility.

use chrono::NaiveDate;

use crate::error::Error;
use crate::error::Result;

/// Strictly increasing, gap-free (no missing values) date-indexed series.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeSeries {
  dates: Vec<NaiveDate>,
  values: Vec<f64>,
}

/// Daily log-returns of a single asset.
pub type ReturnSeries = TimeSeries;

impl TimeSeries {
  /// Build a series, rejecting duplicate or unordered dates and non-finite values.
  pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
    if dates.len() != values.len() {
      return Err(Error::InvalidInput(format!(
        "{} dates but {} values",
        dates.len(),
        values.len()
      )));
    }

    if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
      return Err(Error::InvalidInput(format!(
        "date index must be strictly increasing ({} then {})",
        w[0], w[1]
      )));
    }

    if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
      return Err(Error::InvalidInput(format!(
        "non-finite value at {}",
        dates[pos]
      )));
    }

    Ok(Self { dates, values })
  }

  /// Build a series from observations with gaps.
  ///
  /// Gaps are forward-filled with the last observed value; leading gaps are dropped.
  pub fn from_optional(dates: Vec<NaiveDate>, values: Vec<Option<f64>>) -> Result<Self> {
    if dates.len() != values.len() {
      return Err(Error::InvalidInput(format!(
        "{} dates but {} values",
        dates.len(),
        values.len()
      )));
    }

    let mut out_dates = Vec::with_capacity(dates.len());
    let mut out_values = Vec::with_capacity(values.len());
    let mut last = None;

    for (date, value) in dates.into_iter().zip(values) {
      let value = value.filter(|v| v.is_finite()).or(last);
      if let Some(v) = value {
        out_dates.push(date);
        out_values.push(v);
        last = Some(v);
      }
    }

    Self::new(out_dates, out_values)
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn values(&self) -> &[f64] {
    &self.values
  }

  pub fn first_date(&self) -> Option<NaiveDate> {
    self.dates.first().copied()
  }

  pub fn last_date(&self) -> Option<NaiveDate> {
    self.dates.last().copied()
  }

  /// Iterate over `(date, value)` pairs.
  pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
    self.dates.iter().copied().zip(self.values.iter().copied())
  }

  /// Most recent `n` observations (the whole series when shorter).
  pub fn tail(&self, n: usize) -> Self {
    let start = self.len().saturating_sub(n);
    Self {
      dates: self.dates[start..].to_vec(),
      values: self.values[start..].to_vec(),
    }
  }

  /// Arithmetic mean, `None` for an empty series.
  pub fn mean(&self) -> Option<f64> {
    if self.is_empty() {
      None
    } else {
      Some(self.values.iter().sum::<f64>() / self.len() as f64)
    }
  }

  /// Rolling sample standard deviation over `window` observations.
  ///
  /// The first output is dated at index `window - 1`; windows shorter than two
  /// observations yield an empty series.
  pub fn rolling_std(&self, window: usize) -> Self {
    if window < 2 || self.len() < window {
      return Self::default();
    }

    let mut dates = Vec::with_capacity(self.len() - window + 1);
    let mut values = Vec::with_capacity(self.len() - window + 1);

    for end in window..=self.len() {
      let slice = &self.values[end - window..end];
      let mean = slice.iter().sum::<f64>() / window as f64;
      let var = slice.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (window - 1) as f64;
      dates.push(self.dates[end - 1]);
      values.push(var.sqrt());
    }

    Self { dates, values }
  }
}

/// Restrict two series to their common dates, preserving order.
pub fn inner_join(a: &TimeSeries, b: &TimeSeries) -> (TimeSeries, TimeSeries) {
  let mut left = TimeSeries::default();
  let mut right = TimeSeries::default();
  let (mut i, mut j) = (0, 0);

  while i < a.len() && j < b.len() {
    match a.dates[i].cmp(&b.dates[j]) {
      std::cmp::Ordering::Less => i += 1,
      std::cmp::Ordering::Greater => j += 1,
      std::cmp::Ordering::Equal => {
        left.dates.push(a.dates[i]);
        left.values.push(a.values[i]);
        right.dates.push(b.dates[j]);
        right.values.push(b.values[j]);
        i += 1;
        j += 1;
      }
    }
  }

  (left, right)
}

#[cfg(test)]
pub(crate) fn daily_dates(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
  start.iter_days().take(n).collect()
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
  }

  #[test]
  fn new_rejects_duplicate_dates() {
    let err = TimeSeries::new(vec![day(1), day(1)], vec![0.1, 0.2]).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
  }

  #[test]
  fn new_rejects_nan() {
    let err = TimeSeries::new(vec![day(1), day(2)], vec![0.1, f64::NAN]).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
  }

  #[test]
  fn from_optional_forward_fills_and_drops_leading_gaps() {
    let s = TimeSeries::from_optional(
      vec![day(1), day(2), day(3), day(4)],
      vec![None, Some(0.2), None, Some(0.4)],
    )
    .unwrap();

    assert_eq!(s.dates(), &[day(2), day(3), day(4)]);
    assert_eq!(s.values(), &[0.2, 0.2, 0.4]);
  }

  #[test]
  fn rolling_std_matches_sample_std() {
    let s = TimeSeries::new(daily_dates(day(1), 4), vec![1.0, 2.0, 3.0, 5.0]).unwrap();
    let r = s.rolling_std(3);

    assert_eq!(r.len(), 2);
    assert_eq!(r.first_date(), Some(day(3)));
    assert_abs_diff_eq!(r.values()[0], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(r.values()[1], (7.0_f64 / 3.0).sqrt(), epsilon = 1e-12);
  }

  #[test]
  fn inner_join_keeps_common_dates() {
    let a = TimeSeries::new(vec![day(1), day(2), day(4)], vec![1.0, 2.0, 4.0]).unwrap();
    let b = TimeSeries::new(vec![day(2), day(3), day(4)], vec![20.0, 30.0, 40.0]).unwrap();
    let (l, r) = inner_join(&a, &b);

    assert_eq!(l.dates(), &[day(2), day(4)]);
    assert_eq!(l.values(), &[2.0, 4.0]);
    assert_eq!(r.values(), &[20.0, 40.0]);
  }
}
