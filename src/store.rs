//! # Volatility Store
//!
//! $$
//! \text{asset} \mapsto \{(t, \hat\sigma_t)\}
//! $$
//!
//! Key-addressed cache of volatility forecasts. The estimator writes it, the
//! optimizers and the evaluation read it.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::data::TimeSeries;
use crate::data::source::parse_date;
use crate::error::Error;
use crate::error::Result;
use crate::volatility::VolatilityEstimate;

/// Cache of per-asset volatility forecasts.
///
/// Reads of a missing, partially written or unreadable entry must fail with
/// [`Error::DataUnavailable`].
pub trait VolatilityStore: Send + Sync {
  fn put(&self, asset: &str, estimate: &VolatilityEstimate) -> Result<()>;

  fn get(&self, asset: &str) -> Result<VolatilityEstimate>;

  fn contains(&self, asset: &str) -> bool;

  fn remove(&self, asset: &str) -> Result<()>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
  entries: RwLock<HashMap<String, VolatilityEstimate>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.entries.read().map(|e| e.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl VolatilityStore for MemoryStore {
  fn put(&self, asset: &str, estimate: &VolatilityEstimate) -> Result<()> {
    let mut entries = self
      .entries
      .write()
      .map_err(|_| Error::unavailable(asset, "store lock poisoned"))?;
    entries.insert(asset.to_string(), estimate.clone());
    Ok(())
  }

  fn get(&self, asset: &str) -> Result<VolatilityEstimate> {
    let entries = self
      .entries
      .read()
      .map_err(|_| Error::unavailable(asset, "store lock poisoned"))?;
    entries
      .get(asset)
      .cloned()
      .ok_or_else(|| Error::unavailable(asset, "no cached volatility forecast"))
  }

  fn contains(&self, asset: &str) -> bool {
    self
      .entries
      .read()
      .map(|e| e.contains_key(asset))
      .unwrap_or(false)
  }

  fn remove(&self, asset: &str) -> Result<()> {
    let mut entries = self
      .entries
      .write()
      .map_err(|_| Error::unavailable(asset, "store lock poisoned"))?;
    entries.remove(asset);
    Ok(())
  }
}

#[derive(Debug, Serialize, Deserialize)]
struct Row {
  #[serde(rename = "Date")]
  date: String,
  #[serde(rename = "Volatility")]
  volatility: Option<f64>,
}

/// One `Date,Volatility` CSV file per asset under a directory.
///
/// Writes for the same asset are serialised and land atomically (temporary
/// file then rename), so a reader never observes a half-written entry.
#[derive(Debug)]
pub struct CsvFileStore {
  dir: PathBuf,
  prefix: String,
  locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CsvFileStore {
  pub fn new(dir: impl AsRef<Path>, prefix: impl Into<String>) -> Result<Self> {
    let dir = dir.as_ref().to_path_buf();
    fs::create_dir_all(&dir)?;
    Ok(Self {
      dir,
      prefix: prefix.into(),
      locks: Mutex::new(HashMap::new()),
    })
  }

  /// Path of the entry for `asset`.
  pub fn path_for(&self, asset: &str) -> PathBuf {
    self.dir.join(format!("{}{}.csv", self.prefix, asset))
  }

  fn key_lock(&self, asset: &str) -> Result<Arc<Mutex<()>>> {
    let mut locks = self
      .locks
      .lock()
      .map_err(|_| Error::unavailable(asset, "store lock poisoned"))?;
    Ok(locks.entry(asset.to_string()).or_default().clone())
  }
}

impl VolatilityStore for CsvFileStore {
  fn put(&self, asset: &str, estimate: &VolatilityEstimate) -> Result<()> {
    let lock = self.key_lock(asset)?;
    let _guard = lock
      .lock()
      .map_err(|_| Error::unavailable(asset, "store lock poisoned"))?;

    let target = self.path_for(asset);
    let tmp = target.with_extension("csv.tmp");
    let written = write_rows(&tmp, estimate)
      .and_then(|()| fs::rename(&tmp, &target).map_err(Error::from));
    if let Err(e) = written {
      let _ = fs::remove_file(&tmp);
      return Err(e);
    }

    debug!(asset, path = %target.display(), rows = estimate.len(), "stored volatility forecast");
    Ok(())
  }

  fn get(&self, asset: &str) -> Result<VolatilityEstimate> {
    let path = self.path_for(asset);
    let mut reader =
      csv::Reader::from_path(&path).map_err(|e| Error::unavailable(asset, e.to_string()))?;

    let mut dates = Vec::new();
    let mut values = Vec::new();
    for row in reader.deserialize::<Row>() {
      let row = row.map_err(|e| Error::unavailable(asset, format!("unreadable entry: {e}")))?;
      let date = parse_date(&row.date)
        .ok_or_else(|| Error::unavailable(asset, format!("bad date '{}'", row.date)))?;
      dates.push(date);
      values.push(row.volatility);
    }

    let series = TimeSeries::from_optional(dates, values)
      .map_err(|e| Error::unavailable(asset, e.to_string()))?;
    if series.is_empty() {
      return Err(Error::unavailable(asset, "cached forecast is empty"));
    }

    VolatilityEstimate::new(series).map_err(|e| Error::unavailable(asset, e.to_string()))
  }

  fn contains(&self, asset: &str) -> bool {
    self.path_for(asset).is_file()
  }

  fn remove(&self, asset: &str) -> Result<()> {
    let path = self.path_for(asset);
    if path.exists() {
      fs::remove_file(path)?;
    }
    Ok(())
  }
}

fn write_rows(path: &Path, estimate: &VolatilityEstimate) -> Result<()> {
  let mut writer = csv::Writer::from_path(path)?;
  for (date, vol) in estimate.series().iter() {
    writer.serialize(Row {
      date: date.format("%Y-%m-%d").to_string(),
      volatility: Some(vol),
    })?;
  }
  writer.flush()?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;
  use crate::data::series::daily_dates;

  fn estimate(values: &[f64]) -> VolatilityEstimate {
    let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    VolatilityEstimate::new(TimeSeries::new(daily_dates(start, values.len()), values.to_vec()).unwrap())
      .unwrap()
  }

  #[test]
  fn memory_store_round_trip_and_missing_key() {
    let store = MemoryStore::new();
    store.put("BTC-USD", &estimate(&[0.02, 0.03])).unwrap();

    assert!(store.contains("BTC-USD"));
    assert_eq!(store.get("BTC-USD").unwrap(), estimate(&[0.02, 0.03]));
    assert!(matches!(
      store.get("ETH-USD").unwrap_err(),
      Error::DataUnavailable { .. }
    ));
  }

  #[test]
  fn poisoned_memory_store_reports_remove_failure() {
    let store = MemoryStore::new();
    store.put("BTC-USD", &estimate(&[0.02])).unwrap();
    let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
      let _guard = store.entries.write().unwrap();
      panic!("writer died holding the lock");
    }));

    assert!(matches!(
      store.remove("BTC-USD").unwrap_err(),
      Error::DataUnavailable { .. }
    ));
  }

  #[test]
  fn failed_file_write_leaves_no_temporary_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = CsvFileStore::new(dir.path(), "").unwrap();
    // a non-empty directory at the target path makes the final rename fail
    let target = store.path_for("SOL-USD");
    fs::create_dir(&target).unwrap();
    fs::write(target.join("keep"), "x").unwrap();

    assert!(store.put("SOL-USD", &estimate(&[0.1, 0.2])).is_err());
    assert!(!target.with_extension("csv.tmp").exists());
    assert!(target.is_dir());
  }

  #[test]
  fn file_store_overwrites_entry() {
    let dir = tempfile::tempdir().unwrap();
    let store = CsvFileStore::new(dir.path(), "garch_volatility_").unwrap();

    store.put("ETH-USD", &estimate(&[0.1, 0.2, 0.3])).unwrap();
    store.put("ETH-USD", &estimate(&[0.4, 0.5])).unwrap();

    assert!(store.path_for("ETH-USD").ends_with("garch_volatility_ETH-USD.csv"));
    assert_eq!(store.get("ETH-USD").unwrap(), estimate(&[0.4, 0.5]));
  }

  #[test]
  fn truncated_file_is_data_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let store = CsvFileStore::new(dir.path(), "").unwrap();
    fs::write(store.path_for("ADA-USD"), "Date,Volatility\n2024-05-01,0.1\n2024-05-0").unwrap();

    assert!(matches!(
      store.get("ADA-USD").unwrap_err(),
      Error::DataUnavailable { .. }
    ));
  }

  #[test]
  fn file_store_forward_fills_blank_cells() {
    let dir = tempfile::tempdir().unwrap();
    let store = CsvFileStore::new(dir.path(), "").unwrap();
    fs::write(
      store.path_for("BNB-USD"),
      "Date,Volatility\n2024-05-01,0.1\n2024-05-02,\n2024-05-03,0.3\n",
    )
    .unwrap();

    let got = store.get("BNB-USD").unwrap();
    assert_eq!(got.series().values(), &[0.1, 0.1, 0.3]);
  }

  #[test]
  fn concurrent_writes_to_one_key_leave_a_complete_entry() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(CsvFileStore::new(dir.path(), "").unwrap());

    std::thread::scope(|scope| {
      for k in 0..8 {
        let store = store.clone();
        scope.spawn(move || {
          let vals: Vec<f64> = (0..50).map(|i| 0.01 * (k + 1) as f64 + i as f64 * 1e-4).collect();
          store.put("BTC-USD", &estimate(&vals)).unwrap();
        });
      }
    });

    let got = store.get("BTC-USD").unwrap();
    assert_eq!(got.len(), 50);
  }
}
