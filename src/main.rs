//! volalloc command-line interface.
//!
//! Trains and evaluates per-asset volatility models against a local return
//! table and solves the Sharpe and Sharpe-CVaR allocations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde::Serialize;
use tracing::info;
use volalloc::config::Settings;
use volalloc::data::CsvReturnSource;
use volalloc::data::ReturnMatrix;
use volalloc::data::ReturnSource;
use volalloc::portfolio::AllocationEngine;
use volalloc::portfolio::OptimizerMethod;
use volalloc::report;
use volalloc::report::AllocationReport;
use volalloc::store::CsvFileStore;
use volalloc::store::VolatilityStore;
use volalloc::volatility::VolatilityEstimator;
use volalloc::volatility::VolatilitySummary;
use volalloc::volatility::evaluate_all;

const STORE_PREFIX: &str = "garch_volatility_";

#[derive(Parser)]
#[command(name = "volalloc")]
#[command(about = "GARCH volatility forecasts and risk-adjusted allocation", long_about = None)]
#[command(version)]
struct Cli {
  #[command(flatten)]
  input: InputArgs,

  /// JSON settings file (model orders, optimizer and evaluation settings)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Directory of cached volatility forecasts
  #[arg(long, global = true, default_value = "volatility")]
  store: PathBuf,

  /// Print JSON instead of a table
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Args)]
#[group(multiple = false)]
struct InputArgs {
  /// CSV of daily log returns, first column the date
  #[arg(long)]
  returns: Option<PathBuf>,

  /// CSV of daily prices, first column the date
  #[arg(long)]
  prices: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
  /// Fit the configured model of each asset and cache its volatility
  Train {
    /// Restrict training to these assets
    #[arg(long, value_delimiter = ',')]
    assets: Vec<String>,
  },

  /// Compare cached forecasts with rolling realized volatility
  Evaluate {
    /// Rolling window of the realized proxy
    #[arg(long)]
    window: Option<usize>,
  },

  /// Maximise return over forecast portfolio volatility
  Sharpe(OptimizeArgs),

  /// Maximise return over historical CVaR
  SharpeCvar(OptimizeArgs),
}

#[derive(Args)]
struct OptimizeArgs {
  /// Seed of the random starting weights
  #[arg(long)]
  seed: Option<u64>,

  /// Independent local searches, best one wins
  #[arg(long)]
  restarts: Option<usize>,

  /// Observations in the trailing window
  #[arg(long)]
  window: Option<usize>,
}

fn main() -> anyhow::Result<()> {
  init_tracing();

  let cli = Cli::parse();
  let mut settings = match &cli.config {
    Some(path) => {
      Settings::from_path(path).with_context(|| format!("reading {}", path.display()))?
    }
    None => Settings::default(),
  };

  let returns = load_returns(&cli.input)?;
  info!(
    assets = returns.n_assets(),
    observations = returns.len(),
    "loaded return table"
  );

  let store: Arc<dyn VolatilityStore> = Arc::new(
    CsvFileStore::new(&cli.store, STORE_PREFIX)
      .with_context(|| format!("opening store {}", cli.store.display()))?,
  );

  match cli.command {
    Commands::Train { assets } => {
      if !assets.is_empty() {
        settings.garch.orders.retain(|asset, _| assets.contains(asset));
      }
      let estimator = VolatilityEstimator::new(settings.garch, store);
      let rows = report::training_rows(&estimator.train_all(&returns));
      emit(cli.json, &rows, || {
        report::training_table(&rows).printstd();
      })?;
    }
    Commands::Evaluate { window } => {
      let window = window.unwrap_or(settings.evaluation.realized_window);
      let assets: Vec<String> = settings.garch.assets().map(str::to_string).collect();
      let evaluations = evaluate_all(&returns, &*store, &assets, window);
      let rows = report::evaluation_rows(&evaluations);
      emit(cli.json, &rows, || {
        report::evaluation_table(&rows).printstd();
      })?;
    }
    Commands::Sharpe(args) => {
      args.apply(&mut settings);
      let engine = AllocationEngine::new(settings.optimizer);
      let window = engine.trailing_window(&returns)?;
      let summary = VolatilitySummary::from_store(
        &*store,
        window.assets(),
        engine.settings().summary_window,
      )?;
      let result = engine.optimize(OptimizerMethod::SharpeVariance, &returns, Some(&summary))?;
      let allocation = AllocationReport::new(OptimizerMethod::SharpeVariance, &result, &window)?;
      emit(cli.json, &allocation, || {
        allocation.table().printstd();
      })?;
    }
    Commands::SharpeCvar(args) => {
      args.apply(&mut settings);
      let engine = AllocationEngine::new(settings.optimizer);
      let window = engine.trailing_window(&returns)?;
      let result = engine.optimize(OptimizerMethod::SharpeCvar, &returns, None)?;
      let allocation = AllocationReport::new(OptimizerMethod::SharpeCvar, &result, &window)?;
      emit(cli.json, &allocation, || {
        allocation.table().printstd();
      })?;
    }
  }

  Ok(())
}

impl OptimizeArgs {
  fn apply(&self, settings: &mut Settings) {
    if let Some(seed) = self.seed {
      settings.optimizer.seed = Some(seed);
    }
    if let Some(restarts) = self.restarts {
      settings.optimizer.restarts = restarts;
    }
    if let Some(window) = self.window {
      settings.optimizer.trailing_window = window;
    }
  }
}

fn init_tracing() {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
    )
    .with_writer(std::io::stderr)
    .init();
}

fn load_returns(input: &InputArgs) -> anyhow::Result<ReturnMatrix> {
  let source = match (&input.returns, &input.prices) {
    (Some(path), _) => CsvReturnSource::log_returns(path),
    (None, Some(path)) => CsvReturnSource::prices(path),
    (None, None) => anyhow::bail!("either --returns or --prices is required"),
  };
  source.load().context("loading return table")
}

fn emit<T: Serialize>(json: bool, value: &T, table: impl FnOnce()) -> anyhow::Result<()> {
  if json {
    println!("{}", serde_json::to_string_pretty(value)?);
  } else {
    table();
  }
  Ok(())
}
