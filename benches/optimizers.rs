use std::hint::black_box;

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use ndarray::Array1;
use ndarray::Array2;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use volalloc::portfolio::CovarianceMatrix;
use volalloc::portfolio::CvarRisk;
use volalloc::portfolio::RatioObjective;
use volalloc::portfolio::RatioOptimizer;
use volalloc::portfolio::VarianceRisk;
use volalloc::portfolio::correlation_matrix;

const WINDOW: usize = 30;

fn window(n_assets: usize) -> Array2<f64> {
  let mut rng = StdRng::seed_from_u64(17);
  Array2::from_shape_fn((WINDOW, n_assets), |_| rng.gen_range(-0.05..0.06))
}

fn labels(n: usize) -> Vec<String> {
  (0..n).map(|i| format!("A{i}")).collect()
}

fn bench_sharpe_variance(c: &mut Criterion) {
  let mut group = c.benchmark_group("sharpe_variance");

  for &n in &[2, 4, 8] {
    let returns = window(n);
    let mu = returns.mean_axis(ndarray::Axis(0)).unwrap();
    let sigmas = Array1::from_elem(n, 0.03);
    let cov = CovarianceMatrix::from_parts(labels(n), &sigmas, &correlation_matrix(&returns));
    let objective = RatioObjective::new(mu, 0.0, VarianceRisk::new(cov));
    let optimizer = RatioOptimizer::default().with_seed(1);

    group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
      b.iter(|| black_box(optimizer.maximize(&objective, &labels(n)).unwrap()));
    });
  }

  group.finish();
}

fn bench_sharpe_cvar(c: &mut Criterion) {
  let mut group = c.benchmark_group("sharpe_cvar");

  for &n in &[2, 4, 8] {
    let returns = window(n);
    let mu = returns.mean_axis(ndarray::Axis(0)).unwrap();
    let objective = RatioObjective::new(mu, 0.03 / 365.0, CvarRisk::new(returns, 0.05));
    let optimizer = RatioOptimizer::default().with_seed(1);

    group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
      b.iter(|| black_box(optimizer.maximize(&objective, &labels(n)).unwrap()));
    });
  }

  group.finish();
}

criterion_group!(benches, bench_sharpe_variance, bench_sharpe_cvar);
criterion_main!(benches);
