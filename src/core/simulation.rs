//! Monte Carlo projection of future portfolio values.
//!
//! Daily per-asset returns are drawn from a multivariate normal with the
//! portfolio's historical mean vector and covariance matrix, correlated via
//! a Cholesky factor. Trials are independent and run in parallel; each trial
//! seeds its own rng from `base_seed + trial_index`, so results are
//! bit-reproducible regardless of thread scheduling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{AnalysisError, Result};
use crate::core::portfolio::Portfolio;
use crate::core::stats;

/// Simulation parameters. `seed: None` draws a base seed from OS entropy;
/// a fixed seed makes the whole run reproducible.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub n_simulations: usize,
    pub n_days: usize,
    pub initial_investment: f64,
    pub seed: Option<u64>,
    /// Ceiling on n_simulations × n_days × n_assets, checked before any
    /// allocation.
    #[serde(default = "default_max_total_samples")]
    pub max_total_samples: usize,
}

fn default_max_total_samples() -> usize {
    50_000_000
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n_simulations: 1000,
            n_days: 252,
            initial_investment: 10_000.0,
            seed: None,
            max_total_samples: default_max_total_samples(),
        }
    }
}

/// Simulated value paths, `paths[simulation][day]` with day 0 equal to the
/// initial investment. Produced whole or not at all.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    initial_investment: f64,
    paths: Vec<Vec<f64>>,
}

/// Final-day distribution summary of a simulation.
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub initial_investment: f64,
    pub n_simulations: usize,
    pub n_days: usize,
    pub mean_final: f64,
    pub std_final: f64,
    pub median_final: f64,
    pub percentile_5: f64,
    pub percentile_95: f64,
    /// Final value at the (1 − confidence) percentile.
    pub value_at_risk: f64,
    pub confidence_level: f64,
    pub probability_of_loss: f64,
}

impl SimulationResult {
    pub fn paths(&self) -> &[Vec<f64>] {
        &self.paths
    }

    pub fn initial_investment(&self) -> f64 {
        self.initial_investment
    }

    pub fn n_simulations(&self) -> usize {
        self.paths.len()
    }

    /// Projection horizon in days (path length is `n_days() + 1`).
    pub fn n_days(&self) -> usize {
        self.paths[0].len() - 1
    }

    pub fn final_values(&self) -> Vec<f64> {
        self.paths.iter().map(|p| *p.last().unwrap()).collect()
    }

    /// Per-day empirical percentile across simulations; `p` is a fraction in
    /// [0, 1]. Index 0 is the (degenerate) starting day.
    pub fn percentile_band(&self, p: f64) -> Vec<f64> {
        let n_points = self.paths[0].len();
        (0..n_points)
            .map(|day| {
                let sample: Vec<f64> = self.paths.iter().map(|path| path[day]).collect();
                stats::percentile(&sample, p)
            })
            .collect()
    }

    /// Distribution statistics of the final day at the given confidence
    /// level.
    pub fn summary(&self, confidence_level: f64) -> Result<SimulationSummary> {
        if !(confidence_level > 0.0 && confidence_level < 1.0) {
            return Err(AnalysisError::invalid_parameter(format!(
                "confidence level must be in (0, 1), got {confidence_level}"
            )));
        }
        let mut finals = self.final_values();
        finals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let n = finals.len();
        let mean = finals.iter().sum::<f64>() / n as f64;
        let std_final = stats::volatility(&finals);
        let losses = finals
            .iter()
            .filter(|v| **v < self.initial_investment)
            .count();

        Ok(SimulationSummary {
            initial_investment: self.initial_investment,
            n_simulations: n,
            n_days: self.n_days(),
            mean_final: mean,
            std_final,
            median_final: stats::percentile_of_sorted(&finals, 0.5),
            percentile_5: stats::percentile_of_sorted(&finals, 0.05),
            percentile_95: stats::percentile_of_sorted(&finals, 0.95),
            value_at_risk: stats::percentile_of_sorted(&finals, 1.0 - confidence_level),
            confidence_level,
            probability_of_loss: losses as f64 / n as f64,
        })
    }
}

/// Generator of correlated future return paths for one portfolio.
///
/// Holds the mean vector, the Cholesky factor of the covariance matrix and
/// the weight vector; all are fixed at construction, mirroring the
/// portfolio's own immutability.
#[derive(Debug, Clone)]
pub struct MonteCarloSimulator {
    mean_returns: Vec<f64>,
    cholesky: Vec<Vec<f64>>,
    weights: Vec<f64>,
}

impl MonteCarloSimulator {
    /// Prepares a simulator from the portfolio's historical distribution.
    /// Fails with a numerical error when the covariance matrix is not
    /// positive semi-definite.
    pub fn for_portfolio(portfolio: &Portfolio) -> Result<Self> {
        let cholesky = cholesky(portfolio.covariance_matrix())?;
        Ok(MonteCarloSimulator {
            mean_returns: portfolio.mean_returns().to_vec(),
            cholesky,
            weights: portfolio.weights().to_vec(),
        })
    }

    /// Runs the full batch of trials. Either every path is produced or the
    /// call fails before any sampling happens.
    pub fn run(&self, config: &SimulationConfig) -> Result<SimulationResult> {
        if config.n_simulations == 0 {
            return Err(AnalysisError::invalid_parameter("n_simulations must be positive"));
        }
        if config.n_days == 0 {
            return Err(AnalysisError::invalid_parameter("n_days must be positive"));
        }
        if !(config.initial_investment.is_finite() && config.initial_investment > 0.0) {
            return Err(AnalysisError::invalid_parameter(format!(
                "initial investment must be positive, got {}",
                config.initial_investment
            )));
        }
        let n_assets = self.mean_returns.len();
        let total_samples = config
            .n_simulations
            .saturating_mul(config.n_days)
            .saturating_mul(n_assets);
        if total_samples > config.max_total_samples {
            return Err(AnalysisError::invalid_parameter(format!(
                "simulation would draw {total_samples} samples, above the ceiling of {}",
                config.max_total_samples
            )));
        }

        let base_seed = config.seed.unwrap_or_else(rand::random);
        debug!(
            n_simulations = config.n_simulations,
            n_days = config.n_days,
            n_assets,
            base_seed,
            "Running Monte Carlo simulation"
        );

        let paths: Vec<Vec<f64>> = (0..config.n_simulations)
            .into_par_iter()
            .map(|trial| {
                self.simulate_path(
                    base_seed.wrapping_add(trial as u64),
                    config.n_days,
                    config.initial_investment,
                )
            })
            .collect();

        Ok(SimulationResult {
            initial_investment: config.initial_investment,
            paths,
        })
    }

    fn simulate_path(&self, seed: u64, n_days: usize, initial_investment: f64) -> Vec<f64> {
        let n_assets = self.mean_returns.len();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut z = vec![0.0_f64; n_assets];
        let mut path = Vec::with_capacity(n_days + 1);
        let mut value = initial_investment;
        path.push(value);

        for _ in 0..n_days {
            for zi in z.iter_mut() {
                *zi = rng.sample(StandardNormal);
            }
            // One day's portfolio return: weights · (mean + L·z).
            let mut day_return = 0.0;
            for i in 0..n_assets {
                let mut asset_return = self.mean_returns[i];
                for j in 0..=i {
                    asset_return += self.cholesky[i][j] * z[j];
                }
                day_return += self.weights[i] * asset_return;
            }
            value *= 1.0 + day_return;
            path.push(value);
        }
        path
    }
}

/// Cholesky factorization A = L·Lᵀ of a symmetric positive semi-definite
/// matrix. A zero-variance direction (singular but PSD) yields a zero
/// column; a genuinely indefinite matrix is a numerical error.
fn cholesky(matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    let n = matrix.len();
    // Tolerance scaled to the largest diagonal entry.
    let scale = matrix
        .iter()
        .enumerate()
        .map(|(i, row)| row[i].abs())
        .fold(0.0_f64, f64::max)
        .max(1.0);
    let tol = 1e-12 * scale;

    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            if i == j {
                let diag = matrix[i][i] - sum;
                if diag < -tol {
                    return Err(AnalysisError::numerical(format!(
                        "covariance matrix is not positive semi-definite \
                         (pivot {diag:e} at index {i})"
                    )));
                }
                l[i][j] = diag.max(0.0).sqrt();
            } else if l[j][j] <= tol.sqrt() {
                l[i][j] = 0.0;
            } else {
                l[i][j] = (matrix[i][j] - sum) / l[j][j];
            }
        }
    }
    Ok(l)
}
