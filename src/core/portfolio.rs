//! Weighted multi-asset aggregation and cross-asset risk.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::core::error::{AnalysisError, Result};
use crate::core::series::PriceSeries;
use crate::core::stats;

/// A weighted collection of price series.
///
/// All derived quantities (aligned return matrix, weighted returns, mean
/// vector, covariance matrix) are computed once at construction; the
/// portfolio is immutable afterwards, so they can never go stale. Changing
/// holdings or weights means building a new `Portfolio`.
#[derive(Debug, Clone)]
pub struct Portfolio {
    name: String,
    symbols: Vec<String>,
    holdings: HashMap<String, PriceSeries>,
    weights: Vec<f64>,
    dates: Vec<NaiveDate>,
    aligned: Vec<Vec<f64>>,
    weighted: Vec<f64>,
    mean_returns: Vec<f64>,
    covariance: Vec<Vec<f64>>,
}

impl Portfolio {
    /// Builds a portfolio from holdings and per-symbol weights.
    ///
    /// Fails with a configuration error when the two key sets differ or the
    /// weights do not sum to 1 (± 1e-6), and with an insufficient-data error
    /// when fewer than two dates are common to every holding.
    pub fn new(
        name: impl Into<String>,
        holdings: HashMap<String, PriceSeries>,
        weights: HashMap<String, f64>,
    ) -> Result<Self> {
        let name = name.into();

        if holdings.is_empty() {
            return Err(AnalysisError::configuration(format!(
                "portfolio '{name}' has no holdings"
            )));
        }

        let mut unweighted: Vec<_> = holdings
            .keys()
            .filter(|s| !weights.contains_key(*s))
            .cloned()
            .collect();
        let mut unheld: Vec<_> = weights
            .keys()
            .filter(|s| !holdings.contains_key(*s))
            .cloned()
            .collect();
        if !unweighted.is_empty() || !unheld.is_empty() {
            unweighted.sort();
            unheld.sort();
            let mut parts = Vec::new();
            if !unweighted.is_empty() {
                parts.push(format!("holdings without weight: {}", unweighted.join(", ")));
            }
            if !unheld.is_empty() {
                parts.push(format!("weights without holding: {}", unheld.join(", ")));
            }
            return Err(AnalysisError::configuration(format!(
                "portfolio '{name}': {}",
                parts.join("; ")
            )));
        }

        if let Some((symbol, w)) = weights.iter().find(|(_, w)| !w.is_finite()) {
            return Err(AnalysisError::configuration(format!(
                "portfolio '{name}': weight for {symbol} is not finite ({w})"
            )));
        }
        let total: f64 = weights.values().sum();
        if (total - 1.0).abs() > 1e-6 {
            return Err(AnalysisError::configuration(format!(
                "portfolio '{name}': weights sum to {total}, expected 1.0"
            )));
        }

        // Fixed column order for every derived matrix.
        let mut symbols: Vec<String> = holdings.keys().cloned().collect();
        symbols.sort();
        let weight_vec: Vec<f64> = symbols.iter().map(|s| weights[s]).collect();

        let (dates, aligned) = align(&symbols, &holdings)?;

        let n_assets = symbols.len();
        let weighted: Vec<f64> = aligned
            .iter()
            .map(|row| row.iter().zip(&weight_vec).map(|(r, w)| r * w).sum())
            .collect();
        let mean_returns: Vec<f64> = (0..n_assets)
            .map(|col| aligned.iter().map(|row| row[col]).sum::<f64>() / aligned.len() as f64)
            .collect();
        let covariance = sample_covariance(&aligned, &mean_returns);

        Ok(Portfolio {
            name,
            symbols,
            holdings,
            weights: weight_vec,
            dates,
            aligned,
            weighted,
            mean_returns,
            covariance,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Symbols in the fixed column order used by all matrices and vectors.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn weight(&self, symbol: &str) -> Option<f64> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .map(|i| self.weights[i])
    }

    pub fn series(&self, symbol: &str) -> Option<&PriceSeries> {
        self.holdings.get(symbol)
    }

    /// Dates common to every holding's return sequence, ascending.
    pub fn aligned_dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Aligned return matrix; rows follow `aligned_dates`, columns `symbols`.
    pub fn aligned_returns(&self) -> &[Vec<f64>] {
        &self.aligned
    }

    /// The portfolio's own return sequence: per date, the weight-summed
    /// return of every holding. Feed it to [`crate::core::stats`] like any
    /// single-series return slice.
    pub fn weighted_returns(&self) -> &[f64] {
        &self.weighted
    }

    /// Per-asset mean of the aligned returns, in symbol order.
    pub fn mean_returns(&self) -> &[f64] {
        &self.mean_returns
    }

    /// Sample covariance matrix (n − 1 denominator) of the aligned returns.
    pub fn covariance_matrix(&self) -> &[Vec<f64>] {
        &self.covariance
    }

    /// Correlation matrix derived from the covariance matrix. The diagonal
    /// is exactly 1.0; a zero-variance asset yields NaN off-diagonal entries.
    pub fn correlation_matrix(&self) -> Vec<Vec<f64>> {
        let n = self.symbols.len();
        let std_devs: Vec<f64> = (0..n).map(|i| self.covariance[i][i].sqrt()).collect();
        let mut corr = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                corr[i][j] = if i == j {
                    1.0
                } else {
                    self.covariance[i][j] / (std_devs[i] * std_devs[j])
                };
            }
        }
        corr
    }

    /// Portfolio volatility √(wᵀΣw) at the sampling frequency of the data.
    ///
    /// This is not the weighted average of individual volatilities; the
    /// covariance terms carry the diversification effect.
    pub fn volatility(&self) -> f64 {
        let n = self.symbols.len();
        let mut quad = 0.0;
        for i in 0..n {
            for j in 0..n {
                quad += self.weights[i] * self.weights[j] * self.covariance[i][j];
            }
        }
        // Guard tiny negative results from float cancellation.
        quad.max(0.0).sqrt()
    }

    /// Historical value at risk: the empirical (1 − confidence) percentile of
    /// the weighted return observations. At 0.95 confidence, 5% of observed
    /// portfolio returns fall below the result (typically negative).
    pub fn value_at_risk(&self, confidence_level: f64) -> Result<f64> {
        validate_confidence(confidence_level)?;
        Ok(stats::percentile(&self.weighted, 1.0 - confidence_level))
    }

    /// Parametric (normal) value at risk: mean + z·σ of the weighted returns
    /// with z the standard-normal quantile at (1 − confidence). A clearly
    /// named alternative to the empirical [`Self::value_at_risk`]; it assumes
    /// normally distributed returns.
    pub fn parametric_value_at_risk(&self, confidence_level: f64) -> Result<f64> {
        validate_confidence(confidence_level)?;
        let mean = stats::mean_return(&self.weighted);
        let std_dev = stats::volatility(&self.weighted);
        Ok(mean + norm_inv(1.0 - confidence_level) * std_dev)
    }
}

fn validate_confidence(confidence_level: f64) -> Result<()> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(AnalysisError::invalid_parameter(format!(
            "confidence level must be in (0, 1), got {confidence_level}"
        )));
    }
    Ok(())
}

/// Intersects all holdings' return dates into a common ordered set and
/// assembles the aligned return matrix.
fn align(
    symbols: &[String],
    holdings: &HashMap<String, PriceSeries>,
) -> Result<(Vec<NaiveDate>, Vec<Vec<f64>>)> {
    let by_date: Vec<HashMap<NaiveDate, f64>> = symbols
        .iter()
        .map(|s| {
            let series = &holdings[s];
            series
                .return_dates()
                .zip(series.returns().iter().copied())
                .collect()
        })
        .collect();

    let mut dates: Vec<NaiveDate> = by_date[0]
        .keys()
        .filter(|d| by_date[1..].iter().all(|m| m.contains_key(d)))
        .copied()
        .collect();
    dates.sort();

    if dates.len() < 2 {
        return Err(AnalysisError::insufficient_data(2, dates.len()));
    }

    let matrix = dates
        .iter()
        .map(|d| by_date.iter().map(|m| m[d]).collect())
        .collect();
    Ok((dates, matrix))
}

/// Sample covariance over the aligned matrix (rows = observations).
fn sample_covariance(aligned: &[Vec<f64>], means: &[f64]) -> Vec<Vec<f64>> {
    let n_assets = means.len();
    let denom = (aligned.len() - 1) as f64;
    let mut cov = vec![vec![0.0; n_assets]; n_assets];
    for row in aligned {
        for i in 0..n_assets {
            let di = row[i] - means[i];
            for j in i..n_assets {
                cov[i][j] += di * (row[j] - means[j]);
            }
        }
    }
    for i in 0..n_assets {
        for j in i..n_assets {
            cov[i][j] /= denom;
            cov[j][i] = cov[i][j];
        }
    }
    cov
}

/// Standard normal inverse CDF, Abramowitz–Stegun 26.2.23 rational
/// approximation (absolute error < 4.5e-4).
fn norm_inv(p: f64) -> f64 {
    let p_clamped = p.clamp(1e-10, 1.0 - 1e-10);
    let t = if p_clamped < 0.5 {
        (-2.0 * p_clamped.ln()).sqrt()
    } else {
        (-2.0 * (1.0 - p_clamped).ln()).sqrt()
    };

    let c0 = 2.515517;
    let c1 = 0.802853;
    let c2 = 0.010328;
    let d1 = 1.432788;
    let d2 = 0.189269;
    let d3 = 0.001308;

    let result = t - (c0 + c1 * t + c2 * t * t) / (1.0 + d1 * t + d2 * t * t + d3 * t * t * t);
    if p_clamped < 0.5 { -result } else { result }
}
