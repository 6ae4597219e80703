//! Descriptive and risk statistics over return sequences.
//!
//! All functions operate on a slice of simple returns, so they apply equally
//! to a single [`PriceSeries`](crate::core::series::PriceSeries) and to a
//! portfolio's weighted return sequence.

use chrono::NaiveDate;

use crate::core::error::{AnalysisError, Result};
use crate::core::series::PriceSeries;

/// Arithmetic mean of the returns. NaN for an empty slice.
pub fn mean_return(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return f64::NAN;
    }
    returns.iter().sum::<f64>() / returns.len() as f64
}

/// Sample standard deviation (n − 1 denominator) of the returns.
///
/// Returns NaN when fewer than two returns exist; the deviation is undefined
/// there, and NaN is the documented sentinel rather than an error.
pub fn volatility(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return f64::NAN;
    }
    let mean = mean_return(returns);
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    var.sqrt()
}

/// Mean return scaled to a yearly horizon. `periods_per_year` is the sampling
/// frequency of the returns (252 for daily trading data) and must be given
/// explicitly.
pub fn annualized_return(returns: &[f64], periods_per_year: f64) -> f64 {
    mean_return(returns) * periods_per_year
}

/// Volatility scaled by √periods_per_year.
pub fn annualized_volatility(returns: &[f64], periods_per_year: f64) -> f64 {
    volatility(returns) * periods_per_year.sqrt()
}

/// Annualized excess return over `risk_free_rate` divided by annualized
/// volatility.
///
/// Returns NaN when the annualized volatility is zero or undefined: "no
/// ratio is defined" is a valid analytical outcome, not a failure.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    let vol = annualized_volatility(returns, periods_per_year);
    if !vol.is_finite() || vol == 0.0 {
        return f64::NAN;
    }
    (annualized_return(returns, periods_per_year) - risk_free_rate) / vol
}

/// Maximum peak-to-trough relative decline of the cumulative value path built
/// by compounding the returns from a unit start.
///
/// Single forward scan; the result is a non-positive fraction (0 means the
/// path never fell below a previous peak).
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut value = 1.0;
    let mut peak = 1.0;
    let mut worst = 0.0_f64;
    for r in returns {
        value *= 1.0 + r;
        if value > peak {
            peak = value;
        }
        let drawdown = value / peak - 1.0;
        if drawdown < worst {
            worst = drawdown;
        }
    }
    worst
}

/// One trailing-window observation produced by [`rolling_stats`].
#[derive(Debug, Clone, PartialEq)]
pub struct RollingPoint {
    pub date: NaiveDate,
    pub mean: f64,
    pub std_dev: f64,
}

/// Lazy iterator over trailing-window mean/deviation of a series' returns.
///
/// Restartable: it borrows the series and can be created again at no cost.
#[derive(Debug, Clone)]
pub struct RollingStats<'a> {
    series: &'a PriceSeries,
    window: usize,
    position: usize,
}

impl Iterator for RollingStats<'_> {
    type Item = RollingPoint;

    fn next(&mut self) -> Option<Self::Item> {
        let returns = self.series.returns();
        let end = self.position + self.window;
        if end > returns.len() {
            return None;
        }
        let slice = &returns[self.position..end];
        // Return index i carries the date of bar i + 1.
        let date = self.series.bars()[end].date;
        self.position += 1;
        Some(RollingPoint {
            date,
            mean: mean_return(slice),
            std_dev: volatility(slice),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .series
            .returns()
            .len()
            .saturating_sub(self.position + self.window - 1);
        (remaining, Some(remaining))
    }
}

/// Trailing `window`-sized statistics for each position in the return
/// sequence. Fails when the window is zero or exceeds the number of returns.
pub fn rolling_stats(series: &PriceSeries, window: usize) -> Result<RollingStats<'_>> {
    if window == 0 {
        return Err(AnalysisError::invalid_parameter("rolling window must be positive"));
    }
    if window > series.returns().len() {
        return Err(AnalysisError::invalid_parameter(format!(
            "rolling window {} exceeds {} available returns for {}",
            window,
            series.returns().len(),
            series.symbol()
        )));
    }
    Ok(RollingStats {
        series,
        window,
        position: 0,
    })
}

/// Named metric set for one series, consumed by the report and analyze
/// surfaces.
pub fn summary(
    series: &PriceSeries,
    risk_free_rate: f64,
    periods_per_year: f64,
) -> Vec<(&'static str, f64)> {
    let returns = series.returns();
    vec![
        ("mean_return", mean_return(returns)),
        ("volatility", volatility(returns)),
        ("annualized_return", annualized_return(returns, periods_per_year)),
        (
            "annualized_volatility",
            annualized_volatility(returns, periods_per_year),
        ),
        (
            "sharpe_ratio",
            sharpe_ratio(returns, risk_free_rate, periods_per_year),
        ),
        ("total_return", series.total_return()),
        ("max_drawdown", max_drawdown(returns)),
    ]
}

/// Empirical percentile (linear interpolation between order statistics) of an
/// already sorted sample. `p` is a fraction in [0, 1].
pub(crate) fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

/// Sorts a copy of the sample and takes its percentile.
pub(crate) fn percentile(sample: &[f64], p: f64) -> f64 {
    let mut sorted = sample.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    percentile_of_sorted(&sorted, p)
}
