//! Outlier removal and date filling.
//!
//! Both operations produce a new [`PriceSeries`]; cleaning never mutates the
//! input. Downstream code (statistics, portfolios) assumes these have run
//! when the raw provider data needs them.

use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{AnalysisError, Result};
use crate::core::series::{PriceBar, PriceSeries};
use crate::core::stats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMethod {
    /// Drop returns outside [Q1 − 1.5·IQR, Q3 + 1.5·IQR].
    #[default]
    Iqr,
    /// Drop returns more than `threshold` sample deviations from the mean.
    ZScore,
}

impl FromStr for OutlierMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "iqr" => Ok(OutlierMethod::Iqr),
            "zscore" | "z-score" => Ok(OutlierMethod::ZScore),
            _ => Err(anyhow::anyhow!("Invalid outlier method: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FillMethod {
    /// Carry the last observed close forward.
    #[default]
    Forward,
    /// Linear interpolation between the surrounding observed closes.
    Interpolate,
}

/// Drops bars whose return qualifies as an outlier. The first bar is always
/// kept; it anchors the remaining returns. Fails when fewer than two bars
/// survive.
pub fn remove_outliers(
    series: &PriceSeries,
    method: OutlierMethod,
    threshold: f64,
) -> Result<PriceSeries> {
    let returns = series.returns();
    let keep: Vec<bool> = match method {
        OutlierMethod::Iqr => {
            let q1 = stats::percentile(returns, 0.25);
            let q3 = stats::percentile(returns, 0.75);
            let iqr = q3 - q1;
            let lo = q1 - 1.5 * iqr;
            let hi = q3 + 1.5 * iqr;
            returns.iter().map(|r| (lo..=hi).contains(r)).collect()
        }
        OutlierMethod::ZScore => {
            if !(threshold > 0.0) {
                return Err(AnalysisError::invalid_parameter(format!(
                    "z-score threshold must be positive, got {threshold}"
                )));
            }
            let mean = stats::mean_return(returns);
            let std_dev = stats::volatility(returns);
            returns
                .iter()
                .map(|r| std_dev == 0.0 || ((r - mean) / std_dev).abs() < threshold)
                .collect()
        }
    };

    let bars: Vec<PriceBar> = series
        .bars()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i == 0 || keep[i - 1])
        .map(|(_, b)| b.clone())
        .collect();

    let dropped = series.len() - bars.len();
    if dropped > 0 {
        debug!(symbol = series.symbol(), dropped, "Removed outlier bars");
    }
    series.with_bars(bars)
}

/// Fills every missing calendar day between the first and last bar, so the
/// series has one bar per day. Filled bars carry only a close.
pub fn fill_missing_dates(series: &PriceSeries, method: FillMethod) -> Result<PriceSeries> {
    let observed = series.bars();
    let mut bars: Vec<PriceBar> = Vec::new();
    let mut next = 0usize;

    let mut date = series.first_date();
    while date <= series.last_date() {
        if observed[next].date == date {
            bars.push(observed[next].clone());
            next += 1;
        } else {
            let prev = &observed[next - 1];
            let close = match method {
                FillMethod::Forward => prev.close,
                FillMethod::Interpolate => {
                    let upcoming = &observed[next];
                    let span = (upcoming.date - prev.date).num_days() as f64;
                    let progress = (date - prev.date).num_days() as f64;
                    prev.close + (upcoming.close - prev.close) * progress / span
                }
            };
            bars.push(PriceBar::close_only(date, close));
        }
        date += Duration::days(1);
    }

    series.with_bars(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::series::test_support::series_from_closes;
    use crate::core::series::{AssetType, PriceSeries};
    use chrono::NaiveDate;

    #[test]
    fn test_zscore_removes_spike() {
        // A calm drifting series with one +50% day in the middle. Both the
        // spike bar and the crash back to trend are outliers.
        let mut closes: Vec<f64> = (0..21).map(|i| 100.0 * 1.001_f64.powi(i)).collect();
        closes[10] *= 1.5;
        let series = series_from_closes("SPIKY", &closes);
        let cleaned = remove_outliers(&series, OutlierMethod::ZScore, 2.0).unwrap();

        assert_eq!(cleaned.len(), series.len() - 2);
        assert!(cleaned.bars().iter().all(|b| b.close < 120.0));
        // Input untouched.
        assert_eq!(series.len(), closes.len());
    }

    #[test]
    fn test_iqr_keeps_clean_series() {
        let closes = [100.0, 100.3, 100.1, 100.4, 100.2, 100.5, 100.3];
        let series = series_from_closes("CALM", &closes);
        let cleaned = remove_outliers(&series, OutlierMethod::Iqr, 0.0).unwrap();
        assert_eq!(cleaned.len(), series.len());
    }

    #[test]
    fn test_zscore_threshold_validated() {
        let series = series_from_closes("A", &[100.0, 101.0, 102.0]);
        let err = remove_outliers(&series, OutlierMethod::ZScore, 0.0).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidParameter { .. }));
    }

    #[test]
    fn test_fill_forward() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = vec![
            PriceBar::close_only(start, 100.0),
            PriceBar::close_only(start + Duration::days(3), 106.0),
            PriceBar::close_only(start + Duration::days(4), 107.0),
        ];
        let series = PriceSeries::new("GAPPY", "test", AssetType::Stock, bars).unwrap();

        let filled = fill_missing_dates(&series, FillMethod::Forward).unwrap();
        assert_eq!(filled.len(), 5);
        assert_eq!(filled.bars()[1].close, 100.0);
        assert_eq!(filled.bars()[2].close, 100.0);
        assert_eq!(filled.bars()[3].close, 106.0);
    }

    #[test]
    fn test_fill_interpolate() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = vec![
            PriceBar::close_only(start, 100.0),
            PriceBar::close_only(start + Duration::days(3), 106.0),
        ];
        let series = PriceSeries::new("GAPPY", "test", AssetType::Stock, bars).unwrap();

        let filled = fill_missing_dates(&series, FillMethod::Interpolate).unwrap();
        assert_eq!(filled.len(), 4);
        assert!((filled.bars()[1].close - 102.0).abs() < 1e-12);
        assert!((filled.bars()[2].close - 104.0).abs() < 1e-12);
    }
}
