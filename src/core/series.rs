//! Price history for a single instrument.

use std::fmt::Display;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::error::{AnalysisError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    #[default]
    Stock,
    Etf,
    MutualFund,
    Index,
    Crypto,
    Other,
}

impl Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                AssetType::Stock => "stock",
                AssetType::Etf => "etf",
                AssetType::MutualFund => "mutual_fund",
                AssetType::Index => "index",
                AssetType::Crypto => "crypto",
                AssetType::Other => "other",
            }
        )
    }
}

impl FromStr for AssetType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stock" => Ok(AssetType::Stock),
            "etf" => Ok(AssetType::Etf),
            "mutual_fund" | "fund" => Ok(AssetType::MutualFund),
            "index" => Ok(AssetType::Index),
            "crypto" => Ok(AssetType::Crypto),
            "other" => Ok(AssetType::Other),
            _ => Err(anyhow::anyhow!("Invalid asset type: {}", s)),
        }
    }
}

/// One trading day as delivered by an extractor. Only `date` and `close` are
/// guaranteed; the remaining OHLCV columns depend on the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub close: f64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<u64>,
}

impl PriceBar {
    /// A bar carrying only a closing price.
    pub fn close_only(date: NaiveDate, close: f64) -> Self {
        PriceBar {
            date,
            close,
            open: None,
            high: None,
            low: None,
            volume: None,
        }
    }
}

/// A single instrument's time-indexed price history.
///
/// Construction validates the series (dates strictly increasing, at least two
/// finite prices) and computes the simple-return sequence once. The series is
/// immutable afterwards; cleaning operations build a new instance.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    symbol: String,
    source: String,
    asset_type: AssetType,
    bars: Vec<PriceBar>,
    returns: Vec<f64>,
}

impl PriceSeries {
    pub fn new(
        symbol: impl Into<String>,
        source: impl Into<String>,
        asset_type: AssetType,
        mut bars: Vec<PriceBar>,
    ) -> Result<Self> {
        let symbol = symbol.into();
        bars.sort_by_key(|b| b.date);

        if bars.len() < 2 {
            return Err(AnalysisError::insufficient_data(2, bars.len()));
        }
        for pair in bars.windows(2) {
            if pair[1].date == pair[0].date {
                return Err(AnalysisError::configuration(format!(
                    "{symbol}: duplicate date {}",
                    pair[0].date
                )));
            }
        }
        if let Some(bad) = bars.iter().find(|b| !b.close.is_finite() || b.close <= 0.0) {
            return Err(AnalysisError::configuration(format!(
                "{symbol}: non-positive or missing price on {}",
                bad.date
            )));
        }

        let returns = bars
            .windows(2)
            .map(|pair| pair[1].close / pair[0].close - 1.0)
            .collect();

        Ok(PriceSeries {
            symbol,
            source: source.into(),
            asset_type,
            bars,
            returns,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn asset_type(&self) -> AssetType {
        self.asset_type
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.bars[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.bars[self.bars.len() - 1].date
    }

    /// Simple returns between consecutive closes; length is `len() - 1`.
    pub fn returns(&self) -> &[f64] {
        &self.returns
    }

    /// Dates the return sequence is indexed by (the second date of each
    /// consecutive pair).
    pub fn return_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.bars.iter().skip(1).map(|b| b.date)
    }

    /// Fractional change from the first to the last close.
    pub fn total_return(&self) -> f64 {
        self.bars[self.bars.len() - 1].close / self.bars[0].close - 1.0
    }

    /// A new series over different bars, keeping symbol and provenance.
    /// Used by the cleaning operations.
    pub fn with_bars(&self, bars: Vec<PriceBar>) -> Result<Self> {
        PriceSeries::new(self.symbol.clone(), self.source.clone(), self.asset_type, bars)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::series_from_closes;
    use super::*;

    #[test]
    fn test_returns_length_and_roundtrip() {
        let closes = [100.0, 102.0, 99.0, 104.5, 101.2];
        let series = series_from_closes("AAPL", &closes);

        assert_eq!(series.returns().len(), closes.len() - 1);

        // Compounding the returns from the first price reproduces the path.
        let mut price = closes[0];
        for (r, expected) in series.returns().iter().zip(&closes[1..]) {
            price *= 1.0 + r;
            assert!((price - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_single_price_rejected() {
        let bars = vec![PriceBar::close_only(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            100.0,
        )];
        let err = PriceSeries::new("AAPL", "test", AssetType::Stock, bars).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientData {
                required: 2,
                available: 1
            }
        ));
    }

    #[test]
    fn test_duplicate_date_rejected() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = vec![
            PriceBar::close_only(date, 100.0),
            PriceBar::close_only(date, 101.0),
        ];
        let err = PriceSeries::new("AAPL", "test", AssetType::Stock, bars).unwrap_err();
        assert!(matches!(err, AnalysisError::Configuration { .. }));
    }

    #[test]
    fn test_unsorted_bars_are_ordered() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = vec![
            PriceBar::close_only(start + chrono::Duration::days(2), 110.0),
            PriceBar::close_only(start, 100.0),
            PriceBar::close_only(start + chrono::Duration::days(1), 105.0),
        ];
        let series = PriceSeries::new("AAPL", "test", AssetType::Stock, bars).unwrap();
        assert_eq!(series.first_date(), start);
        assert!((series.total_return() - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_price_rejected() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = vec![
            PriceBar::close_only(start, 100.0),
            PriceBar::close_only(start + chrono::Duration::days(1), f64::NAN),
        ];
        let err = PriceSeries::new("AAPL", "test", AssetType::Stock, bars).unwrap_err();
        assert!(matches!(err, AnalysisError::Configuration { .. }));
    }
}
