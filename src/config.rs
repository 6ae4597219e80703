use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::core::cleaner::OutlierMethod;
use crate::core::series::AssetType;
use crate::core::simulation::SimulationConfig;

/// Which provider a holding's history comes from.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    #[default]
    Yahoo,
    AlphaVantage,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HoldingConfig {
    pub symbol: String,
    pub weight: f64,
    #[serde(default)]
    pub asset_type: AssetType,
    #[serde(default)]
    pub source: DataSource,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PortfolioConfig {
    pub name: String,
    pub holdings: Vec<HoldingConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AlphaVantageProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub yahoo: Option<YahooProviderConfig>,
    pub alpha_vantage: Option<AlphaVantageProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(YahooProviderConfig {
                base_url: "https://query1.finance.yahoo.com".to_string(),
            }),
            alpha_vantage: None,
        }
    }
}

/// Settings for the statistics surfaces.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Annualized risk-free rate used in Sharpe ratios.
    pub risk_free_rate: f64,
    /// Sampling frequency of the fetched data; 252 for daily trading bars.
    pub periods_per_year: f64,
    /// How far back to fetch history.
    pub lookback_days: i64,
    /// Confidence level for value-at-risk readouts.
    pub var_confidence: f64,
    /// Forward-fill calendar gaps in fetched series before analysis.
    pub fill_missing_dates: bool,
    /// Optional outlier filter applied to fetched series.
    pub outlier_filter: Option<OutlierMethod>,
    /// Deviation threshold for the z-score outlier filter.
    pub outlier_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            risk_free_rate: 0.02,
            periods_per_year: 252.0,
            lookback_days: 730,
            var_confidence: 0.95,
            fill_missing_dates: false,
            outlier_filter: None,
            outlier_threshold: 3.0,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub portfolios: Vec<PortfolioConfig>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("rs", "bolsa", "bolsa")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
portfolios:
  - name: "Growth"
    holdings:
      - symbol: "AAPL"
        weight: 0.5
      - symbol: "BTC-USD"
        weight: 0.3
        asset_type: crypto
      - symbol: "IBM"
        weight: 0.2
        source: alpha_vantage
analysis:
  risk_free_rate: 0.03
simulation:
  n_simulations: 5000
  seed: 42
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.portfolios.len(), 1);
        let portfolio = &config.portfolios[0];
        assert_eq!(portfolio.name, "Growth");
        assert_eq!(portfolio.holdings.len(), 3);
        assert_eq!(portfolio.holdings[0].symbol, "AAPL");
        assert_eq!(portfolio.holdings[0].asset_type, AssetType::Stock);
        assert_eq!(portfolio.holdings[0].source, DataSource::Yahoo);
        assert_eq!(portfolio.holdings[1].asset_type, AssetType::Crypto);
        assert_eq!(portfolio.holdings[2].source, DataSource::AlphaVantage);

        // Defaults fill in around explicit values.
        assert_eq!(config.analysis.risk_free_rate, 0.03);
        assert_eq!(config.analysis.periods_per_year, 252.0);
        assert_eq!(config.simulation.n_simulations, 5000);
        assert_eq!(config.simulation.n_days, 252);
        assert_eq!(config.simulation.seed, Some(42));

        assert!(config.providers.yahoo.is_some());
        assert!(config.providers.alpha_vantage.is_none());
    }

    #[test]
    fn test_provider_overrides() {
        let yaml_str = r#"
portfolios:
  - name: "Test"
    holdings:
      - symbol: "TEST"
        weight: 1.0
providers:
  yahoo:
    base_url: "http://example.com/yahoo"
  alpha_vantage:
    base_url: "http://example.com/av"
    api_key: "demo"
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(
            config.providers.yahoo.unwrap().base_url,
            "http://example.com/yahoo"
        );
        let av = config.providers.alpha_vantage.unwrap();
        assert_eq!(av.base_url, "http://example.com/av");
        assert_eq!(av.api_key.as_deref(), Some("demo"));
    }
}
