//! `setup`: writes a starter configuration file.

use anyhow::Context;

use crate::config::AppConfig;

const DEFAULT_CONFIG: &str = r#"---
portfolios:
  - name: "Example"
    holdings:
      - symbol: "AAPL"
        weight: 0.6
      - symbol: "MSFT"
        weight: 0.4

providers:
  yahoo:
    base_url: "https://query1.finance.yahoo.com"
  # alpha_vantage:
  #   base_url: "https://www.alphavantage.co"
  #   api_key: "YOUR_KEY"

analysis:
  risk_free_rate: 0.02
  periods_per_year: 252
  lookback_days: 730
  var_confidence: 0.95

simulation:
  n_simulations: 1000
  n_days: 252
  initial_investment: 10000.0
  # seed: 42
"#;

pub fn run() -> anyhow::Result<()> {
    let path = AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(&path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    println!("Created default configuration at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: AppConfig = serde_yaml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.portfolios.len(), 1);
        let weights: f64 = config.portfolios[0].holdings.iter().map(|h| h.weight).sum();
        assert!((weights - 1.0).abs() < 1e-9);
    }
}
