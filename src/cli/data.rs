//! Shared fetch-and-build pipeline for the command surfaces: resolve
//! providers from config, download every holding's history concurrently,
//! clean it if configured, and assemble portfolios.

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Duration, Utc};
use futures::future::join_all;
use tracing::{debug, info};

use crate::cli::ui;
use crate::config::{AppConfig, DataSource, PortfolioConfig};
use crate::core::cache::Cache;
use crate::core::cleaner;
use crate::core::portfolio::Portfolio;
use crate::core::provider::HistoricalPriceProvider;
use crate::core::series::{PriceBar, PriceSeries};
use crate::providers::alpha_vantage::AlphaVantageProvider;
use crate::providers::yahoo_finance::YahooFinanceProvider;

const YAHOO_DEFAULT_URL: &str = "https://query1.finance.yahoo.com";
const ALPHA_VANTAGE_DEFAULT_URL: &str = "https://www.alphavantage.co";

struct Providers {
    yahoo: YahooFinanceProvider,
    alpha_vantage: Option<AlphaVantageProvider>,
}

impl Providers {
    fn from_config(config: &AppConfig) -> Self {
        let cache = Cache::<String, Vec<PriceBar>>::new();
        let yahoo_url = config
            .providers
            .yahoo
            .as_ref()
            .map_or(YAHOO_DEFAULT_URL, |p| p.base_url.as_str());
        let yahoo = YahooFinanceProvider::new(yahoo_url, cache.clone());

        let alpha_vantage = config.providers.alpha_vantage.as_ref().and_then(|p| {
            p.api_key
                .as_ref()
                .map(|key| AlphaVantageProvider::new(&p.base_url, key, cache.clone()))
        });
        Providers {
            yahoo,
            alpha_vantage,
        }
    }

    fn select(&self, source: DataSource) -> Result<&dyn HistoricalPriceProvider> {
        match source {
            DataSource::Yahoo => Ok(&self.yahoo),
            DataSource::AlphaVantage => self
                .alpha_vantage
                .as_ref()
                .map(|p| p as &dyn HistoricalPriceProvider)
                .ok_or_else(|| {
                    anyhow!(
                        "Alpha Vantage provider is not configured \
                         (set providers.alpha_vantage.api_key)"
                    )
                }),
        }
    }
}

/// Fetches every symbol referenced by the config and builds all portfolios.
pub(crate) async fn load_portfolios(config: &AppConfig) -> Result<Vec<Portfolio>> {
    if config.portfolios.is_empty() {
        bail!("No portfolios configured");
    }

    let providers = Providers::from_config(config);

    let end = Utc::now().date_naive();
    let start = end - Duration::days(config.analysis.lookback_days);
    info!(%start, %end, "Fetching historical data");

    // Each symbol is fetched once even when it appears in several portfolios.
    let mut to_fetch: HashMap<String, DataSource> = HashMap::new();
    for portfolio in &config.portfolios {
        for holding in &portfolio.holdings {
            to_fetch.insert(holding.symbol.clone(), holding.source);
        }
    }

    let pb = ui::new_progress_bar(to_fetch.len() as u64);
    let futures = to_fetch.iter().map(|(symbol, source)| {
        let pb = pb.clone();
        let providers = &providers;
        async move {
            let result = match providers.select(*source) {
                Ok(provider) => provider.fetch_historical(symbol, start, end).await,
                Err(e) => Err(e),
            };
            pb.inc(1);
            (symbol.clone(), result)
        }
    });
    let fetched: HashMap<String, Result<Vec<PriceBar>>> =
        join_all(futures).await.into_iter().collect();
    pb.finish_and_clear();

    let mut portfolios = Vec::with_capacity(config.portfolios.len());
    for portfolio_config in &config.portfolios {
        portfolios.push(build_portfolio(config, portfolio_config, &fetched, &to_fetch)?);
    }
    Ok(portfolios)
}

fn build_portfolio(
    config: &AppConfig,
    portfolio_config: &PortfolioConfig,
    fetched: &HashMap<String, Result<Vec<PriceBar>>>,
    sources: &HashMap<String, DataSource>,
) -> Result<Portfolio> {
    let mut holdings = HashMap::new();
    let mut weights = HashMap::new();

    for holding in &portfolio_config.holdings {
        let bars = match fetched.get(&holding.symbol) {
            Some(Ok(bars)) => bars.clone(),
            Some(Err(e)) => bail!("Failed to fetch {}: {e}", holding.symbol),
            None => bail!("No data fetched for {}", holding.symbol),
        };
        let source_name = match sources[&holding.symbol] {
            DataSource::Yahoo => "yahoo",
            DataSource::AlphaVantage => "alpha_vantage",
        };
        let mut series =
            PriceSeries::new(holding.symbol.clone(), source_name, holding.asset_type, bars)
                .with_context(|| format!("Invalid price data for {}", holding.symbol))?;

        if let Some(method) = config.analysis.outlier_filter {
            series = cleaner::remove_outliers(&series, method, config.analysis.outlier_threshold)
                .with_context(|| format!("Outlier removal failed for {}", holding.symbol))?;
            debug!(symbol = %holding.symbol, len = series.len(), "Outliers removed");
        }
        if config.analysis.fill_missing_dates {
            series = cleaner::fill_missing_dates(&series, cleaner::FillMethod::Forward)
                .with_context(|| format!("Date filling failed for {}", holding.symbol))?;
        }

        holdings.insert(holding.symbol.clone(), series);
        weights.insert(holding.symbol.clone(), holding.weight);
    }

    let portfolio = Portfolio::new(portfolio_config.name.clone(), holdings, weights)
        .with_context(|| format!("Could not build portfolio '{}'", portfolio_config.name))?;
    info!(
        portfolio = portfolio.name(),
        observations = portfolio.aligned_dates().len(),
        "Portfolio ready"
    );
    Ok(portfolio)
}
