//! Core analysis engine: price series, statistics, portfolios and Monte
//! Carlo simulation. Pure in-memory computation; the network lives in
//! `crate::providers`.

pub mod cache;
pub mod cleaner;
pub mod error;
pub mod log;
pub mod portfolio;
pub mod provider;
pub mod series;
pub mod simulation;
pub mod stats;

pub use error::{AnalysisError, Result};
pub use portfolio::Portfolio;
pub use provider::HistoricalPriceProvider;
pub use series::{AssetType, PriceBar, PriceSeries};
pub use simulation::{MonteCarloSimulator, SimulationConfig, SimulationResult};
