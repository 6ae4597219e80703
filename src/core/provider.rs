//! Extractor boundary: asynchronous historical price providers.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;

use crate::core::series::PriceBar;

#[async_trait]
pub trait HistoricalPriceProvider: Send + Sync {
    /// Daily bars for `symbol` over [start, end], ascending by date.
    async fn fetch_historical(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>>;

    /// Fetches several symbols concurrently; per-symbol failures stay
    /// per-symbol.
    async fn fetch_multiple(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> HashMap<String, Result<Vec<PriceBar>>> {
        let futures = symbols.iter().map(|symbol| async move {
            let bars = self.fetch_historical(symbol, start, end).await;
            (symbol.clone(), bars)
        });
        join_all(futures).await.into_iter().collect()
    }
}
