//! Yahoo Finance chart API client.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::cache::Cache;
use crate::core::provider::HistoricalPriceProvider;
use crate::core::series::PriceBar;
use crate::providers::util::with_retry;

#[derive(Deserialize, Debug)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Deserialize, Debug)]
struct Chart {
    result: Option<Vec<ChartItem>>,
    error: Option<serde_json::Value>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug, Default)]
struct Quote {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<u64>>>,
}

pub struct YahooFinanceProvider {
    base_url: String,
    client: reqwest::Client,
    cache: Cache<String, Vec<PriceBar>>,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str, cache: Cache<String, Vec<PriceBar>>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            cache,
        }
    }

    fn bars_from_chart(item: &ChartItem) -> Result<Vec<PriceBar>> {
        let timestamps = item
            .timestamp
            .as_ref()
            .ok_or_else(|| anyhow!("Chart response has no timestamps"))?;
        let quote = item
            .indicators
            .quote
            .first()
            .ok_or_else(|| anyhow!("Chart response has no quote block"))?;
        let closes = quote
            .close
            .as_ref()
            .ok_or_else(|| anyhow!("Chart response has no close prices"))?;

        let column = |xs: &Option<Vec<Option<f64>>>, i: usize| xs.as_ref().and_then(|v| v.get(i).copied().flatten());

        let mut bars: Vec<PriceBar> = Vec::with_capacity(timestamps.len());
        for (i, ts) in timestamps.iter().enumerate() {
            let Some(close) = closes.get(i).copied().flatten() else {
                continue;
            };
            let Some(date) = Utc.timestamp_opt(*ts, 0).single().map(|dt| dt.date_naive()) else {
                continue;
            };
            // Intraday rows can repeat the last trading date; keep the first.
            if bars.last().is_some_and(|b: &PriceBar| b.date == date) {
                continue;
            }
            bars.push(PriceBar {
                date,
                close,
                open: column(&quote.open, i),
                high: column(&quote.high, i),
                low: column(&quote.low, i),
                volume: quote.volume.as_ref().and_then(|v| v.get(i).copied().flatten()),
            });
        }
        Ok(bars)
    }
}

#[async_trait]
impl HistoricalPriceProvider for YahooFinanceProvider {
    #[instrument(skip(self))]
    async fn fetch_historical(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>> {
        let cache_key = format!("yahoo:{symbol}:{start}:{end}");
        if let Some(bars) = self.cache.get(&cache_key).await {
            return Ok(bars);
        }

        let period1 = start.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp();
        // period2 is exclusive; push it one day past `end`.
        let period2 = (end + chrono::Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp();
        let url = format!(
            "{}/v8/finance/chart/{symbol}?period1={period1}&period2={period2}&interval=1d",
            self.base_url
        );
        debug!(%url, "Fetching historical prices from Yahoo Finance");

        let response: ChartResponse = with_retry(
            || async {
                self.client
                    .get(&url)
                    .header("User-Agent", "Mozilla/5.0")
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<ChartResponse>()
                    .await
            },
            2,
            Duration::from_millis(250),
        )
        .await?;

        if let Some(error) = response.chart.error {
            return Err(anyhow!("Yahoo Finance error for {symbol}: {error}"));
        }
        let item = response
            .chart
            .result
            .as_ref()
            .and_then(|items| items.first())
            .ok_or_else(|| anyhow!("No chart data returned for {symbol}"))?;

        let bars = Self::bars_from_chart(item)?;
        debug!(symbol, bars = bars.len(), "Fetched historical prices");
        self.cache.put(cache_key, bars.clone()).await;
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chart_body(timestamps: &[i64], closes: &[f64]) -> String {
        format!(
            r#"{{"chart":{{"result":[{{"timestamp":{:?},"indicators":{{"quote":[{{"close":{:?}}}]}}}}],"error":null}}}}"#,
            timestamps, closes
        )
    }

    #[tokio::test]
    async fn test_fetch_historical_parses_bars() {
        let server = MockServer::start().await;
        // 2024-01-02, 2024-01-03, 2024-01-04 at 00:00 UTC.
        let body = chart_body(&[1704153600, 1704240000, 1704326400], &[185.5, 184.2, 186.0]);
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let provider = YahooFinanceProvider::new(&server.uri(), Cache::new());
        let bars = provider
            .fetch_historical(
                "AAPL",
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].close, 185.5);
        assert_eq!(bars[2].close, 186.0);
    }

    #[tokio::test]
    async fn test_null_closes_are_skipped() {
        let server = MockServer::start().await;
        let body = r#"{"chart":{"result":[{"timestamp":[1704153600,1704240000],"indicators":{"quote":[{"close":[185.5,null]}]}}],"error":null}}"#;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let provider = YahooFinanceProvider::new(&server.uri(), Cache::new());
        let bars = provider
            .fetch_historical(
                "AAPL",
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(bars.len(), 1);
    }

    #[tokio::test]
    async fn test_error_payload_is_surfaced() {
        let server = MockServer::start().await;
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/NOPE"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let provider = YahooFinanceProvider::new(&server.uri(), Cache::new());
        let err = provider
            .fetch_historical(
                "NOPE",
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("NOPE"));
    }

    #[tokio::test]
    async fn test_second_fetch_hits_cache() {
        let server = MockServer::start().await;
        let body = chart_body(&[1704153600, 1704240000], &[185.5, 184.2]);
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let provider = YahooFinanceProvider::new(&server.uri(), Cache::new());
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let first = provider.fetch_historical("AAPL", start, end).await.unwrap();
        let second = provider.fetch_historical("AAPL", start, end).await.unwrap();
        assert_eq!(first, second);
    }
}
