//! Alpha Vantage TIME_SERIES_DAILY client.
//!
//! The free tier is tightly rate limited (a handful of calls per minute);
//! throttle responses arrive as HTTP 200 with a "Note"/"Information" payload
//! and are surfaced as errors here.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::core::cache::Cache;
use crate::core::provider::HistoricalPriceProvider;
use crate::core::series::PriceBar;
use crate::providers::util::with_retry;

#[derive(Deserialize, Debug)]
struct DailyResponse {
    #[serde(rename = "Time Series (Daily)")]
    series: Option<HashMap<String, DailyBar>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Deserialize, Debug)]
struct DailyBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

pub struct AlphaVantageProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    cache: Cache<String, Vec<PriceBar>>,
}

impl AlphaVantageProvider {
    pub fn new(base_url: &str, api_key: &str, cache: Cache<String, Vec<PriceBar>>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
            cache,
        }
    }

    fn bars_from_series(
        symbol: &str,
        series: &HashMap<String, DailyBar>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>> {
        let mut bars = Vec::new();
        for (date_str, daily) in series {
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
                .map_err(|e| anyhow!("Bad date '{date_str}' for {symbol}: {e}"))?;
            if date < start || date > end {
                continue;
            }
            let close: f64 = daily
                .close
                .parse()
                .map_err(|_| anyhow!("Bad close '{}' for {symbol} on {date}", daily.close))?;
            bars.push(PriceBar {
                date,
                close,
                open: daily.open.parse().ok(),
                high: daily.high.parse().ok(),
                low: daily.low.parse().ok(),
                volume: daily.volume.parse().ok(),
            });
        }
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}

#[async_trait]
impl HistoricalPriceProvider for AlphaVantageProvider {
    #[instrument(skip(self))]
    async fn fetch_historical(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>> {
        let cache_key = format!("alpha_vantage:{symbol}:{start}:{end}");
        if let Some(bars) = self.cache.get(&cache_key).await {
            return Ok(bars);
        }

        let url = format!(
            "{}/query?function=TIME_SERIES_DAILY&symbol={symbol}&outputsize=full&apikey={}",
            self.base_url, self.api_key
        );
        debug!(symbol, "Fetching historical prices from Alpha Vantage");

        let response: DailyResponse = with_retry(
            || async {
                self.client
                    .get(&url)
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<DailyResponse>()
                    .await
            },
            2,
            Duration::from_millis(500),
        )
        .await?;

        if let Some(message) = response.error_message {
            return Err(anyhow!("Alpha Vantage error for {symbol}: {message}"));
        }
        if let Some(note) = response.note.or(response.information) {
            return Err(anyhow!("Alpha Vantage rate limit for {symbol}: {note}"));
        }
        let series = response
            .series
            .ok_or_else(|| anyhow!("No daily series returned for {symbol}"))?;

        let bars = Self::bars_from_series(symbol, &series, start, end)?;
        debug!(symbol, bars = bars.len(), "Fetched historical prices");
        self.cache.put(cache_key, bars.clone()).await;
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DAILY_BODY: &str = r#"{
        "Meta Data": {"2. Symbol": "IBM"},
        "Time Series (Daily)": {
            "2024-01-03": {"1. open": "160.1", "2. high": "161.0", "3. low": "159.5", "4. close": "160.8", "5. volume": "3200100"},
            "2024-01-02": {"1. open": "158.9", "2. high": "160.2", "3. low": "158.0", "4. close": "159.9", "5. volume": "2900400"},
            "2023-12-29": {"1. open": "157.0", "2. high": "158.1", "3. low": "156.8", "4. close": "157.9", "5. volume": "2100000"}
        }
    }"#;

    #[tokio::test]
    async fn test_fetch_parses_and_filters_range() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .and(query_param("symbol", "IBM"))
            .and(query_param("apikey", "demo"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DAILY_BODY))
            .mount(&server)
            .await;

        let provider = AlphaVantageProvider::new(&server.uri(), "demo", Cache::new());
        let bars = provider
            .fetch_historical(
                "IBM",
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            )
            .await
            .unwrap();

        // 2023-12-29 falls outside the range; the rest arrive ascending.
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].close, 159.9);
        assert_eq!(bars[1].close, 160.8);
        assert_eq!(bars[1].volume, Some(3200100));
    }

    #[tokio::test]
    async fn test_rate_limit_note_is_an_error() {
        let server = MockServer::start().await;
        let body = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API rate limit is 25 requests per day."}"#;
        Mock::given(method("GET"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let provider = AlphaVantageProvider::new(&server.uri(), "demo", Cache::new());
        let err = provider
            .fetch_historical(
                "IBM",
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rate limit"));
    }
}
