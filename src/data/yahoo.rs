//! Yahoo Finance chart API client.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Bar, MarketDataSource};
use crate::config::http_client;
use crate::error::PipelineError;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteColumns {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Yahoo Finance data loader.
pub struct YahooFinanceSource {
    client: Client,
    base_url: String,
}

impl YahooFinanceSource {
    pub fn new() -> Result<Self, PipelineError> {
        Ok(Self {
            client: http_client(Duration::from_secs(30), Some("Mozilla/5.0 (compatible; stock-sentinel)"))?,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    fn parse_chart(symbol: &str, response: ChartResponse) -> Vec<Bar> {
        if let Some(err) = response.chart.error {
            warn!(symbol = %symbol, code = %err.code, "Yahoo chart error: {}", err.description);
            return Vec::new();
        }

        let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
            return Vec::new();
        };
        let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

        let at = |col: &[Option<f64>], i: usize| col.get(i).copied().flatten();

        result
            .timestamp
            .iter()
            .enumerate()
            .filter_map(|(i, &ts)| {
                let timestamp = Utc.timestamp_opt(ts, 0).single()?;
                Some(Bar {
                    timestamp,
                    open: at(&quote.open, i),
                    high: at(&quote.high, i),
                    low: at(&quote.low, i),
                    close: at(&quote.close, i),
                    volume: at(&quote.volume, i),
                })
            })
            .collect()
    }
}

#[async_trait]
impl MarketDataSource for YahooFinanceSource {
    async fn fetch(&self, symbol: &str, period: &str, interval: &str) -> Result<Vec<Bar>, PipelineError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let fetch_error = |e: reqwest::Error| PipelineError::Fetch {
            symbol: symbol.to_string(),
            reason: e.to_string(),
        };

        let response = self
            .client
            .get(&url)
            .query(&[("range", period), ("interval", interval)])
            .send()
            .await
            .map_err(fetch_error)?;

        // Yahoo answers unknown symbols with 404 and an error body
        let status = response.status();
        let body: ChartResponse = match response.json().await {
            Ok(body) => body,
            Err(e) if !status.is_success() => {
                warn!(symbol = %symbol, %status, "Yahoo request failed: {}", e);
                return Ok(Vec::new());
            }
            Err(e) => return Err(fetch_error(e)),
        };

        let bars = Self::parse_chart(symbol, body);
        debug!(symbol = %symbol, bars = bars.len(), period, interval, "fetched history");
        Ok(bars)
    }
}
