// =============================================================================
// Yahoo Finance Chart Client — historical OHLCV over HTTP
// =============================================================================
//
// Uses the public v8 chart endpoint. The request window is
// [now - timeframe.lookback(), now] at the timeframe's interval. Bars whose
// close is null (halted sessions, the still-forming bar) are dropped.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{MarketDataFetcher, PriceBar, PriceSeries};
use crate::types::Timeframe;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// The chart endpoint rejects requests without a browser-like agent.
const BROWSER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)";

// -----------------------------------------------------------------------------
// Response shape
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
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

// -----------------------------------------------------------------------------
// Client
// -----------------------------------------------------------------------------

/// HTTP client for the Yahoo Finance chart API.
#[derive(Clone)]
pub struct YahooClient {
    base_url: String,
    client: reqwest::Client,
}

impl YahooClient {
    /// Create a client with the given request timeout.
    pub fn new(timeout: Duration) -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_AGENT));

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");

        debug!(base_url = DEFAULT_BASE_URL, "YahooClient initialised");

        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
        }
    }

    /// Point the client at a different host (mirrors, local fixtures).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// GET /v8/finance/chart/{symbol} for the timeframe's lookback window.
    #[instrument(skip(self), name = "yahoo::get_chart")]
    pub async fn get_chart(&self, symbol: &str, timeframe: Timeframe) -> Result<PriceSeries> {
        let period2 = Utc::now().timestamp();
        let period1 = period2 - timeframe.lookback().as_secs() as i64;
        let url = format!(
            "{}/v8/finance/chart/{}",
            self.base_url,
            symbol.replace('^', "%5E")
        );

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", timeframe.interval().to_string()),
                ("includePrePost", "false".to_string()),
            ])
            .send()
            .await
            .with_context(|| format!("GET chart for {symbol} request failed"))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .with_context(|| format!("failed to read chart response for {symbol}"))?;

        if !status.is_success() {
            anyhow::bail!("chart API returned {} for {}: {}", status, symbol, body);
        }

        let series = parse_chart(symbol, timeframe, &body)?;
        debug!(symbol, interval = timeframe.interval(), count = series.len(), "chart fetched");
        Ok(series)
    }
}

#[async_trait]
impl MarketDataFetcher for YahooClient {
    async fn fetch(&self, symbol: &str, timeframe: Timeframe) -> Result<Option<PriceSeries>> {
        let series = self.get_chart(symbol, timeframe).await?;
        if !series.has_min_history() {
            debug!(symbol, bars = series.len(), "insufficient history");
            return Ok(None);
        }
        Ok(Some(series))
    }
}

impl std::fmt::Debug for YahooClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Parsing
// -----------------------------------------------------------------------------

/// Parse a chart response body into a [`PriceSeries`].
fn parse_chart(symbol: &str, timeframe: Timeframe, body: &str) -> Result<PriceSeries> {
    let envelope: ChartEnvelope =
        serde_json::from_str(body).context("failed to parse chart response")?;

    if let Some(err) = envelope.chart.error.filter(|e| !e.is_null()) {
        anyhow::bail!("chart API error for {symbol}: {err}");
    }

    let result = envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .with_context(|| format!("chart response for {symbol} has no result"))?;

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, &timestamp) in result.timestamp.iter().enumerate() {
        let Some(close) = field(&quote.close, i).filter(|c| c.is_finite()) else {
            continue;
        };
        bars.push(PriceBar {
            timestamp,
            open: field(&quote.open, i).unwrap_or(close),
            high: field(&quote.high, i).unwrap_or(close),
            low: field(&quote.low, i).unwrap_or(close),
            close,
            volume: field(&quote.volume, i).unwrap_or(0.0),
        });
    }

    Ok(PriceSeries::new(symbol, timeframe, bars))
}

fn field(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}
