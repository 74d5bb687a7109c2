use super::{ApiError, MarketDataSource, Ticker};
use crate::config::FeedConfig;
use crate::models::{Candle, Timeframe};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

pub const BINANCE_FUTURES_API_BASE: &str = "https://fapi.binance.com";
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;

type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Binance USDⓈ-M futures public REST client
///
/// Cloneable; all clones share the same rate limiter.
#[derive(Clone)]
pub struct BinanceFuturesClient {
    client: Client,
    base_url: String,
    rate_limiter: Arc<BinanceRateLimiter>,
    max_retries: u32,
    initial_backoff: Duration,
}

/// Response from /fapi/v1/ticker/24hr
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    last_price: String,
    price_change_percent: String,
}

impl BinanceFuturesClient {
    pub fn new(
        base_url: impl Into<String>,
        requests_per_minute: u32,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(rpm)));

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter,
            max_retries: MAX_RETRIES,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    pub fn from_config(config: &FeedConfig) -> Result<Self, ApiError> {
        Self::new(
            config.base_url.clone(),
            config.requests_per_minute,
            config.request_timeout(),
        )
    }

    /// Override attempts per request and the first backoff delay (doubled per retry)
    pub fn with_retry_policy(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Rate-limited GET, retried with exponential backoff on 429, 5xx and network errors
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_error = String::new();

        for attempt in 1..=self.max_retries {
            self.rate_limiter.until_ready().await;

            match self.client.get(&url).query(query).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    if status.as_u16() != 429 && !status.is_server_error() {
                        // Other 4xx: the request itself is wrong, retrying won't help
                        let body = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Unknown error".to_string());
                        return Err(ApiError::Status {
                            status: status.as_u16(),
                            body,
                        });
                    }

                    last_error = format!("status {}", status);
                }
                Err(e) => last_error = e.to_string(),
            }

            if attempt < self.max_retries {
                let backoff = self.initial_backoff * 2u32.pow(attempt - 1);
                tracing::warn!(
                    "Attempt {}/{} failed for {}: {}. Retrying in {}ms...",
                    attempt,
                    self.max_retries,
                    path,
                    last_error,
                    backoff.as_millis()
                );
                tokio::time::sleep(backoff).await;
            }
        }

        Err(ApiError::RetriesExhausted {
            attempts: self.max_retries,
            last: last_error,
        })
    }
}

/// Kline numbers arrive as JSON strings ("101.5"); accept plain numbers too
fn number(value: &Value, field: &str) -> Result<f64, ApiError> {
    let parsed = match value {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };

    parsed.ok_or_else(|| ApiError::Malformed(format!("kline {} is not a number: {}", field, value)))
}

/// Parse one kline row: `[open_time_ms, open, high, low, close, volume, ...]`
fn parse_kline(row: &[Value], symbol: &str, timeframe: Timeframe) -> Result<Candle, ApiError> {
    if row.len() < 6 {
        return Err(ApiError::Malformed(format!(
            "kline row has {} fields, expected at least 6",
            row.len()
        )));
    }

    let open_time = row[0]
        .as_i64()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .ok_or_else(|| ApiError::Malformed(format!("kline open time invalid: {}", row[0])))?;

    Ok(Candle {
        symbol: symbol.to_string(),
        timeframe,
        timestamp: open_time,
        open: number(&row[1], "open")?,
        high: number(&row[2], "high")?,
        low: number(&row[3], "low")?,
        close: number(&row[4], "close")?,
        volume: number(&row[5], "volume")?,
    })
}

#[async_trait]
impl MarketDataSource for BinanceFuturesClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ApiError> {
        let query = [
            ("symbol", symbol.to_string()),
            ("interval", timeframe.as_str().to_string()),
            ("limit", limit.to_string()),
        ];

        let rows: Vec<Vec<Value>> = self.get("/fapi/v1/klines", &query).await?.json().await?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in &rows {
            match parse_kline(row, symbol, timeframe) {
                Ok(candle) => candles.push(candle),
                Err(e) => tracing::warn!("Skipping kline for {} {}: {}", symbol, timeframe, e),
            }
        }

        Ok(candles)
    }

    async fn fetch_price(&self, symbol: &str) -> Result<Ticker, ApiError> {
        let query = [("symbol", symbol.to_string())];
        let ticker: Ticker24h = self.get("/fapi/v1/ticker/24hr", &query).await?.json().await?;

        let price = ticker
            .last_price
            .parse::<f64>()
            .map_err(|_| ApiError::Malformed(format!("lastPrice: {}", ticker.last_price)))?;
        let change_24h = ticker
            .price_change_percent
            .parse::<f64>()
            .map_err(|_| ApiError::Malformed(format!("priceChangePercent: {}", ticker.price_change_percent)))?;

        Ok(Ticker { price, change_24h })
    }

    async fn check_reachable(&self) -> bool {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/fapi/v1/ping", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!("Ping to {} failed: {}", self.base_url, e);
                false
            }
        }
    }
}
