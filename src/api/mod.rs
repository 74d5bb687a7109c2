// Market data source module
// The core only needs candles, prices and a reachability check; Binance futures is the shipped source
pub mod binance;

pub use binance::BinanceFuturesClient;

use crate::models::{Candle, Timeframe};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("request failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

/// Last price and 24h change (percent) for a symbol
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ticker {
    pub price: f64,
    pub change_24h: f64,
}

/// Where candles and prices come from
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Most recent `limit` candles, oldest first
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ApiError>;

    async fn fetch_price(&self, symbol: &str) -> Result<Ticker, ApiError>;

    /// Whether the source answers at all. Never errors.
    async fn check_reachable(&self) -> bool;

    /// Release any held session
    async fn disconnect(&self) {}
}
