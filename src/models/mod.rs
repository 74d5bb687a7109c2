use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candle duration bucket, using the exchange's interval codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "6h")]
    H6,
    #[serde(rename = "8h")]
    H8,
    #[serde(rename = "12h")]
    H12,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "3d")]
    D3,
    #[serde(rename = "1w")]
    W1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 14] = [
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H2,
        Timeframe::H4,
        Timeframe::H6,
        Timeframe::H8,
        Timeframe::H12,
        Timeframe::D1,
        Timeframe::D3,
        Timeframe::W1,
    ];

    /// Interval code as used by the exchange API ("1m", "4h", ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H2 => "2h",
            Timeframe::H4 => "4h",
            Timeframe::H6 => "6h",
            Timeframe::H8 => "8h",
            Timeframe::H12 => "12h",
            Timeframe::D1 => "1d",
            Timeframe::D3 => "3d",
            Timeframe::W1 => "1w",
        }
    }

    /// Length of one candle
    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::M1 => Duration::minutes(1),
            Timeframe::M3 => Duration::minutes(3),
            Timeframe::M5 => Duration::minutes(5),
            Timeframe::M15 => Duration::minutes(15),
            Timeframe::M30 => Duration::minutes(30),
            Timeframe::H1 => Duration::hours(1),
            Timeframe::H2 => Duration::hours(2),
            Timeframe::H4 => Duration::hours(4),
            Timeframe::H6 => Duration::hours(6),
            Timeframe::H8 => Duration::hours(8),
            Timeframe::H12 => Duration::hours(12),
            Timeframe::D1 => Duration::days(1),
            Timeframe::D3 => Duration::days(3),
            Timeframe::W1 => Duration::weeks(1),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown timeframe: {0}")]
pub struct ParseTimeframeError(String);

impl FromStr for Timeframe {
    type Err = ParseTimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .iter()
            .copied()
            .find(|tf| tf.as_str() == s.trim())
            .ok_or_else(|| ParseTimeframeError(s.to_string()))
    }
}

/// Short-horizon vs. long-horizon trading mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradingMode {
    #[serde(alias = "scalp", alias = "SCALP")]
    Scalp,
    #[serde(alias = "swing", alias = "SWING")]
    Swing,
}

impl TradingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingMode::Scalp => "Scalp",
            TradingMode::Swing => "Swing",
        }
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown trading mode: {0} (expected scalp or swing)")]
pub struct ParseModeError(String);

impl FromStr for TradingMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scalp" => Ok(TradingMode::Scalp),
            "swing" => Ok(TradingMode::Swing),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

/// OHLCV candlestick for one symbol and timeframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Latest traded price for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub price: f64,
    pub change_24h: f64,
    pub timestamp: DateTime<Utc>,
}

/// Indicator values for the most recent candle of a series.
///
/// `None` means the value could not be computed (short window, undefined
/// arithmetic). It is never encoded as NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub rsi: Option<f64>,
    pub ma_fast: Option<f64>,
    pub ma_slow: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
}

impl IndicatorSnapshot {
    /// Snapshot with every indicator absent
    pub fn empty(symbol: &str, timeframe: Timeframe, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe,
            timestamp,
            rsi: None,
            ma_fast: None,
            ma_slow: None,
            macd: None,
            macd_signal: None,
            macd_histogram: None,
            bb_upper: None,
            bb_middle: None,
            bb_lower: None,
        }
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => f.write_str("LONG"),
            Direction::Short => f.write_str("SHORT"),
        }
    }
}

/// Risk-sized trade idea. Never executed by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSuggestion {
    pub timestamp: DateTime<Utc>,
    pub mode: TradingMode,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub leverage: u32,
    pub reason: String,
    pub confidence: f64,
}

impl TradeSuggestion {
    /// Symbol without the USDT quote suffix ("BTCUSDT" -> "BTC")
    pub fn display_symbol(&self) -> &str {
        self.symbol.strip_suffix("USDT").unwrap_or(&self.symbol)
    }
}

impl fmt::Display for TradeSuggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} @ {:.2} | SL {:.2} | TP {:.2} | {}x | {:.0}% | {}",
            self.mode,
            self.display_symbol(),
            self.direction,
            self.entry_price,
            self.stop_loss,
            self.take_profit,
            self.leverage,
            self.confidence * 100.0,
            self.reason
        )
    }
}

/// Timestamped status message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}
