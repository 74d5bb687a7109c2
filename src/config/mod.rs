// Configuration module
// Defaults -> optional TOML file -> FUTUREBOT__* environment overrides
use crate::indicators::IndicatorParams;
use crate::models::{Timeframe, TradingMode};
use crate::risk::RiskConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "futurebot.toml";

/// Environment variable prefix; nested keys use `__`
/// (`FUTUREBOT__TRADING__AVAILABLE_CAPITAL=5000`)
pub const ENV_PREFIX: &str = "FUTUREBOT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// What to trade and with how much
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub trading_mode: TradingMode,
    pub available_capital: f64,
    pub target_profit_per_trade: f64,
    pub max_loss_per_trade: f64,
    #[serde(alias = "tokens")]
    pub symbols: Vec<String>,
    /// Timeframes the feed keeps loaded
    pub timeframes: Vec<Timeframe>,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            trading_mode: TradingMode::Scalp,
            available_capital: 10000.0,
            target_profit_per_trade: 50.0,
            max_loss_per_trade: 25.0,
            symbols: vec!["BTCUSDT".to_string(), "SOLUSDT".to_string(), "ETHUSDT".to_string()],
            timeframes: vec![
                Timeframe::M1,
                Timeframe::M5,
                Timeframe::M15,
                Timeframe::M30,
                Timeframe::H1,
                Timeframe::H4,
                Timeframe::D1,
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    pub scalp: IndicatorParams,
    pub swing: IndicatorParams,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            scalp: IndicatorParams::scalp(),
            swing: IndicatorParams::swing(),
        }
    }
}

/// Market data endpoint and refresh cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    pub price_interval_secs: u64,
    pub candle_interval_secs: u64,
    pub backfill_limit: usize,
    pub refresh_limit: usize,
    pub requests_per_minute: u32,
    pub request_timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: crate::api::binance::BINANCE_FUTURES_API_BASE.to_string(),
            price_interval_secs: 5,
            candle_interval_secs: 30,
            backfill_limit: 200,
            refresh_limit: 2,
            requests_per_minute: 1200,
            request_timeout_secs: 10,
        }
    }
}

impl FeedConfig {
    pub fn price_interval(&self) -> Duration {
        Duration::from_secs(self.price_interval_secs)
    }

    pub fn candle_interval(&self) -> Duration {
        Duration::from_secs(self.candle_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Complete bot configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub trading: TradingConfig,
    pub scalp_timeframes: Vec<Timeframe>,
    pub swing_timeframes: Vec<Timeframe>,
    pub indicators: IndicatorSettings,
    pub risk_management: RiskConfig,
    pub feed: FeedConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trading: TradingConfig::default(),
            scalp_timeframes: vec![Timeframe::M1, Timeframe::M5, Timeframe::M15],
            swing_timeframes: vec![Timeframe::H1, Timeframe::H4, Timeframe::D1],
            indicators: IndicatorSettings::default(),
            risk_management: RiskConfig::default(),
            feed: FeedConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path` (or `futurebot.toml` if present) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => ::config::File::from(p).required(true),
            None => ::config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings: Settings = ::config::Config::builder()
            .add_source(file)
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("trading.symbols")
                    .with_list_parse_key("trading.timeframes")
                    .with_list_parse_key("scalp_timeframes")
                    .with_list_parse_key("swing_timeframes")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Structural checks. Capital and risk values are not checked here;
    /// out-of-range values make sizing reject suggestions instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trading.symbols.is_empty() {
            return Err(ConfigError::Invalid("trading.symbols is empty".to_string()));
        }
        if self.feed.price_interval_secs == 0 || self.feed.candle_interval_secs == 0 {
            return Err(ConfigError::Invalid("feed intervals must be > 0".to_string()));
        }
        if self.feed.refresh_limit == 0 {
            return Err(ConfigError::Invalid("feed.refresh_limit must be > 0".to_string()));
        }

        for (mode, params) in [("scalp", &self.indicators.scalp), ("swing", &self.indicators.swing)] {
            params
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("indicators.{}: {}", mode, e)))?;
        }

        Ok(())
    }

    pub fn timeframes_for_mode(&self, mode: TradingMode) -> &[Timeframe] {
        match mode {
            TradingMode::Scalp => &self.scalp_timeframes,
            TradingMode::Swing => &self.swing_timeframes,
        }
    }

    /// Timeframes the feed loads: the configured list plus both modes' analysis timeframes
    pub fn feed_timeframes(&self) -> Vec<Timeframe> {
        let mut timeframes: Vec<Timeframe> = self
            .trading
            .timeframes
            .iter()
            .chain(&self.scalp_timeframes)
            .chain(&self.swing_timeframes)
            .copied()
            .collect();
        timeframes.sort();
        timeframes.dedup();
        timeframes
    }

    pub fn indicator_params(&self, mode: TradingMode) -> &IndicatorParams {
        match mode {
            TradingMode::Scalp => &self.indicators.scalp,
            TradingMode::Swing => &self.indicators.swing,
        }
    }
}

/// Read/write access to the live configuration
pub trait ConfigSource: Send + Sync {
    fn read_trading_config(&self) -> TradingConfig;

    fn read_risk_config(&self) -> RiskConfig;

    fn read_indicator_params(&self, mode: TradingMode) -> IndicatorParams;

    fn timeframes_for_mode(&self, mode: TradingMode) -> Vec<Timeframe>;

    fn update_trading_config(&self, config: TradingConfig);
}

/// In-memory settings shared between the bot's components
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<Settings>>,
}

impl SharedConfig {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Copy of the full settings
    pub fn snapshot(&self) -> Settings {
        self.read(|s| s.clone())
    }

    // Settings are plain values, so a poisoned lock still holds a usable copy
    fn read<T>(&self, f: impl FnOnce(&Settings) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }
}

impl ConfigSource for SharedConfig {
    fn read_trading_config(&self) -> TradingConfig {
        self.read(|s| s.trading.clone())
    }

    fn read_risk_config(&self) -> RiskConfig {
        self.read(|s| s.risk_management.clone())
    }

    fn read_indicator_params(&self, mode: TradingMode) -> IndicatorParams {
        self.read(|s| s.indicator_params(mode).clone())
    }

    fn timeframes_for_mode(&self, mode: TradingMode) -> Vec<Timeframe> {
        self.read(|s| s.timeframes_for_mode(mode).to_vec())
    }

    fn update_trading_config(&self, config: TradingConfig) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        tracing::info!(
            "⚙️  Trading config updated - Mode: {}, Capital: {}",
            config.trading_mode,
            config.available_capital
        );
        guard.trading = config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("futurebot-{}-{}.toml", name, std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.trading.trading_mode, TradingMode::Scalp);
        assert_eq!(settings.trading.available_capital, 10000.0);
        assert_eq!(settings.trading.symbols, vec!["BTCUSDT", "SOLUSDT", "ETHUSDT"]);
        assert_eq!(settings.risk_management.max_leverage, 20);
        assert_eq!(settings.risk_management.risk_per_trade, 0.02);
        assert_eq!(settings.indicators.swing.ma_slow, 50);
        assert_eq!(settings.feed.backfill_limit, 200);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let path = write_temp(
            "partial",
            r#"
[trading]
trading_mode = "Swing"
available_capital = 2500.0
tokens = ["BTCUSDT"]

[risk_management]
max_leverage = 5
"#,
        );

        let settings = Settings::load(Some(path.as_path())).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(settings.trading.trading_mode, TradingMode::Swing);
        assert_eq!(settings.trading.available_capital, 2500.0);
        assert_eq!(settings.trading.symbols, vec!["BTCUSDT"]);
        assert_eq!(settings.risk_management.max_leverage, 5);
        assert_eq!(settings.risk_management.risk_per_trade, 0.02);
        assert_eq!(settings.swing_timeframes, vec![Timeframe::H1, Timeframe::H4, Timeframe::D1]);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let path = write_temp(
            "invalid",
            r#"
[indicators.scalp]
rsi_period = 0
ma_fast = 10
ma_slow = 20
macd_fast = 12
macd_slow = 26
macd_signal = 9
"#,
        );

        let result = Settings::load(Some(path.as_path()));
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = Settings::load(Some(Path::new("/nonexistent/futurebot.toml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_feed_timeframes_cover_both_modes() {
        let mut settings = Settings::default();
        settings.trading.timeframes = vec![Timeframe::M30, Timeframe::M1];

        assert_eq!(
            settings.feed_timeframes(),
            vec![
                Timeframe::M1,
                Timeframe::M5,
                Timeframe::M15,
                Timeframe::M30,
                Timeframe::H1,
                Timeframe::H4,
                Timeframe::D1
            ]
        );
    }

    #[test]
    fn test_shared_config_reads_per_mode() {
        let shared = SharedConfig::new(Settings::default());
        assert_eq!(
            shared.timeframes_for_mode(TradingMode::Swing),
            vec![Timeframe::H1, Timeframe::H4, Timeframe::D1]
        );
        assert_eq!(shared.read_indicator_params(TradingMode::Scalp).ma_fast, 10);
        assert_eq!(shared.read_indicator_params(TradingMode::Swing).ma_fast, 20);
    }

    #[test]
    fn test_update_trading_config_visible_to_clones() {
        let shared = SharedConfig::new(Settings::default());
        let other = shared.clone();

        let mut trading = shared.read_trading_config();
        trading.trading_mode = TradingMode::Swing;
        trading.available_capital = 500.0;
        shared.update_trading_config(trading);

        assert_eq!(other.read_trading_config().trading_mode, TradingMode::Swing);
        assert_eq!(other.snapshot().trading.available_capital, 500.0);
    }
}
