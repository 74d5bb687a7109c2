use crate::api::MarketDataSource;
use crate::config::{ConfigSource, Settings, SharedConfig, TradingConfig};
use crate::feed::{DataFetchLoop, FeedError, FeedSchedule, FeedState};
use crate::models::{LogLine, PriceQuote, TradeSuggestion, TradingMode};
use crate::store::{MarketDataStore, StoreError, SuggestionStats};
use crate::strategy::{AnalysisError, SuggestionGenerator};
use std::sync::Arc;

/// Owns the store, configuration, data feed and generator, and exposes the
/// commands and read-only snapshots a front end needs
pub struct TradingBot {
    config: SharedConfig,
    store: MarketDataStore,
    feed: DataFetchLoop,
    generator: SuggestionGenerator,
}

impl TradingBot {
    pub fn new(settings: Settings, source: Arc<dyn MarketDataSource>) -> Self {
        Self::with_store(settings, source, MarketDataStore::new())
    }

    pub fn with_store(settings: Settings, source: Arc<dyn MarketDataSource>, store: MarketDataStore) -> Self {
        let schedule = FeedSchedule::from(&settings.feed);
        let config = SharedConfig::new(settings);

        Self {
            feed: DataFetchLoop::new(source, store.clone(), schedule),
            generator: SuggestionGenerator::new(store.clone(), Arc::new(config.clone())),
            config,
            store,
        }
    }

    /// Start the data feed for the configured symbols
    pub fn start(&self) -> Result<(), FeedError> {
        let settings = self.config.snapshot();
        self.feed.start(settings.trading.symbols.clone(), settings.feed_timeframes())?;
        self.store.add_log("Bot started")?;
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), FeedError> {
        let result = self.feed.stop().await;
        self.store.add_log("Bot stopped")?;
        result
    }

    /// Load history and prices once without starting the feed
    pub async fn load_market_data(&self) -> Result<(), FeedError> {
        let settings = self.config.snapshot();
        self.feed
            .fetch_once(settings.trading.symbols.clone(), settings.feed_timeframes())
            .await
    }

    /// Analysis pass in the configured trading mode
    pub fn run_analysis(&self) -> Result<Vec<TradeSuggestion>, AnalysisError> {
        let trading = self.config.read_trading_config();
        self.store.add_log(format!(
            "🎯 Current config - Mode: {}, Capital: {}",
            trading.trading_mode, trading.available_capital
        ))?;
        self.generator.run_analysis(&trading.symbols, trading.trading_mode)
    }

    /// Analysis pass in an explicit mode, ignoring the configured one
    pub fn run_analysis_for(&self, mode: TradingMode) -> Result<Vec<TradeSuggestion>, AnalysisError> {
        let trading = self.config.read_trading_config();
        self.generator.run_analysis(&trading.symbols, mode)
    }

    pub fn feed_state(&self) -> FeedState {
        self.feed.state()
    }

    pub fn is_connected(&self) -> bool {
        self.feed.is_connected()
    }

    pub fn prices(&self) -> Result<Vec<PriceQuote>, StoreError> {
        self.store.prices()
    }

    pub fn latest_suggestions(&self, limit: usize) -> Result<Vec<TradeSuggestion>, StoreError> {
        self.store.latest_suggestions(limit)
    }

    pub fn logs(&self, limit: usize) -> Result<Vec<LogLine>, StoreError> {
        self.store.logs(limit)
    }

    pub fn stats(&self, limit: usize) -> Result<SuggestionStats, StoreError> {
        self.store.suggestion_stats(limit)
    }

    pub fn settings(&self) -> Settings {
        self.config.snapshot()
    }

    /// Replace the trading section (mode, capital, symbols...). Symbol and
    /// timeframe changes take effect on the next start.
    pub fn update_trading_config(&self, trading: TradingConfig) {
        self.config.update_trading_config(trading);
    }

    pub fn store(&self) -> &MarketDataStore {
        &self.store
    }
}
