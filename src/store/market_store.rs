use crate::models::{Candle, IndicatorSnapshot, LogLine, PriceQuote, Timeframe, TradeSuggestion};
use crate::models::{Direction, TradingMode};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub const MAX_CANDLES_PER_SERIES: usize = 1000;
pub const MAX_SUGGESTIONS: usize = 100;
pub const MAX_LOG_LINES: usize = 100;

type SeriesKey = (String, Timeframe);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A writer panicked while holding one of the store's locks.
    #[error("market data store lock poisoned: {0}")]
    Poisoned(&'static str),
}

/// Outcome of inserting one candle into its series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleInsert {
    Appended,
    /// Same timestamp as the series tail: the still-open candle was refreshed
    ReplacedTail,
    /// Older than the series tail, dropped to keep the series ordered
    Rejected,
}

impl CandleInsert {
    pub fn is_stored(&self) -> bool {
        !matches!(self, CandleInsert::Rejected)
    }
}

/// Counts over the most recent suggestions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestionStats {
    pub total: usize,
    pub long: usize,
    pub short: usize,
    pub scalp: usize,
    pub swing: usize,
    pub average_confidence: f64,
}

/// Append-only status sink
pub trait LogSink: Send + Sync {
    fn append(&self, line: &str);
}

/// Thread-safe in-memory state shared by the fetch loop and analysis passes
///
/// Owns candle series per (symbol, timeframe), the latest indicator snapshot
/// per series, the latest price per symbol, and bounded suggestion and log
/// histories. Every mutation happens under a single write lock, so readers
/// never see a half-applied append or trim.
#[derive(Clone)]
pub struct MarketDataStore {
    candles: Arc<RwLock<HashMap<SeriesKey, VecDeque<Candle>>>>,
    indicators: Arc<RwLock<HashMap<SeriesKey, IndicatorSnapshot>>>,
    prices: Arc<RwLock<HashMap<String, PriceQuote>>>,
    suggestions: Arc<RwLock<VecDeque<TradeSuggestion>>>,
    logs: Arc<RwLock<VecDeque<LogLine>>>,
    max_candles: usize,
    max_suggestions: usize,
    max_logs: usize,
}

fn read<'a, T>(lock: &'a RwLock<T>, name: &'static str) -> Result<RwLockReadGuard<'a, T>, StoreError> {
    lock.read().map_err(|_| StoreError::Poisoned(name))
}

fn write<'a, T>(lock: &'a RwLock<T>, name: &'static str) -> Result<RwLockWriteGuard<'a, T>, StoreError> {
    lock.write().map_err(|_| StoreError::Poisoned(name))
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T, max: usize) {
    queue.push_back(item);
    while queue.len() > max {
        queue.pop_front();
    }
}

fn tail<T: Clone>(queue: &VecDeque<T>, limit: usize) -> Vec<T> {
    let skip = queue.len().saturating_sub(limit);
    queue.iter().skip(skip).cloned().collect()
}

impl MarketDataStore {
    pub fn new() -> Self {
        Self::with_limits(MAX_CANDLES_PER_SERIES, MAX_SUGGESTIONS, MAX_LOG_LINES)
    }

    /// Create a store with custom caps
    ///
    /// # Arguments
    /// * `max_candles` - Candles kept per (symbol, timeframe) series
    /// * `max_suggestions` - Suggestions kept in the history
    /// * `max_logs` - Log lines kept in the history
    pub fn with_limits(max_candles: usize, max_suggestions: usize, max_logs: usize) -> Self {
        Self {
            candles: Arc::new(RwLock::new(HashMap::new())),
            indicators: Arc::new(RwLock::new(HashMap::new())),
            prices: Arc::new(RwLock::new(HashMap::new())),
            suggestions: Arc::new(RwLock::new(VecDeque::new())),
            logs: Arc::new(RwLock::new(VecDeque::new())),
            max_candles,
            max_suggestions,
            max_logs,
        }
    }

    // ---- candles ----

    /// Insert a candle into its (symbol, timeframe) series
    ///
    /// Newer candles are appended, a candle with the tail's timestamp replaces
    /// the tail, and older candles are rejected. The oldest candles are evicted
    /// once the series exceeds its cap.
    pub fn add_candle(&self, candle: Candle) -> Result<CandleInsert, StoreError> {
        let mut data = write(&self.candles, "candles")?;

        let series = data
            .entry((candle.symbol.clone(), candle.timeframe))
            .or_default();

        let last_timestamp = series.back().map(|c| c.timestamp);
        let outcome = match last_timestamp {
            Some(last) if candle.timestamp < last => CandleInsert::Rejected,
            Some(last) if candle.timestamp == last => {
                if let Some(slot) = series.back_mut() {
                    *slot = candle;
                }
                CandleInsert::ReplacedTail
            }
            _ => {
                push_bounded(series, candle, self.max_candles);
                CandleInsert::Appended
            }
        };

        Ok(outcome)
    }

    /// Insert candles in order, returning how many were stored
    pub fn add_candles<I>(&self, candles: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = Candle>,
    {
        let mut stored = 0;
        for candle in candles {
            if self.add_candle(candle)?.is_stored() {
                stored += 1;
            }
        }
        Ok(stored)
    }

    /// Get a copy of the whole series
    pub fn candles(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Candle>, StoreError> {
        let data = read(&self.candles, "candles")?;
        Ok(data
            .get(&(symbol.to_string(), timeframe))
            .map(|deque| deque.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Get the N most recent candles of a series
    pub fn recent_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        n: usize,
    ) -> Result<Vec<Candle>, StoreError> {
        let data = read(&self.candles, "candles")?;
        Ok(data
            .get(&(symbol.to_string(), timeframe))
            .map(|deque| tail(deque, n))
            .unwrap_or_default())
    }

    pub fn candle_count(&self, symbol: &str, timeframe: Timeframe) -> Result<usize, StoreError> {
        let data = read(&self.candles, "candles")?;
        Ok(data
            .get(&(symbol.to_string(), timeframe))
            .map(|d| d.len())
            .unwrap_or(0))
    }

    /// All (symbol, timeframe) pairs holding candles, sorted
    pub fn series(&self) -> Result<Vec<(String, Timeframe)>, StoreError> {
        let data = read(&self.candles, "candles")?;
        let mut keys: Vec<_> = data.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    // ---- indicators ----

    /// Record a snapshot, replacing the previous one for its series
    pub fn set_indicators(&self, snapshot: IndicatorSnapshot) -> Result<(), StoreError> {
        let mut data = write(&self.indicators, "indicators")?;
        data.insert((snapshot.symbol.clone(), snapshot.timeframe), snapshot);
        Ok(())
    }

    pub fn indicators(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<IndicatorSnapshot>, StoreError> {
        let data = read(&self.indicators, "indicators")?;
        Ok(data.get(&(symbol.to_string(), timeframe)).cloned())
    }

    /// Drop the snapshot for a series whose indicators could not be computed
    pub fn clear_indicators(&self, symbol: &str, timeframe: Timeframe) -> Result<(), StoreError> {
        let mut data = write(&self.indicators, "indicators")?;
        data.remove(&(symbol.to_string(), timeframe));
        Ok(())
    }

    // ---- prices ----

    pub fn update_price(&self, symbol: &str, price: f64, change_24h: f64) -> Result<(), StoreError> {
        let quote = PriceQuote {
            symbol: symbol.to_string(),
            price,
            change_24h,
            timestamp: Utc::now(),
        };
        let mut data = write(&self.prices, "prices")?;
        data.insert(symbol.to_string(), quote);
        Ok(())
    }

    pub fn price(&self, symbol: &str) -> Result<Option<PriceQuote>, StoreError> {
        let data = read(&self.prices, "prices")?;
        Ok(data.get(symbol).cloned())
    }

    /// Snapshot of every known quote, sorted by symbol
    pub fn prices(&self) -> Result<Vec<PriceQuote>, StoreError> {
        let data = read(&self.prices, "prices")?;
        let mut quotes: Vec<_> = data.values().cloned().collect();
        quotes.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(quotes)
    }

    // ---- suggestions ----

    pub fn add_suggestion(&self, suggestion: TradeSuggestion) -> Result<(), StoreError> {
        let mut data = write(&self.suggestions, "suggestions")?;
        push_bounded(&mut data, suggestion, self.max_suggestions);
        Ok(())
    }

    /// Most recent suggestions, oldest first
    pub fn latest_suggestions(&self, limit: usize) -> Result<Vec<TradeSuggestion>, StoreError> {
        let data = read(&self.suggestions, "suggestions")?;
        Ok(tail(&data, limit))
    }

    pub fn suggestion_count(&self) -> Result<usize, StoreError> {
        Ok(read(&self.suggestions, "suggestions")?.len())
    }

    /// Direction and mode counts over the latest `limit` suggestions
    pub fn suggestion_stats(&self, limit: usize) -> Result<SuggestionStats, StoreError> {
        let latest = self.latest_suggestions(limit)?;
        if latest.is_empty() {
            return Ok(SuggestionStats::default());
        }

        let mut stats = SuggestionStats {
            total: latest.len(),
            ..Default::default()
        };
        for suggestion in &latest {
            match suggestion.direction {
                Direction::Long => stats.long += 1,
                Direction::Short => stats.short += 1,
            }
            match suggestion.mode {
                TradingMode::Scalp => stats.scalp += 1,
                TradingMode::Swing => stats.swing += 1,
            }
        }
        stats.average_confidence =
            latest.iter().map(|s| s.confidence).sum::<f64>() / latest.len() as f64;

        Ok(stats)
    }

    // ---- logs ----

    /// Append a status line; also forwarded to tracing
    pub fn add_log(&self, message: impl Into<String>) -> Result<(), StoreError> {
        let line = LogLine {
            timestamp: Utc::now(),
            message: message.into(),
        };
        tracing::info!("{}", line.message);

        let mut data = write(&self.logs, "logs")?;
        push_bounded(&mut data, line, self.max_logs);
        Ok(())
    }

    /// Most recent log lines, oldest first
    pub fn logs(&self, limit: usize) -> Result<Vec<LogLine>, StoreError> {
        let data = read(&self.logs, "logs")?;
        Ok(tail(&data, limit))
    }
}

impl Default for MarketDataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for MarketDataStore {
    fn append(&self, line: &str) {
        if let Err(e) = self.add_log(line) {
            tracing::error!("Dropped log line {:?}: {}", line, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone};

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn create_test_candle(symbol: &str, minute: i64, price: f64) -> Candle {
        Candle {
            symbol: symbol.to_string(),
            timeframe: Timeframe::M1,
            timestamp: at(minute),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 1000.0,
        }
    }

    fn create_test_suggestion(i: usize, direction: Direction, mode: TradingMode) -> TradeSuggestion {
        TradeSuggestion {
            timestamp: at(i as i64),
            mode,
            symbol: "BTCUSDT".to_string(),
            direction,
            entry_price: 100.0 + i as f64,
            stop_loss: 99.0,
            take_profit: 101.0,
            leverage: 1,
            reason: format!("#{}", i),
            confidence: 0.7,
        }
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = MarketDataStore::new();
        assert!(store.series().unwrap().is_empty());
        assert!(store.prices().unwrap().is_empty());
        assert!(store.latest_suggestions(10).unwrap().is_empty());
        assert!(store.logs(10).unwrap().is_empty());
    }

    #[test]
    fn test_add_and_get_candles() {
        let store = MarketDataStore::new();

        store.add_candle(create_test_candle("SOLUSDT", 0, 100.0)).unwrap();
        store.add_candle(create_test_candle("SOLUSDT", 1, 101.0)).unwrap();
        store.add_candle(create_test_candle("SOLUSDT", 2, 102.0)).unwrap();

        let candles = store.candles("SOLUSDT", Timeframe::M1).unwrap();
        assert_eq!(candles.len(), 3);
        assert_eq!(candles[0].close, 100.0);
        assert_eq!(candles[2].close, 102.0);
        assert!(store.candles("SOLUSDT", Timeframe::M5).unwrap().is_empty());
    }

    #[test]
    fn test_series_capped_at_1000_oldest_evicted() {
        let store = MarketDataStore::new();

        for i in 0..1250 {
            store
                .add_candle(create_test_candle("BTCUSDT", i, i as f64))
                .unwrap();
        }

        let candles = store.candles("BTCUSDT", Timeframe::M1).unwrap();
        assert_eq!(candles.len(), MAX_CANDLES_PER_SERIES);
        assert_eq!(candles[0].close, 250.0);
        assert_eq!(candles[999].close, 1249.0);
        assert!(candles.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_same_timestamp_replaces_tail() {
        let store = MarketDataStore::new();

        assert_eq!(
            store.add_candle(create_test_candle("BTCUSDT", 0, 100.0)).unwrap(),
            CandleInsert::Appended
        );
        assert_eq!(
            store.add_candle(create_test_candle("BTCUSDT", 0, 105.0)).unwrap(),
            CandleInsert::ReplacedTail
        );

        let candles = store.candles("BTCUSDT", Timeframe::M1).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].close, 105.0);
    }

    #[test]
    fn test_older_candle_rejected() {
        let store = MarketDataStore::new();

        store.add_candle(create_test_candle("BTCUSDT", 5, 100.0)).unwrap();
        let outcome = store.add_candle(create_test_candle("BTCUSDT", 3, 90.0)).unwrap();

        assert_eq!(outcome, CandleInsert::Rejected);
        assert_eq!(store.candle_count("BTCUSDT", Timeframe::M1).unwrap(), 1);
    }

    #[test]
    fn test_add_candles_counts_stored() {
        let store = MarketDataStore::new();
        store.add_candle(create_test_candle("ETHUSDT", 10, 1.0)).unwrap();

        let batch = (8..13).map(|i| create_test_candle("ETHUSDT", i, i as f64));
        // 8 and 9 are stale, 10 replaces the tail, 11 and 12 append
        assert_eq!(store.add_candles(batch).unwrap(), 3);
        assert_eq!(store.candle_count("ETHUSDT", Timeframe::M1).unwrap(), 3);
    }

    #[test]
    fn test_recent_candles() {
        let store = MarketDataStore::new();
        for i in 0..10 {
            store
                .add_candle(create_test_candle("SOLUSDT", i, 100.0 + i as f64))
                .unwrap();
        }

        let recent = store.recent_candles("SOLUSDT", Timeframe::M1, 3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].close, 107.0);
        assert_eq!(recent[2].close, 109.0);
    }

    #[test]
    fn test_indicator_snapshot_last_write_wins() {
        let store = MarketDataStore::new();

        let mut first = IndicatorSnapshot::empty("BTCUSDT", Timeframe::H1, at(0));
        first.rsi = Some(40.0);
        let mut second = IndicatorSnapshot::empty("BTCUSDT", Timeframe::H1, at(60));
        second.rsi = Some(65.0);

        store.set_indicators(first).unwrap();
        store.set_indicators(second).unwrap();

        let snapshot = store.indicators("BTCUSDT", Timeframe::H1).unwrap().unwrap();
        assert_eq!(snapshot.rsi, Some(65.0));

        store.clear_indicators("BTCUSDT", Timeframe::H1).unwrap();
        assert!(store.indicators("BTCUSDT", Timeframe::H1).unwrap().is_none());
    }

    #[test]
    fn test_price_last_write_wins() {
        let store = MarketDataStore::new();

        store.update_price("BTCUSDT", 50000.0, 1.5).unwrap();
        store.update_price("BTCUSDT", 50100.0, 1.7).unwrap();
        store.update_price("ETHUSDT", 3000.0, -0.4).unwrap();

        let btc = store.price("BTCUSDT").unwrap().unwrap();
        assert_eq!(btc.price, 50100.0);
        assert_eq!(btc.change_24h, 1.7);

        let quotes = store.prices().unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].symbol, "BTCUSDT");
    }

    #[test]
    fn test_suggestions_capped_at_100() {
        let store = MarketDataStore::new();

        for i in 0..130 {
            store
                .add_suggestion(create_test_suggestion(i, Direction::Long, TradingMode::Scalp))
                .unwrap();
        }

        assert_eq!(store.suggestion_count().unwrap(), MAX_SUGGESTIONS);
        let all = store.latest_suggestions(1000).unwrap();
        assert_eq!(all.first().unwrap().reason, "#30");
        assert_eq!(all.last().unwrap().reason, "#129");

        let latest = store.latest_suggestions(5).unwrap();
        assert_eq!(latest.len(), 5);
        assert_eq!(latest[0].reason, "#125");
    }

    #[test]
    fn test_logs_capped_at_100() {
        let store = MarketDataStore::new();

        for i in 0..150 {
            store.add_log(format!("line {}", i)).unwrap();
        }

        let logs = store.logs(1000).unwrap();
        assert_eq!(logs.len(), MAX_LOG_LINES);
        assert_eq!(logs[0].message, "line 50");
        assert_eq!(logs[99].message, "line 149");
    }

    #[test]
    fn test_log_sink_appends() {
        let store = MarketDataStore::new();
        let sink: &dyn LogSink = &store;
        sink.append("hello");
        assert_eq!(store.logs(1).unwrap()[0].message, "hello");
    }

    #[test]
    fn test_suggestion_stats() {
        let store = MarketDataStore::new();
        store
            .add_suggestion(create_test_suggestion(0, Direction::Long, TradingMode::Scalp))
            .unwrap();
        store
            .add_suggestion(create_test_suggestion(1, Direction::Short, TradingMode::Scalp))
            .unwrap();
        store
            .add_suggestion(create_test_suggestion(2, Direction::Long, TradingMode::Swing))
            .unwrap();

        let stats = store.suggestion_stats(10).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.long, 2);
        assert_eq!(stats.short, 1);
        assert_eq!(stats.scalp, 2);
        assert_eq!(stats.swing, 1);
        assert!((stats.average_confidence - 0.7).abs() < 1e-12);

        assert_eq!(store.suggestion_stats(0).unwrap(), SuggestionStats::default());
    }

    #[test]
    fn test_thread_safety() {
        use std::thread;

        let store = MarketDataStore::new();
        let writer = store.clone();

        let handle = thread::spawn(move || {
            for i in 0..600 {
                writer
                    .add_candle(create_test_candle("SOLUSDT", i, i as f64))
                    .unwrap();
                writer.add_log(format!("writer {}", i)).unwrap();
            }
        });

        for _ in 0..600 {
            let candles = store.candles("SOLUSDT", Timeframe::M1).unwrap();
            assert!(candles.len() <= MAX_CANDLES_PER_SERIES);
            assert!(candles.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
            assert!(store.logs(1000).unwrap().len() <= MAX_LOG_LINES);
        }

        handle.join().unwrap();
        assert_eq!(store.candle_count("SOLUSDT", Timeframe::M1).unwrap(), 600);
    }
}
