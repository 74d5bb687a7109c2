// In-memory market state shared by the fetch loop and analysis passes
pub mod market_store;

pub use market_store::{
    CandleInsert, LogSink, MarketDataStore, StoreError, SuggestionStats, MAX_CANDLES_PER_SERIES,
    MAX_LOG_LINES, MAX_SUGGESTIONS,
};
