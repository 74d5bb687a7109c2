// Market data feed module
// Backfills candles once, then keeps prices and candle tails fresh until cancelled
pub mod fetch_loop;

pub use fetch_loop::{DataFetchLoop, FeedError, FeedSchedule, FeedState};
