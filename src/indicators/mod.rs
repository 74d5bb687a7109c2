// Technical indicators module
// Implements RSI, SMA/EMA, MACD and Bollinger Bands over candle closes

pub mod bollinger;
pub mod engine;
pub mod macd;
pub mod moving_average;
pub mod rsi;

pub use bollinger::{calculate_bollinger, BollingerBands};
pub use engine::{compute_snapshot, IndicatorError, IndicatorParams, MIN_CANDLES};
pub use macd::{calculate_macd, MacdValue};
pub use moving_average::{calculate_ema, calculate_ema_series, calculate_sma};
pub use rsi::calculate_rsi;
