use super::signals::{Bias, SignalBundle};
use crate::models::{Timeframe, TradingMode};
use crate::store::{MarketDataStore, StoreError};

/// Fraction of counted signals one side needs to carry the sentiment
pub const SENTIMENT_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

/// Per-timeframe signals plus the overall sentiment for one symbol
#[derive(Debug, Clone, PartialEq)]
pub struct MultiTimeframeAnalysis {
    pub symbol: String,
    pub mode: TradingMode,
    /// In the order the timeframes were requested
    pub timeframes: Vec<(Timeframe, SignalBundle)>,
    pub sentiment: Sentiment,
    pub strength: f64,
}

impl MultiTimeframeAnalysis {
    /// Combine per-timeframe bundles. Every present signal counts once.
    pub fn aggregate(symbol: &str, mode: TradingMode, timeframes: Vec<(Timeframe, SignalBundle)>) -> Self {
        let mut bullish = 0usize;
        let mut bearish = 0usize;
        let mut total = 0usize;

        for bias in timeframes.iter().flat_map(|(_, bundle)| bundle.biases()) {
            total += 1;
            match bias {
                Bias::Bullish => bullish += 1,
                Bias::Bearish => bearish += 1,
                Bias::Neutral => {}
            }
        }

        let (sentiment, strength) = if total == 0 {
            (Sentiment::Neutral, 0.0)
        } else {
            let bullish_ratio = bullish as f64 / total as f64;
            let bearish_ratio = bearish as f64 / total as f64;

            if bullish_ratio > SENTIMENT_THRESHOLD {
                (Sentiment::Bullish, bullish_ratio)
            } else if bearish_ratio > SENTIMENT_THRESHOLD {
                (Sentiment::Bearish, bearish_ratio)
            } else {
                (Sentiment::Neutral, 0.5)
            }
        };

        Self {
            symbol: symbol.to_string(),
            mode,
            timeframes,
            sentiment,
            strength,
        }
    }

    /// Read the latest snapshots and price for `symbol` from the store and aggregate them
    pub fn from_store(
        store: &MarketDataStore,
        symbol: &str,
        timeframes: &[Timeframe],
        mode: TradingMode,
    ) -> Result<Self, StoreError> {
        let price = store.price(symbol)?.map(|q| q.price);

        let mut bundles = Vec::with_capacity(timeframes.len());
        for &tf in timeframes {
            let snapshot = store.indicators(symbol, tf)?;
            bundles.push((tf, SignalBundle::classify(snapshot.as_ref(), mode, price)));
        }

        Ok(Self::aggregate(symbol, mode, bundles))
    }

    pub fn signals(&self, timeframe: Timeframe) -> Option<&SignalBundle> {
        self.timeframes
            .iter()
            .find(|(tf, _)| *tf == timeframe)
            .map(|(_, bundle)| bundle)
    }
}
