use crate::models::{IndicatorSnapshot, TradingMode};
use std::fmt;

/// Which side a categorical signal leans toward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

/// Moving-average trend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Bullish,
    Bearish,
    Sideways,
}

impl Trend {
    pub fn bias(&self) -> Bias {
        match self {
            Trend::Bullish => Bias::Bullish,
            Trend::Bearish => Bias::Bearish,
            Trend::Sideways => Bias::Neutral,
        }
    }
}

/// RSI zone. Also used for the Bollinger position, which has the same five buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Overbought,
    Oversold,
    Bullish,
    Bearish,
    Neutral,
}

impl Zone {
    /// Oversold leans bullish (expected bounce), overbought leans bearish
    pub fn bias(&self) -> Bias {
        match self {
            Zone::Oversold | Zone::Bullish => Bias::Bullish,
            Zone::Overbought | Zone::Bearish => Bias::Bearish,
            Zone::Neutral => Bias::Neutral,
        }
    }

    /// True for the two extreme buckets
    pub fn is_extreme(&self) -> bool {
        matches!(self, Zone::Overbought | Zone::Oversold)
    }
}

/// MACD line vs. signal line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdState {
    BullishCross,
    BearishCross,
    Bullish,
    Bearish,
    Neutral,
}

impl MacdState {
    pub fn bias(&self) -> Bias {
        match self {
            MacdState::BullishCross | MacdState::Bullish => Bias::Bullish,
            MacdState::BearishCross | MacdState::Bearish => Bias::Bearish,
            MacdState::Neutral => Bias::Neutral,
        }
    }

    pub fn is_cross(&self) -> bool {
        matches!(self, MacdState::BullishCross | MacdState::BearishCross)
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Bias::Bullish => "BULLISH",
            Bias::Bearish => "BEARISH",
            Bias::Neutral => "NEUTRAL",
        })
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trend::Bullish => "BULLISH",
            Trend::Bearish => "BEARISH",
            Trend::Sideways => "SIDEWAYS",
        })
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Zone::Overbought => "OVERBOUGHT",
            Zone::Oversold => "OVERSOLD",
            Zone::Bullish => "BULLISH",
            Zone::Bearish => "BEARISH",
            Zone::Neutral => "NEUTRAL",
        })
    }
}

impl fmt::Display for MacdState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MacdState::BullishCross => "BULLISH_CROSS",
            MacdState::BearishCross => "BEARISH_CROSS",
            MacdState::Bullish => "BULLISH",
            MacdState::Bearish => "BEARISH",
            MacdState::Neutral => "NEUTRAL",
        })
    }
}

/// RSI zone boundaries for one trading mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiThresholds {
    pub overbought: f64,
    pub oversold: f64,
    pub bullish: f64,
    pub bearish: f64,
}

impl RsiThresholds {
    pub fn for_mode(mode: TradingMode) -> Self {
        match mode {
            TradingMode::Scalp => Self {
                overbought: 70.0,
                oversold: 30.0,
                bullish: 60.0,
                bearish: 40.0,
            },
            TradingMode::Swing => Self {
                overbought: 80.0,
                oversold: 20.0,
                bullish: 65.0,
                bearish: 35.0,
            },
        }
    }
}

/// Fast MA above slow MA is bullish; absent if either MA is absent
pub fn classify_trend(snapshot: &IndicatorSnapshot) -> Option<Trend> {
    let fast = snapshot.ma_fast?;
    let slow = snapshot.ma_slow?;

    Some(if fast > slow {
        Trend::Bullish
    } else if fast < slow {
        Trend::Bearish
    } else {
        Trend::Sideways
    })
}

/// Bucket an RSI value, extremes checked first
pub fn classify_rsi(snapshot: &IndicatorSnapshot, mode: TradingMode) -> Option<Zone> {
    let rsi = snapshot.rsi?;
    let t = RsiThresholds::for_mode(mode);

    Some(if rsi > t.overbought {
        Zone::Overbought
    } else if rsi < t.oversold {
        Zone::Oversold
    } else if rsi > t.bullish {
        Zone::Bullish
    } else if rsi < t.bearish {
        Zone::Bearish
    } else {
        Zone::Neutral
    })
}

pub fn classify_macd(snapshot: &IndicatorSnapshot) -> Option<MacdState> {
    let macd = snapshot.macd?;
    let signal = snapshot.macd_signal?;
    let histogram = snapshot.macd_histogram.unwrap_or(macd - signal);

    Some(if macd > signal && histogram > 0.0 {
        MacdState::BullishCross
    } else if macd < signal && histogram < 0.0 {
        MacdState::BearishCross
    } else if macd > 0.0 && signal > 0.0 {
        MacdState::Bullish
    } else if macd < 0.0 && signal < 0.0 {
        MacdState::Bearish
    } else {
        MacdState::Neutral
    })
}

/// Position of the current price (not the snapshot's close) within the bands
pub fn classify_bands(snapshot: &IndicatorSnapshot, price: Option<f64>) -> Option<Zone> {
    let price = price?;
    let upper = snapshot.bb_upper?;
    let middle = snapshot.bb_middle?;
    let lower = snapshot.bb_lower?;

    Some(if price >= upper {
        Zone::Overbought
    } else if price <= lower {
        Zone::Oversold
    } else if price > middle {
        Zone::Bullish
    } else if price < middle {
        Zone::Bearish
    } else {
        Zone::Neutral
    })
}

/// The four categorical signals for one (symbol, timeframe)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalBundle {
    pub trend: Option<Trend>,
    pub rsi: Option<Zone>,
    pub macd: Option<MacdState>,
    pub bands: Option<Zone>,
}

impl SignalBundle {
    /// Classify a snapshot. A missing snapshot yields an all-absent bundle.
    pub fn classify(snapshot: Option<&IndicatorSnapshot>, mode: TradingMode, price: Option<f64>) -> Self {
        match snapshot {
            Some(s) => Self {
                trend: classify_trend(s),
                rsi: classify_rsi(s, mode),
                macd: classify_macd(s),
                bands: classify_bands(s, price),
            },
            None => Self::default(),
        }
    }

    /// Biases of the signals that are present
    pub fn biases(&self) -> impl Iterator<Item = Bias> {
        [
            self.trend.map(|t| t.bias()),
            self.rsi.map(|z| z.bias()),
            self.macd.map(|m| m.bias()),
            self.bands.map(|z| z.bias()),
        ]
        .into_iter()
        .flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.biases().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Timeframe;
    use chrono::Utc;

    fn snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot::empty("BTCUSDT", Timeframe::M5, Utc::now())
    }

    fn with_rsi(rsi: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi: Some(rsi),
            ..snapshot()
        }
    }

    fn with_macd(macd: f64, signal: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            macd: Some(macd),
            macd_signal: Some(signal),
            macd_histogram: Some(macd - signal),
            ..snapshot()
        }
    }

    #[test]
    fn test_trend() {
        let mut s = snapshot();
        assert_eq!(classify_trend(&s), None);

        s.ma_fast = Some(101.0);
        assert_eq!(classify_trend(&s), None);

        s.ma_slow = Some(100.0);
        assert_eq!(classify_trend(&s), Some(Trend::Bullish));
        s.ma_slow = Some(102.0);
        assert_eq!(classify_trend(&s), Some(Trend::Bearish));
        s.ma_slow = Some(101.0);
        assert_eq!(classify_trend(&s), Some(Trend::Sideways));
    }

    #[test]
    fn test_rsi_zones_scalp() {
        let mode = TradingMode::Scalp;
        assert_eq!(classify_rsi(&with_rsi(25.0), mode), Some(Zone::Oversold));
        assert_eq!(classify_rsi(&with_rsi(35.0), mode), Some(Zone::Bearish));
        assert_eq!(classify_rsi(&with_rsi(50.0), mode), Some(Zone::Neutral));
        assert_eq!(classify_rsi(&with_rsi(65.0), mode), Some(Zone::Bullish));
        assert_eq!(classify_rsi(&with_rsi(75.0), mode), Some(Zone::Overbought));
        assert_eq!(classify_rsi(&snapshot(), mode), None);
    }

    #[test]
    fn test_rsi_zones_swing_are_wider() {
        let mode = TradingMode::Swing;
        assert_eq!(classify_rsi(&with_rsi(25.0), mode), Some(Zone::Bearish));
        assert_eq!(classify_rsi(&with_rsi(15.0), mode), Some(Zone::Oversold));
        assert_eq!(classify_rsi(&with_rsi(62.0), mode), Some(Zone::Neutral));
        assert_eq!(classify_rsi(&with_rsi(75.0), mode), Some(Zone::Bullish));
        assert_eq!(classify_rsi(&with_rsi(85.0), mode), Some(Zone::Overbought));
    }

    #[test]
    fn test_rsi_boundaries_are_exclusive() {
        assert_eq!(classify_rsi(&with_rsi(70.0), TradingMode::Scalp), Some(Zone::Bullish));
        assert_eq!(classify_rsi(&with_rsi(30.0), TradingMode::Scalp), Some(Zone::Bearish));
        assert_eq!(classify_rsi(&with_rsi(60.0), TradingMode::Scalp), Some(Zone::Neutral));
    }

    #[test]
    fn test_macd_states() {
        assert_eq!(classify_macd(&with_macd(1.0, 0.5)), Some(MacdState::BullishCross));
        assert_eq!(classify_macd(&with_macd(-1.0, -0.5)), Some(MacdState::BearishCross));
        assert_eq!(classify_macd(&with_macd(0.5, 0.5)), Some(MacdState::Bullish));
        assert_eq!(classify_macd(&with_macd(-0.5, -0.5)), Some(MacdState::Bearish));
        assert_eq!(classify_macd(&with_macd(0.0, 0.0)), Some(MacdState::Neutral));
        assert_eq!(classify_macd(&snapshot()), None);
    }

    #[test]
    fn test_band_zones_use_current_price() {
        let s = IndicatorSnapshot {
            bb_upper: Some(110.0),
            bb_middle: Some(100.0),
            bb_lower: Some(90.0),
            ..snapshot()
        };

        assert_eq!(classify_bands(&s, Some(110.0)), Some(Zone::Overbought));
        assert_eq!(classify_bands(&s, Some(89.0)), Some(Zone::Oversold));
        assert_eq!(classify_bands(&s, Some(105.0)), Some(Zone::Bullish));
        assert_eq!(classify_bands(&s, Some(95.0)), Some(Zone::Bearish));
        assert_eq!(classify_bands(&s, Some(100.0)), Some(Zone::Neutral));
        assert_eq!(classify_bands(&s, None), None);
    }

    #[test]
    fn test_oversold_leans_bullish() {
        assert_eq!(Zone::Oversold.bias(), Bias::Bullish);
        assert_eq!(Zone::Overbought.bias(), Bias::Bearish);
        assert_eq!(Trend::Sideways.bias(), Bias::Neutral);
        assert_eq!(Zone::Overbought.to_string(), "OVERBOUGHT");
        assert_eq!(MacdState::BullishCross.to_string(), "BULLISH_CROSS");
    }

    #[test]
    fn test_bundle_without_snapshot_is_empty() {
        let bundle = SignalBundle::classify(None, TradingMode::Scalp, Some(100.0));
        assert!(bundle.is_empty());

        let s = IndicatorSnapshot {
            ma_fast: Some(2.0),
            ma_slow: Some(1.0),
            ..with_rsi(50.0)
        };
        let bundle = SignalBundle::classify(Some(&s), TradingMode::Scalp, None);
        assert_eq!(bundle.trend, Some(Trend::Bullish));
        assert_eq!(bundle.rsi, Some(Zone::Neutral));
        assert_eq!(bundle.biases().count(), 2);
    }
}
