use super::{calculate_bollinger, calculate_macd, calculate_rsi, calculate_sma};
use crate::models::{Candle, IndicatorSnapshot, TradingMode};
use serde::{Deserialize, Serialize};

/// Candles required before any indicator is trusted
pub const MIN_CANDLES: usize = 50;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IndicatorError {
    #[error("insufficient data: {have} candles, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("invalid indicator parameters: {0}")]
    InvalidParams(String),
}

/// Window lengths and multipliers for one trading mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub ma_fast: usize,
    pub ma_slow: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    #[serde(default = "default_bb_period")]
    pub bb_period: usize,
    #[serde(default = "default_bb_std_dev")]
    pub bb_std_dev: f64,
}

fn default_bb_period() -> usize {
    20
}

fn default_bb_std_dev() -> f64 {
    2.0
}

impl IndicatorParams {
    pub fn scalp() -> Self {
        Self {
            rsi_period: 14,
            ma_fast: 10,
            ma_slow: 20,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: default_bb_period(),
            bb_std_dev: default_bb_std_dev(),
        }
    }

    pub fn swing() -> Self {
        Self {
            ma_fast: 20,
            ma_slow: 50,
            ..Self::scalp()
        }
    }

    pub fn for_mode(mode: TradingMode) -> Self {
        match mode {
            TradingMode::Scalp => Self::scalp(),
            TradingMode::Swing => Self::swing(),
        }
    }

    pub fn validate(&self) -> Result<(), IndicatorError> {
        let periods = [
            ("rsi_period", self.rsi_period),
            ("ma_fast", self.ma_fast),
            ("ma_slow", self.ma_slow),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("bb_period", self.bb_period),
        ];

        if let Some((name, _)) = periods.iter().find(|(_, p)| *p == 0) {
            return Err(IndicatorError::InvalidParams(format!("{} must be > 0", name)));
        }

        if !self.bb_std_dev.is_finite() || self.bb_std_dev < 0.0 {
            return Err(IndicatorError::InvalidParams(format!(
                "bb_std_dev must be a non-negative number, got {}",
                self.bb_std_dev
            )));
        }

        Ok(())
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Compute the indicator snapshot for the most recent candle of a series
///
/// Fails with `InsufficientData` below `MIN_CANDLES`. Individual values that
/// cannot be computed, or come out non-finite, are left as `None`.
pub fn compute_snapshot(
    candles: &[Candle],
    params: &IndicatorParams,
) -> Result<IndicatorSnapshot, IndicatorError> {
    if candles.len() < MIN_CANDLES {
        return Err(IndicatorError::InsufficientData {
            have: candles.len(),
            need: MIN_CANDLES,
        });
    }
    params.validate()?;

    let mut ordered: Vec<&Candle> = candles.iter().collect();
    ordered.sort_by_key(|c| c.timestamp);

    let closes: Vec<f64> = ordered.iter().map(|c| c.close).collect();
    let latest = ordered[ordered.len() - 1];

    let macd = calculate_macd(&closes, params.macd_fast, params.macd_slow, params.macd_signal);
    let bands = calculate_bollinger(&closes, params.bb_period, params.bb_std_dev);

    let mut snapshot = IndicatorSnapshot::empty(&latest.symbol, latest.timeframe, latest.timestamp);
    snapshot.rsi = finite(calculate_rsi(&closes, params.rsi_period));
    snapshot.ma_fast = finite(calculate_sma(&closes, params.ma_fast));
    snapshot.ma_slow = finite(calculate_sma(&closes, params.ma_slow));
    snapshot.macd = finite(macd.map(|m| m.macd));
    snapshot.macd_signal = finite(macd.map(|m| m.signal));
    snapshot.macd_histogram = finite(macd.map(|m| m.histogram));
    snapshot.bb_upper = finite(bands.map(|b| b.upper));
    snapshot.bb_middle = finite(bands.map(|b| b.middle));
    snapshot.bb_lower = finite(bands.map(|b| b.lower));

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Timeframe;
    use chrono::{Duration, TimeZone, Utc};

    fn create_test_candles(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                symbol: "BTCUSDT".to_string(),
                timeframe: Timeframe::M5,
                timestamp: start + Duration::minutes(5 * i as i64),
                open: close,
                high: close * 1.01,
                low: close * 0.99,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn test_short_series_refused() {
        for n in [0, 1, 20, 49] {
            let candles = create_test_candles(&rising(n));
            let result = compute_snapshot(&candles, &IndicatorParams::scalp());
            assert_eq!(
                result,
                Err(IndicatorError::InsufficientData { have: n, need: MIN_CANDLES })
            );
        }
    }

    #[test]
    fn test_rising_series_snapshot() {
        // closes 100..=159
        let candles = create_test_candles(&rising(60));
        let snapshot = compute_snapshot(&candles, &IndicatorParams::scalp()).unwrap();

        assert_eq!(snapshot.symbol, "BTCUSDT");
        assert_eq!(snapshot.timeframe, Timeframe::M5);
        assert_eq!(snapshot.timestamp, candles[59].timestamp);

        // mean of 150..=159 and 140..=159
        assert_eq!(snapshot.ma_fast, Some(154.5));
        assert_eq!(snapshot.ma_slow, Some(149.5));
        assert!(snapshot.ma_fast > snapshot.ma_slow);

        assert_eq!(snapshot.rsi, Some(100.0));
        assert!(snapshot.macd.unwrap() > 0.0);
        assert!(snapshot.macd_histogram.is_some());

        let upper = snapshot.bb_upper.unwrap();
        let middle = snapshot.bb_middle.unwrap();
        let lower = snapshot.bb_lower.unwrap();
        assert_eq!(middle, 149.5);
        assert!(upper > middle && middle > lower);
    }

    #[test]
    fn test_ma_matches_window_mean() {
        let closes: Vec<f64> = (0..120).map(|i| 50.0 + ((i * 37) % 11) as f64).collect();
        let params = IndicatorParams::swing();

        for n in MIN_CANDLES..closes.len() {
            let candles = create_test_candles(&closes[..n]);
            let snapshot = compute_snapshot(&candles, &params).unwrap();

            let expected_fast = closes[n - params.ma_fast..n].iter().sum::<f64>() / params.ma_fast as f64;
            let expected_slow = closes[n - params.ma_slow..n].iter().sum::<f64>() / params.ma_slow as f64;
            assert!((snapshot.ma_fast.unwrap() - expected_fast).abs() < 1e-9);
            assert!((snapshot.ma_slow.unwrap() - expected_slow).abs() < 1e-9);
        }
    }

    #[test]
    fn test_window_longer_than_history_is_absent() {
        let candles = create_test_candles(&rising(55));
        let params = IndicatorParams {
            ma_slow: 100,
            rsi_period: 60,
            bb_period: 80,
            ..IndicatorParams::scalp()
        };

        let snapshot = compute_snapshot(&candles, &params).unwrap();
        assert!(snapshot.ma_fast.is_some());
        assert!(snapshot.ma_slow.is_none());
        assert!(snapshot.rsi.is_none());
        assert!(snapshot.bb_middle.is_none());
        assert!(snapshot.macd.is_some());
    }

    #[test]
    fn test_flat_series_rsi_absent() {
        let candles = create_test_candles(&[100.0; 60]);
        let snapshot = compute_snapshot(&candles, &IndicatorParams::scalp()).unwrap();
        assert!(snapshot.rsi.is_none());
        assert_eq!(snapshot.ma_fast, Some(100.0));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let candles = create_test_candles(&rising(60));
        let params = IndicatorParams {
            macd_signal: 0,
            ..IndicatorParams::scalp()
        };
        assert!(matches!(
            compute_snapshot(&candles, &params),
            Err(IndicatorError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_non_finite_close_degrades_to_absent() {
        let mut closes = rising(60);
        closes[59] = f64::NAN;
        let candles = create_test_candles(&closes);

        let snapshot = compute_snapshot(&candles, &IndicatorParams::scalp()).unwrap();
        assert!(snapshot.ma_fast.is_none());
        assert!(snapshot.macd.is_none());
        assert!(snapshot.bb_upper.is_none());
    }

    #[test]
    fn test_unordered_input_is_sorted() {
        let mut candles = create_test_candles(&rising(60));
        candles.reverse();
        let snapshot = compute_snapshot(&candles, &IndicatorParams::scalp()).unwrap();
        assert_eq!(snapshot.ma_fast, Some(154.5));
    }

    #[test]
    fn test_swing_defaults() {
        let params = IndicatorParams::for_mode(TradingMode::Swing);
        assert_eq!(params.ma_fast, 20);
        assert_eq!(params.ma_slow, 50);
        assert_eq!(params.bb_period, 20);
    }
}
