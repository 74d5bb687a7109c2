use super::moving_average::calculate_ema_series;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Calculate MACD for the latest close
///
/// - MACD line = EMA(fast) - EMA(slow)
/// - Signal line = EMA(signal_period) of the MACD line
/// - Histogram = MACD - signal
///
/// The EMAs are defined from the first close, so this returns a value for
/// any non-empty input. Callers wanting stable values gate on history length.
pub fn calculate_macd(
    prices: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Option<MacdValue> {
    if prices.is_empty() || fast == 0 || slow == 0 || signal_period == 0 {
        return None;
    }

    let fast_ema = calculate_ema_series(prices, fast);
    let slow_ema = calculate_ema_series(prices, slow);

    let macd_line: Vec<f64> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| f - s)
        .collect();

    let signal_line = calculate_ema_series(&macd_line, signal_period);

    let macd = *macd_line.last()?;
    let signal = *signal_line.last()?;

    Some(MacdValue {
        macd,
        signal,
        histogram: macd - signal,
    })
}
