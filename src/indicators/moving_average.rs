/// Calculate Simple Moving Average (SMA) of the last `period` values
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Calculate an Exponential Moving Average series with the given span
///
/// Uses α = 2 / (span + 1) and bias-adjusted weights: each output is the
/// weighted mean of all values so far with weights (1 - α)^age. The series is
/// defined from the first value onward; early values lean on little history.
pub fn calculate_ema_series(values: &[f64], span: usize) -> Vec<f64> {
    if span == 0 {
        return Vec::new();
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    let decay = 1.0 - alpha;

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    values
        .iter()
        .map(|&value| {
            weighted_sum = value + decay * weighted_sum;
            weight_total = 1.0 + decay * weight_total;
            weighted_sum / weight_total
        })
        .collect()
}

/// Latest value of the EMA series
pub fn calculate_ema(prices: &[f64], span: usize) -> Option<f64> {
    calculate_ema_series(prices, span).last().copied()
}
