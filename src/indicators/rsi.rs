/// Calculate Relative Strength Index (RSI)
///
/// Average gain and loss are simple means over the last `period` close-to-close
/// changes. RSI is 100 when the window holds gains but no losses, and `None`
/// for a flat window where both averages are zero.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
///
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let window = &prices[prices.len() - period - 1..];

    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;
    for pair in window.windows(2) {
        let change = pair[1] - pair[0];
        if change > 0.0 {
            gain_sum += change;
        } else {
            loss_sum += -change;
        }
    }

    let avg_gain = gain_sum / period as f64;
    let avg_loss = loss_sum / period as f64;

    if avg_loss == 0.0 {
        return if avg_gain > 0.0 { Some(100.0) } else { None };
    }

    let rs = avg_gain / avg_loss;
    let rsi = 100.0 - (100.0 / (1.0 + rs));

    rsi.is_finite().then_some(rsi)
}
