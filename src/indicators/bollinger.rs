#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Calculate Bollinger Bands over the last `period` closes
///
/// - Middle band: SMA(period)
/// - Upper/lower: middle ± multiplier × population standard deviation
pub fn calculate_bollinger(prices: &[f64], period: usize, multiplier: f64) -> Option<BollingerBands> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let window = &prices[prices.len() - period..];
    let middle = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|p| (p - middle).powi(2)).sum::<f64>() / period as f64;
    let width = variance.sqrt() * multiplier;

    Some(BollingerBands {
        upper: middle + width,
        middle,
        lower: middle - width,
    })
}
