use crate::models::Direction;
use serde::{Deserialize, Serialize};

/// Account-level risk limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub max_leverage: u32,
    pub default_leverage: u32,
    /// Fraction of capital put at risk between entry and stop (0.02 = 2%)
    pub risk_per_trade: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_leverage: 20,
            default_leverage: 10,
            risk_per_trade: 0.02,
        }
    }
}

/// Stop-loss and take-profit distances, in percent of entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitLevels {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl ExitLevels {
    pub const SCALP: ExitLevels = ExitLevels {
        stop_loss_pct: 0.3,
        take_profit_pct: 0.6,
    };

    pub const SWING: ExitLevels = ExitLevels {
        stop_loss_pct: 1.5,
        take_profit_pct: 3.0,
    };
}

/// Stop-loss placed `pct` percent against the trade direction
pub fn stop_loss_price(entry: f64, direction: Direction, pct: f64) -> f64 {
    entry * (1.0 - direction.sign() * pct / 100.0)
}

/// Take-profit placed `pct` percent in the trade direction
pub fn take_profit_price(entry: f64, direction: Direction, pct: f64) -> f64 {
    entry * (1.0 + direction.sign() * pct / 100.0)
}

/// Position size (in units of the asset) that loses `capital * risk_per_trade`
/// if the stop is hit. Zero when entry and stop coincide.
pub fn calculate_position_size(capital: f64, risk_per_trade: f64, entry: f64, stop_loss: f64) -> f64 {
    let risk_amount = capital * risk_per_trade;
    let price_diff = (entry - stop_loss).abs();
    if price_diff == 0.0 {
        return 0.0;
    }

    risk_amount / price_diff
}

/// Leverage needed to carry the position's notional with `capital`,
/// rounded up and clamped to `[1, max_leverage]`
pub fn calculate_leverage(capital: f64, position_size: f64, entry: f64, max_leverage: u32) -> u32 {
    let required = (position_size * entry / capital).ceil();
    if !required.is_finite() || required < 1.0 {
        return 1;
    }

    // float -> int casts saturate
    (required as u32).min(max_leverage).max(1)
}

/// Entry, exits, size and leverage for one suggestion
#[derive(Debug, Clone, PartialEq)]
pub struct PositionPlan {
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub position_size: f64,
    pub leverage: u32,
}

/// Size a trade at `entry` under the account's risk limits
///
/// Returns `None` when the computed size is not positive, which is how a
/// zero or negative capital or risk budget surfaces.
pub fn plan_position(
    entry: f64,
    direction: Direction,
    levels: ExitLevels,
    capital: f64,
    risk: &RiskConfig,
    mode_leverage_cap: u32,
) -> Option<PositionPlan> {
    let stop_loss = stop_loss_price(entry, direction, levels.stop_loss_pct);
    let take_profit = take_profit_price(entry, direction, levels.take_profit_pct);

    let position_size = calculate_position_size(capital, risk.risk_per_trade, entry, stop_loss);
    if !(position_size.is_finite() && position_size > 0.0) {
        return None;
    }

    let leverage = calculate_leverage(
        capital,
        position_size,
        entry,
        risk.max_leverage.min(mode_leverage_cap),
    );

    Some(PositionPlan {
        entry_price: entry,
        stop_loss,
        take_profit,
        position_size,
        leverage,
    })
}
