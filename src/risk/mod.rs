// Risk management module
pub mod sizing;

pub use sizing::{
    calculate_leverage, calculate_position_size, plan_position, stop_loss_price,
    take_profit_price, ExitLevels, PositionPlan, RiskConfig,
};
