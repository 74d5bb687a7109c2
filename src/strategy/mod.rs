// Trading strategy module
// Signals -> multi-timeframe view -> mode-specific suggestion rules
pub mod generator;
pub mod multi_timeframe;
pub mod scalp;
pub mod signals;
pub mod swing;

pub use generator::{AnalysisError, SuggestionGenerator};
pub use multi_timeframe::{MultiTimeframeAnalysis, Sentiment};
pub use scalp::ScalpStrategy;
pub use signals::{Bias, MacdState, SignalBundle, Trend, Zone};
pub use swing::SwingStrategy;

use crate::models::{Direction, TradeSuggestion, TradingMode};
use crate::risk::{plan_position, ExitLevels, RiskConfig};
use chrono::Utc;

/// Suggestions at or below this confidence are discarded
pub const MIN_CONFIDENCE: f64 = 0.6;

/// Rationale fragments kept in a suggestion's reason
pub const MAX_REASONS: usize = 3;

/// Capital and risk limits a strategy sizes against
#[derive(Debug, Clone, PartialEq)]
pub struct AccountContext {
    pub capital: f64,
    pub risk: RiskConfig,
}

/// Base trait for suggestion rules
pub trait Strategy: Send + Sync {
    /// Turn a multi-timeframe view into a sized suggestion, or nothing
    fn evaluate(
        &self,
        analysis: &MultiTimeframeAnalysis,
        current_price: f64,
        account: &AccountContext,
    ) -> Option<TradeSuggestion>;

    /// Get strategy name
    fn name(&self) -> &str;

    fn mode(&self) -> TradingMode;
}

/// Whether a suggestion clears the confidence gate
pub fn is_acceptable(suggestion: &TradeSuggestion) -> bool {
    suggestion.confidence > MIN_CONFIDENCE
}

/// Weighted bullish/bearish vote count with rationale fragments
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Tally {
    pub bullish: f64,
    pub bearish: f64,
    pub total: f64,
    pub reasons: Vec<String>,
}

impl Tally {
    pub fn count(&mut self, weight: f64) {
        self.total += weight;
    }

    pub fn vote(&mut self, bias: Bias, weight: f64) {
        match bias {
            Bias::Bullish => self.bullish += weight,
            Bias::Bearish => self.bearish += weight,
            Bias::Neutral => {}
        }
    }

    pub fn reason(&mut self, fragment: String) {
        self.reasons.push(fragment);
    }

    /// First few fragments joined with ", "
    pub fn rationale(&self) -> String {
        self.reasons
            .iter()
            .take(MAX_REASONS)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Fixed exit distances and leverage ceiling of a trading mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeRules {
    pub mode: TradingMode,
    pub levels: ExitLevels,
    pub leverage_cap: u32,
}

impl ModeRules {
    pub const SCALP: ModeRules = ModeRules {
        mode: TradingMode::Scalp,
        levels: ExitLevels::SCALP,
        leverage_cap: 20,
    };

    pub const SWING: ModeRules = ModeRules {
        mode: TradingMode::Swing,
        levels: ExitLevels::SWING,
        leverage_cap: 15,
    };
}

/// Size the trade and assemble the suggestion. `None` when sizing rejects it.
pub(crate) fn build_suggestion(
    rules: ModeRules,
    symbol: &str,
    direction: Direction,
    confidence: f64,
    current_price: f64,
    account: &AccountContext,
    reason: String,
) -> Option<TradeSuggestion> {
    if !(current_price.is_finite() && current_price > 0.0) {
        return None;
    }

    let plan = plan_position(
        current_price,
        direction,
        rules.levels,
        account.capital,
        &account.risk,
        rules.leverage_cap,
    )?;

    Some(TradeSuggestion {
        timestamp: Utc::now(),
        mode: rules.mode,
        symbol: symbol.to_string(),
        direction,
        entry_price: plan.entry_price,
        stop_loss: plan.stop_loss,
        take_profit: plan.take_profit,
        leverage: plan.leverage,
        reason,
        confidence,
    })
}
