use super::{
    build_suggestion, signals::Bias, signals::Trend, AccountContext, ModeRules,
    MultiTimeframeAnalysis, Strategy, Tally,
};
use crate::models::{Direction, Timeframe, TradeSuggestion, TradingMode};

/// Short-horizon rules: unweighted votes over the scalp timeframes,
/// tight 0.3% / 0.6% exits
#[derive(Debug, Clone)]
pub struct ScalpStrategy {
    timeframes: Vec<Timeframe>,
}

impl ScalpStrategy {
    pub fn new(timeframes: Vec<Timeframe>) -> Self {
        Self { timeframes }
    }

    /// Signals needed before a direction is considered
    const MIN_SIGNALS: f64 = 2.0;
    /// Votes the winning side needs
    const MIN_VOTES: f64 = 2.0;

    fn tally(&self, analysis: &MultiTimeframeAnalysis) -> Tally {
        let mut tally = Tally::default();

        for &tf in &self.timeframes {
            let Some(signals) = analysis.signals(tf) else {
                continue;
            };

            if let Some(zone) = signals.rsi {
                tally.count(1.0);
                if zone.bias() != Bias::Neutral {
                    tally.vote(zone.bias(), 1.0);
                    tally.reason(format!("RSI({}): {}", tf, zone));
                }
            }

            // Only a fresh cross is a scalp trigger
            if let Some(macd) = signals.macd.filter(|m| m.is_cross()) {
                tally.count(1.0);
                tally.vote(macd.bias(), 1.0);
                let label = if macd.bias() == Bias::Bullish { "Cross Up" } else { "Cross Down" };
                tally.reason(format!("MACD({}): {}", tf, label));
            }

            if let Some(trend) = signals.trend {
                tally.count(1.0);
                match trend {
                    Trend::Bullish => {
                        tally.vote(Bias::Bullish, 1.0);
                        tally.reason(format!("Trend({}): Up", tf));
                    }
                    Trend::Bearish => {
                        tally.vote(Bias::Bearish, 1.0);
                        tally.reason(format!("Trend({}): Down", tf));
                    }
                    Trend::Sideways => {}
                }
            }
        }

        tally
    }
}

impl Default for ScalpStrategy {
    fn default() -> Self {
        Self::new(vec![Timeframe::M1, Timeframe::M5, Timeframe::M15])
    }
}

impl Strategy for ScalpStrategy {
    fn evaluate(
        &self,
        analysis: &MultiTimeframeAnalysis,
        current_price: f64,
        account: &AccountContext,
    ) -> Option<TradeSuggestion> {
        let tally = self.tally(analysis);
        if tally.total < Self::MIN_SIGNALS {
            return None;
        }

        let (direction, votes) = if tally.bullish >= Self::MIN_VOTES && tally.bullish > tally.bearish {
            (Direction::Long, tally.bullish)
        } else if tally.bearish >= Self::MIN_VOTES && tally.bearish > tally.bullish {
            (Direction::Short, tally.bearish)
        } else {
            return None;
        };

        build_suggestion(
            ModeRules::SCALP,
            &analysis.symbol,
            direction,
            votes / tally.total,
            current_price,
            account,
            tally.rationale(),
        )
    }

    fn name(&self) -> &str {
        "Scalp"
    }

    fn mode(&self) -> TradingMode {
        TradingMode::Scalp
    }
}
