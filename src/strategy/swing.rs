use super::{
    build_suggestion, signals::Bias, signals::Zone, AccountContext, ModeRules,
    MultiTimeframeAnalysis, Strategy, Tally,
};
use crate::models::{Direction, Timeframe, TradeSuggestion, TradingMode};

/// Long-horizon rules: votes weighted toward higher timeframes,
/// 1.5% / 3% exits
#[derive(Debug, Clone)]
pub struct SwingStrategy {
    timeframes: Vec<Timeframe>,
}

impl SwingStrategy {
    pub fn new(timeframes: Vec<Timeframe>) -> Self {
        Self { timeframes }
    }

    const MIN_SIGNALS: f64 = 3.0;
    const MIN_VOTES: f64 = 4.0;
    /// Winning side must beat the other by this factor
    const DOMINANCE: f64 = 1.5;

    /// Vote weight of a timeframe
    pub fn weight(timeframe: Timeframe) -> f64 {
        match timeframe {
            Timeframe::D1 => 3.0,
            Timeframe::H4 => 2.0,
            _ => 1.0,
        }
    }

    fn label(bias: Bias) -> &'static str {
        if bias == Bias::Bullish {
            "Bullish"
        } else {
            "Bearish"
        }
    }

    fn tally(&self, analysis: &MultiTimeframeAnalysis) -> Tally {
        let mut tally = Tally::default();

        for &tf in &self.timeframes {
            let Some(signals) = analysis.signals(tf) else {
                continue;
            };
            let w = Self::weight(tf);

            if let Some(trend) = signals.trend {
                tally.count(2.0 * w);
                let bias = trend.bias();
                if bias != Bias::Neutral {
                    tally.vote(bias, 2.0 * w);
                    tally.reason(format!("Trend({}): {}", tf, Self::label(bias)));
                }
            }

            if let Some(zone) = signals.rsi {
                tally.count(w);
                match zone {
                    Zone::Oversold => {
                        tally.vote(Bias::Bullish, w);
                        tally.reason(format!("RSI({}): Oversold", tf));
                    }
                    Zone::Overbought => {
                        tally.vote(Bias::Bearish, w);
                        tally.reason(format!("RSI({}): Overbought", tf));
                    }
                    // Soft zones count half
                    Zone::Bullish | Zone::Bearish => tally.vote(zone.bias(), 0.5 * w),
                    Zone::Neutral => {}
                }
            }

            if let Some(macd) = signals.macd {
                tally.count(w);
                let bias = macd.bias();
                if bias != Bias::Neutral {
                    tally.vote(bias, w);
                    tally.reason(format!("MACD({}): {}", tf, Self::label(bias)));
                }
            }
        }

        tally
    }
}

impl Default for SwingStrategy {
    fn default() -> Self {
        Self::new(vec![Timeframe::H1, Timeframe::H4, Timeframe::D1])
    }
}

impl Strategy for SwingStrategy {
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

        let (direction, votes) = if tally.bullish >= Self::MIN_VOTES
            && tally.bullish > tally.bearish * Self::DOMINANCE
        {
            (Direction::Long, tally.bullish)
        } else if tally.bearish >= Self::MIN_VOTES && tally.bearish > tally.bullish * Self::DOMINANCE {
            (Direction::Short, tally.bearish)
        } else {
            return None;
        };

        build_suggestion(
            ModeRules::SWING,
            &analysis.symbol,
            direction,
            votes / tally.total,
            current_price,
            account,
            tally.rationale(),
        )
    }

    fn name(&self) -> &str {
        "Swing"
    }

    fn mode(&self) -> TradingMode {
        TradingMode::Swing
    }
}
