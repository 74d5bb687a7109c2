use super::{
    is_acceptable, AccountContext, MultiTimeframeAnalysis, ScalpStrategy, Strategy, SwingStrategy,
};
use crate::config::ConfigSource;
use crate::indicators::{compute_snapshot, IndicatorError, IndicatorParams};
use crate::models::{Timeframe, TradeSuggestion, TradingMode};
use crate::store::{MarketDataStore, StoreError};
use std::sync::{Arc, Mutex, TryLockError};

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("an analysis pass is already in progress")]
    AnalysisInProgress,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runs analysis passes: indicators -> signals -> rules -> stored suggestions
pub struct SuggestionGenerator {
    store: MarketDataStore,
    config: Arc<dyn ConfigSource>,
    in_progress: Mutex<()>,
}

impl SuggestionGenerator {
    pub fn new(store: MarketDataStore, config: Arc<dyn ConfigSource>) -> Self {
        Self {
            store,
            config,
            in_progress: Mutex::new(()),
        }
    }

    fn strategy_for(&self, mode: TradingMode) -> Box<dyn Strategy> {
        let timeframes = self.config.timeframes_for_mode(mode);
        match mode {
            TradingMode::Scalp => Box::new(ScalpStrategy::new(timeframes)),
            TradingMode::Swing => Box::new(SwingStrategy::new(timeframes)),
        }
    }

    /// Recompute the snapshot of every (symbol, timeframe) pair.
    /// A pair that cannot be computed has its stale snapshot cleared.
    pub fn update_indicators(
        &self,
        symbols: &[String],
        timeframes: &[Timeframe],
        params: &IndicatorParams,
    ) -> Result<usize, StoreError> {
        let mut computed = 0;

        for symbol in symbols {
            for &timeframe in timeframes {
                let candles = self.store.candles(symbol, timeframe)?;
                match compute_snapshot(&candles, params) {
                    Ok(snapshot) => {
                        self.store.set_indicators(snapshot)?;
                        computed += 1;
                    }
                    Err(IndicatorError::InsufficientData { have, need }) => {
                        tracing::debug!(
                            "Not enough data for {} {}: {} candles, need {}",
                            symbol,
                            timeframe,
                            have,
                            need
                        );
                        self.store.clear_indicators(symbol, timeframe)?;
                    }
                    Err(e) => {
                        tracing::warn!("⚠️  Indicators failed for {} {}: {}", symbol, timeframe, e);
                        self.store.clear_indicators(symbol, timeframe)?;
                    }
                }
            }
        }

        Ok(computed)
    }

    /// Evaluate one symbol against already-computed snapshots
    fn analyze_symbol(
        &self,
        strategy: &dyn Strategy,
        symbol: &str,
        timeframes: &[Timeframe],
        account: &AccountContext,
    ) -> Result<Option<TradeSuggestion>, StoreError> {
        let Some(quote) = self.store.price(symbol)? else {
            tracing::debug!("No price yet for {}, skipping", symbol);
            return Ok(None);
        };

        let analysis = MultiTimeframeAnalysis::from_store(&self.store, symbol, timeframes, strategy.mode())?;
        tracing::debug!(
            "{} {} sentiment {:?} ({:.2})",
            symbol,
            strategy.name(),
            analysis.sentiment,
            analysis.strength
        );

        Ok(strategy
            .evaluate(&analysis, quote.price, account)
            .filter(is_acceptable))
    }

    /// One analysis pass over `symbols` in `mode`
    ///
    /// Accepted suggestions are stored and returned. Passes do not overlap:
    /// a second concurrent call gets `AnalysisInProgress`.
    pub fn run_analysis(
        &self,
        symbols: &[String],
        mode: TradingMode,
    ) -> Result<Vec<TradeSuggestion>, AnalysisError> {
        let _guard = match self.in_progress.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(AnalysisError::AnalysisInProgress),
            // A panicked pass leaves nothing half-written behind the unit guard
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        self.store.add_log(format!("🔍 Running {} analysis...", mode))?;

        let timeframes = self.config.timeframes_for_mode(mode);
        self.store.add_log(format!(
            "📊 Timeframes for {}: {}",
            mode,
            timeframes
                .iter()
                .map(|tf| tf.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))?;

        let params = self.config.read_indicator_params(mode);
        self.update_indicators(symbols, &timeframes, &params)?;

        let account = AccountContext {
            capital: self.config.read_trading_config().available_capital,
            risk: self.config.read_risk_config(),
        };
        let strategy = self.strategy_for(mode);

        let mut accepted = Vec::new();
        for symbol in symbols {
            match self.analyze_symbol(strategy.as_ref(), symbol, &timeframes, &account)? {
                Some(suggestion) => {
                    self.store.add_suggestion(suggestion.clone())?;
                    self.store.add_log(format!(
                        "Created {} {} suggestion ({})",
                        suggestion.direction,
                        suggestion.display_symbol(),
                        mode
                    ))?;
                    accepted.push(suggestion);
                }
                None => tracing::debug!("No {} setup for {}", mode, symbol),
            }
        }

        if accepted.is_empty() {
            self.store.add_log("No suitable suggestions found")?;
        } else {
            self.store
                .add_log(format!("✅ Generated {} suggestions", accepted.len()))?;
        }

        Ok(accepted)
    }
}
