use crate::api::MarketDataSource;
use crate::config::FeedConfig;
use crate::models::Timeframe;
use crate::store::{MarketDataStore, StoreError};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Shortest refresh period the loop accepts
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Lifecycle of the fetch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for FeedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FeedState::Stopped => "stopped",
            FeedState::Starting => "starting",
            FeedState::Running => "running",
            FeedState::Stopping => "stopping",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("data feed is already {0}")]
    AlreadyRunning(FeedState),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("data feed task failed: {0}")]
    Task(String),
}

/// Refresh cadence and fetch sizes
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSchedule {
    pub price_interval: Duration,
    pub candle_interval: Duration,
    /// Candles loaded per (symbol, timeframe) when the loop starts
    pub backfill_limit: usize,
    /// Candles fetched per refresh; only the newest is recorded
    pub refresh_limit: usize,
}

impl Default for FeedSchedule {
    fn default() -> Self {
        Self::from(&FeedConfig::default())
    }
}

impl From<&FeedConfig> for FeedSchedule {
    fn from(config: &FeedConfig) -> Self {
        Self {
            price_interval: config.price_interval(),
            candle_interval: config.candle_interval(),
            backfill_limit: config.backfill_limit,
            refresh_limit: config.refresh_limit,
        }
    }
}

/// One session's worth of work: what to fetch, from where, into which store
#[derive(Clone)]
struct FeedWorker {
    source: Arc<dyn MarketDataSource>,
    store: MarketDataStore,
    schedule: FeedSchedule,
    symbols: Vec<String>,
    timeframes: Vec<Timeframe>,
    token: CancellationToken,
}

impl FeedWorker {
    /// Await `fut` unless the session is cancelled first
    async fn or_cancel<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            output = fut => Some(output),
        }
    }

    async fn backfill(&self) -> Result<(), FeedError> {
        for symbol in &self.symbols {
            for &timeframe in &self.timeframes {
                let fetch = self
                    .source
                    .fetch_candles(symbol, timeframe, self.schedule.backfill_limit);
                let Some(result) = self.or_cancel(fetch).await else {
                    return Ok(());
                };

                match result {
                    Ok(candles) => {
                        let stored = self.store.add_candles(candles)?;
                        self.store
                            .add_log(format!("Loaded {} candles for {} {}", stored, symbol, timeframe))?;
                    }
                    Err(e) => {
                        tracing::warn!("⚠️  Backfill failed for {} {}: {}", symbol, timeframe, e);
                        self.store
                            .add_log(format!("Failed to load {} {}: {}", symbol, timeframe, e))?;
                    }
                }
            }
        }

        Ok(())
    }

    async fn refresh_prices(&self) -> Result<(), FeedError> {
        for symbol in &self.symbols {
            let Some(result) = self.or_cancel(self.source.fetch_price(symbol)).await else {
                return Ok(());
            };

            match result {
                Ok(ticker) => self.store.update_price(symbol, ticker.price, ticker.change_24h)?,
                Err(e) => tracing::warn!("⚠️  Price refresh failed for {}: {}", symbol, e),
            }
        }

        Ok(())
    }

    /// The exchange's last candle may still be open, so only the newest one
    /// fetched is recorded; the store replaces the tail when timestamps match
    async fn refresh_candles(&self) -> Result<(), FeedError> {
        for symbol in &self.symbols {
            for &timeframe in &self.timeframes {
                let fetch = self
                    .source
                    .fetch_candles(symbol, timeframe, self.schedule.refresh_limit);
                let Some(result) = self.or_cancel(fetch).await else {
                    return Ok(());
                };

                match result {
                    Ok(candles) => {
                        if let Some(latest) = candles.into_iter().last() {
                            self.store.add_candle(latest)?;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("⚠️  Candle refresh failed for {} {}: {}", symbol, timeframe, e)
                    }
                }
            }
        }

        Ok(())
    }

    /// Connect, backfill, then refresh on schedule until cancelled
    async fn stream(
        &self,
        state: &watch::Sender<FeedState>,
        connected: &AtomicBool,
    ) -> Result<(), FeedError> {
        self.store.add_log("Connecting to market data source...")?;

        let Some(reachable) = self.or_cancel(self.source.check_reachable()).await else {
            return Ok(());
        };
        connected.store(reachable, Ordering::SeqCst);

        if reachable {
            self.store.add_log("✅ Connected to market data source")?;
        } else {
            self.store
                .add_log("⚠️  Market data source unreachable, will keep retrying")?;
        }

        state.send_if_modified(|s| {
            if *s == FeedState::Starting {
                *s = FeedState::Running;
                true
            } else {
                false
            }
        });

        self.backfill().await?;
        if self.token.is_cancelled() {
            return Ok(());
        }
        tracing::info!(
            "📈 Backfill complete for {} symbols x {} timeframes",
            self.symbols.len(),
            self.timeframes.len()
        );

        let candle_every = self.schedule.candle_interval.max(MIN_INTERVAL);
        let mut price_ticker = interval(self.schedule.price_interval.max(MIN_INTERVAL));
        price_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Backfill just loaded the candles; first refresh one period later
        let mut candle_ticker = interval_at(Instant::now() + candle_every, candle_every);
        candle_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = price_ticker.tick() => self.refresh_prices().await?,
                _ = candle_ticker.tick() => {
                    self.refresh_candles().await?;
                    tracing::debug!("Candles refreshed");
                }
            }
        }

        Ok(())
    }

    /// Full session: stream, then release the source and land in `Stopped`
    async fn run(
        self,
        state: Arc<watch::Sender<FeedState>>,
        connected: Arc<AtomicBool>,
    ) -> Result<(), FeedError> {
        let result = self.stream(&state, &connected).await;

        state.send_replace(FeedState::Stopping);
        self.source.disconnect().await;
        connected.store(false, Ordering::SeqCst);
        state.send_replace(FeedState::Stopped);

        match &result {
            Ok(()) => {
                tracing::info!("🛑 Data feed stopped");
                if let Err(e) = self.store.add_log("Data feed stopped") {
                    tracing::error!("Failed to record stop: {}", e);
                }
            }
            Err(e) => tracing::error!("❌ Data feed terminated: {}", e),
        }

        result
    }
}

struct RunningTask {
    token: CancellationToken,
    handle: JoinHandle<Result<(), FeedError>>,
}

/// Cancellable background task keeping the store's prices and candles fresh
///
/// `Stopped -> Starting -> Running -> Stopping -> Stopped`. Stop requests are
/// observed at every await point, including in-flight requests.
pub struct DataFetchLoop {
    source: Arc<dyn MarketDataSource>,
    store: MarketDataStore,
    schedule: FeedSchedule,
    state: Arc<watch::Sender<FeedState>>,
    connected: Arc<AtomicBool>,
    task: Mutex<Option<RunningTask>>,
}

impl DataFetchLoop {
    pub fn new(source: Arc<dyn MarketDataSource>, store: MarketDataStore, schedule: FeedSchedule) -> Self {
        let (state, _) = watch::channel(FeedState::Stopped);

        Self {
            source,
            store,
            schedule,
            state: Arc::new(state),
            connected: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> FeedState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    /// Running and the last reachability check succeeded
    pub fn is_connected(&self) -> bool {
        self.state() == FeedState::Running && self.connected.load(Ordering::SeqCst)
    }

    // The guarded value is only an Option swap, so a poisoned lock is still consistent
    fn lock_task(&self) -> MutexGuard<'_, Option<RunningTask>> {
        self.task.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn worker(&self, symbols: Vec<String>, timeframes: Vec<Timeframe>, token: CancellationToken) -> FeedWorker {
        FeedWorker {
            source: Arc::clone(&self.source),
            store: self.store.clone(),
            schedule: self.schedule.clone(),
            symbols,
            timeframes,
            token,
        }
    }

    /// Spawn the loop on the current tokio runtime
    pub fn start(&self, symbols: Vec<String>, timeframes: Vec<Timeframe>) -> Result<(), FeedError> {
        let mut task = self.lock_task();

        let current = self.state();
        if current != FeedState::Stopped {
            return Err(FeedError::AlreadyRunning(current));
        }

        tracing::info!(
            "🚀 Starting data feed: {} | {}",
            symbols.join(", "),
            timeframes
                .iter()
                .map(|tf| tf.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let token = CancellationToken::new();
        self.state.send_replace(FeedState::Starting);

        let worker = self.worker(symbols, timeframes, token.clone());
        let handle = tokio::spawn(worker.run(Arc::clone(&self.state), Arc::clone(&self.connected)));

        *task = Some(RunningTask { token, handle });
        Ok(())
    }

    /// Cancel the loop and wait for it to release the source.
    /// Returns the error that ended the loop, if any. No-op when stopped.
    pub async fn stop(&self) -> Result<(), FeedError> {
        let running = self.lock_task().take();
        let Some(RunningTask { token, handle }) = running else {
            return Ok(());
        };

        token.cancel();
        self.state.send_if_modified(|s| {
            if matches!(*s, FeedState::Starting | FeedState::Running) {
                *s = FeedState::Stopping;
                true
            } else {
                false
            }
        });

        match handle.await {
            Ok(result) => result,
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                self.state.send_replace(FeedState::Stopped);
                Err(FeedError::Task(e.to_string()))
            }
        }
    }

    /// One backfill plus one price refresh, without starting the loop
    pub async fn fetch_once(&self, symbols: Vec<String>, timeframes: Vec<Timeframe>) -> Result<(), FeedError> {
        let worker = self.worker(symbols, timeframes, CancellationToken::new());
        worker.backfill().await?;
        worker.refresh_prices().await
    }
}

impl Drop for DataFetchLoop {
    fn drop(&mut self) {
        if let Some(task) = self.lock_task().take() {
            task.token.cancel();
        }
    }
}
