use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futurebot::api::BinanceFuturesClient;
use futurebot::config::Settings;
use futurebot::feed::FeedState;
use futurebot::strategy::AnalysisError;
use futurebot::{TradingBot, TradingMode};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

#[derive(Parser)]
#[command(name = "futurebot")]
#[command(about = "Multi-timeframe trade suggestions for crypto futures", long_about = None)]
struct Cli {
    /// Config file (defaults to ./futurebot.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream market data and analyze periodically until Ctrl+C
    Run {
        /// Trading mode (scalp or swing), overrides the config
        #[arg(short, long)]
        mode: Option<TradingMode>,

        /// Seconds between analysis passes
        #[arg(long, default_value = "60")]
        analysis_interval_secs: u64,
    },

    /// Load market data once, run one analysis pass and print the suggestions
    Analyze {
        /// Trading mode (scalp or swing), overrides the config
        #[arg(short, long)]
        mode: Option<TradingMode>,

        /// Maximum suggestions to print
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Run {
            mode,
            analysis_interval_secs,
        } => run(settings, mode, Duration::from_secs(analysis_interval_secs.max(1))).await,
        Commands::Analyze { mode, limit } => analyze(settings, mode, limit).await,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn run(mut settings: Settings, mode: Option<TradingMode>, analysis_every: Duration) -> Result<()> {
    if let Some(mode) = mode {
        settings.trading.trading_mode = mode;
    }

    tracing::info!("🚀 FutureBot starting");
    log_configuration(&settings);

    let bot = build_bot(settings)?;
    bot.start().context("Failed to start data feed")?;

    let mut analysis_ticker = interval_at(Instant::now() + analysis_every, analysis_every);
    analysis_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("\n⚠️  Received Ctrl+C, shutting down...");
                break;
            }
            _ = analysis_ticker.tick() => {
                if bot.feed_state() == FeedState::Stopped {
                    tracing::error!("❌ Data feed exited, shutting down");
                    break;
                }

                match bot.run_analysis() {
                    Ok(suggestions) => {
                        for suggestion in &suggestions {
                            tracing::info!("💡 {}", suggestion);
                        }
                    }
                    Err(AnalysisError::AnalysisInProgress) => {
                        tracing::warn!("Previous analysis still running, skipping");
                    }
                    Err(e) => {
                        tracing::error!("❌ Analysis failed: {}", e);
                        break;
                    }
                }
            }
        }
    }

    bot.stop().await.context("Data feed ended with an error")?;

    let stats = bot.stats(100)?;
    tracing::info!(
        "📊 Session: {} suggestions ({} long / {} short), avg confidence {:.0}%",
        stats.total,
        stats.long,
        stats.short,
        stats.average_confidence * 100.0
    );

    Ok(())
}

async fn analyze(settings: Settings, mode: Option<TradingMode>, limit: usize) -> Result<()> {
    let mode = mode.unwrap_or(settings.trading.trading_mode);
    let bot = build_bot(settings)?;

    tracing::info!("📥 Loading market data...");
    bot.load_market_data()
        .await
        .context("Failed to load market data")?;

    for quote in bot.prices()? {
        println!("{:<10} {:>12.4} ({:+.2}%)", quote.symbol, quote.price, quote.change_24h);
    }

    let suggestions = bot.run_analysis_for(mode)?;
    if suggestions.is_empty() {
        println!("No suitable {} suggestions", mode);
    } else {
        for suggestion in suggestions.iter().take(limit) {
            println!("{}", suggestion);
        }
    }

    Ok(())
}

// ============================================================================
// Initialization Functions
// ============================================================================

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("futurebot=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_bot(settings: Settings) -> Result<TradingBot> {
    let client = BinanceFuturesClient::from_config(&settings.feed).context("Failed to build HTTP client")?;
    Ok(TradingBot::new(settings, Arc::new(client)))
}

fn log_configuration(settings: &Settings) {
    let trading = &settings.trading;
    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Mode: {}", trading.trading_mode);
    tracing::info!("  Capital: ${:.2}", trading.available_capital);
    tracing::info!("  Symbols: {}", trading.symbols.join(", "));
    tracing::info!(
        "  Max Leverage: {}x | Risk per trade: {}%",
        settings.risk_management.max_leverage,
        settings.risk_management.risk_per_trade * 100.0
    );
    tracing::info!("  Source: {}", settings.feed.base_url);
}
