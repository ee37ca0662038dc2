use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use futures_util::future::join_all;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use tradeguard::config::{BrokerKind, FeedSource, PersistenceBackend, Settings};
use tradeguard::engine::{Collaborators, TradingEngine};
use tradeguard::execution::{ExecutionClient, HttpExecutionClient, PaperBroker};
use tradeguard::feed::{HttpMarketFeed, MarketDataFeed, PaperLedger};
use tradeguard::notify::{FanoutNotifier, LogNotifier, Notifier, WebhookNotifier};
use tradeguard::persistence::{MemoryStore, PersistenceStore, PostgresStore, RedisStore};
use tradeguard::sim::SyntheticFeed;
use tradeguard::TradingMode;

#[derive(Parser)]
#[command(name = "tradeguard", version, about = "Risk-gated trading decision engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the decision, monitor and reaper loops until Ctrl+C
    Run {
        /// Settings file (defaults to config/tradeguard.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the configured trading mode
        #[arg(long)]
        mode: Option<TradingMode>,
    },
    /// Load and validate settings, then print them
    CheckConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    match Cli::parse().command {
        Command::Run { config, mode } => run(config, mode).await,
        Command::CheckConfig { config } => check_config(config),
    }
}

fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tradeguard=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_settings(path: Option<PathBuf>, mode: Option<TradingMode>) -> anyhow::Result<Settings> {
    let mut settings = Settings::load(path.as_deref()).context("Failed to load settings")?;
    if let Some(mode) = mode {
        settings.mode = mode;
    }
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

fn check_config(path: Option<PathBuf>) -> anyhow::Result<()> {
    let settings = load_settings(path, None)?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    tracing::info!("✓ Settings are valid ({:?} mode)", settings.mode);
    Ok(())
}

async fn run(path: Option<PathBuf>, mode: Option<TradingMode>) -> anyhow::Result<()> {
    let settings = load_settings(path, mode)?;

    tracing::info!("🚀 tradeguard starting in {:?} mode", settings.mode);
    tracing::info!("  Symbols: {}", settings.engine.symbols.join(", "));

    let collaborators = build_collaborators(&settings).await?;
    let engine = Arc::new(TradingEngine::new(&settings, collaborators));

    let restored = engine
        .restore()
        .await
        .context("Failed to restore positions")?;
    tracing::info!("Restored {} positions", restored);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = engine.spawn(shutdown_rx);

    tracing::info!("\nPress Ctrl+C to stop...\n");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    tracing::info!("⚠️  Received Ctrl+C, shutting down...");

    shutdown_tx.send(true).ok();
    for result in join_all(handles).await {
        if let Err(e) = result {
            tracing::error!("Loop exited abnormally: {}", e);
        }
    }

    let status = engine.status().await;
    tracing::info!(
        "👋 tradeguard stopped with {} open positions (breaker tripped: {})",
        status.positions.len(),
        status.circuit_breaker.tripped
    );
    Ok(())
}

async fn build_collaborators(settings: &Settings) -> anyhow::Result<Collaborators> {
    let live = settings.mode == TradingMode::Live;

    let feed: Arc<dyn MarketDataFeed> = match settings.feed.source {
        FeedSource::Synthetic => {
            if live {
                bail!("refusing to start live mode with the synthetic feed");
            }
            let synthetic = &settings.feed.synthetic;
            let feed = SyntheticFeed::new(synthetic.seed, synthetic.interval_minutes);
            for symbol in &settings.engine.symbols {
                let scenario = synthetic
                    .scenarios
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(symbol))
                    .map(|(_, scenario)| *scenario)
                    .unwrap_or(synthetic.default_scenario);
                feed.add_symbol(symbol, scenario, synthetic.base_price);
            }
            Arc::new(feed)
        }
        FeedSource::Http => Arc::new(HttpMarketFeed::new(settings.feed.http.clone())?),
    };

    let broker: Arc<dyn ExecutionClient> = match settings.execution.broker {
        BrokerKind::Paper => {
            if live {
                bail!("refusing to start live mode with the paper broker");
            }
            Arc::new(PaperBroker::new(
                settings.execution.paper_seed,
                settings.execution.paper_max_slippage_bps,
            ))
        }
        BrokerKind::Http => {
            let url = settings
                .execution
                .gateway_url
                .clone()
                .context("execution.gateway_url is required")?;
            Arc::new(HttpExecutionClient::new(url, settings.execution.timeout_secs)?)
        }
    };

    let persistence = &settings.persistence;
    let store: Arc<dyn PersistenceStore> = match persistence.backend {
        PersistenceBackend::Memory => {
            tracing::warn!("Using in-memory persistence: positions will not survive a restart");
            Arc::new(MemoryStore::new())
        }
        PersistenceBackend::Postgres => {
            let url = persistence
                .database_url
                .as_deref()
                .context("persistence.database_url is required")?;
            Arc::new(PostgresStore::new(url, persistence.max_connections).await?)
        }
        PersistenceBackend::Redis => {
            let url = persistence
                .redis_url
                .as_deref()
                .context("persistence.redis_url is required")?;
            Arc::new(RedisStore::new(url, &persistence.redis_prefix).await?)
        }
    };

    let mut notifiers: Vec<Box<dyn Notifier>> = vec![Box::new(LogNotifier)];
    if let Some(url) = &settings.notify.webhook_url {
        notifiers.push(Box::new(WebhookNotifier::new(
            url.clone(),
            settings.notify.timeout_secs,
        )?));
    }

    Ok(Collaborators {
        feed,
        ledger: Arc::new(PaperLedger::new(settings.execution.starting_balance_usd)),
        store,
        broker,
        notifier: Arc::new(FanoutNotifier::new(notifiers)),
    })
}
