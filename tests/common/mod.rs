#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use tokio::sync::mpsc::UnboundedReceiver;

use tradeguard::config::Settings;
use tradeguard::engine::Collaborators;
use tradeguard::execution::{ExecutionClient, PaperBroker};
use tradeguard::feed::{MarketDataFeed, PaperLedger};
use tradeguard::notify::ChannelNotifier;
use tradeguard::persistence::MemoryStore;
use tradeguard::strategy::{ModelFamily, StrategySignal};
use tradeguard::{
    Alert, AlertKind, Candle, Decision, Fill, MarketSnapshot, Result, Strategy, TradingEngine,
    TradingError,
};

struct Market {
    candles: Vec<Candle>,
    price: f64,
    spread: f64,
}

/// Feed whose candles and prices are set by the test
#[derive(Default)]
pub struct ScriptedFeed {
    markets: Mutex<HashMap<String, Market>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install candles; the snapshot price starts at the last close
    pub fn set_market(&self, symbol: &str, candles: Vec<Candle>, spread: f64) {
        let price = candles.last().map(|c| c.close).unwrap_or(0.0);
        self.markets.lock().unwrap().insert(
            symbol.to_string(),
            Market {
                candles,
                price,
                spread,
            },
        );
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        if let Some(market) = self.markets.lock().unwrap().get_mut(symbol) {
            market.price = price;
        }
    }
}

#[async_trait]
impl MarketDataFeed for ScriptedFeed {
    async fn get_snapshot(&self, symbol: &str) -> Result<MarketSnapshot> {
        let markets = self.markets.lock().unwrap();
        let market = markets
            .get(symbol)
            .ok_or_else(|| TradingError::data_unavailable(symbol, "not scripted"))?;

        Ok(MarketSnapshot {
            symbol: symbol.to_string(),
            price: market.price,
            volume: 1000.0,
            spread: market.spread,
            volatility: 0.0,
            timestamp: Utc::now(),
        })
    }

    async fn get_candles(&self, symbol: &str, count: usize) -> Result<Vec<Candle>> {
        let markets = self.markets.lock().unwrap();
        let market = markets
            .get(symbol)
            .ok_or_else(|| TradingError::data_unavailable(symbol, "not scripted"))?;

        let start = market.candles.len().saturating_sub(count);
        Ok(market.candles[start..].to_vec())
    }
}

/// Steady uptrend: close = 100 + i, true range of 5 on every bar
pub fn uptrend_candles(symbol: &str, count: usize) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let close = 100.0 + i as f64;
            Candle {
                symbol: symbol.to_string(),
                timestamp: start + Duration::minutes(5 * i as i64),
                open: close - 1.0,
                high: close + 2.0,
                low: close - 3.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Flat closes with 10% ranges, far above the crisis threshold
pub fn crisis_candles(symbol: &str, count: usize) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| Candle {
            symbol: symbol.to_string(),
            timestamp: start + Duration::minutes(5 * i as i64),
            open: 100.0,
            high: 105.0,
            low: 95.0,
            close: 100.0,
            volume: 1000.0,
        })
        .collect()
}

pub fn test_settings(symbols: &[&str]) -> Settings {
    let mut settings = Settings::default();
    settings.engine.symbols = symbols.iter().map(|s| s.to_string()).collect();
    settings.lifecycle.persist_initial_backoff_ms = 1;
    settings
}

pub struct Harness {
    pub engine: Arc<TradingEngine>,
    pub feed: Arc<ScriptedFeed>,
    pub ledger: Arc<PaperLedger>,
    pub store: Arc<MemoryStore>,
    pub alerts: UnboundedReceiver<Alert>,
}

impl Harness {
    pub fn new(settings: &Settings) -> Self {
        Self::with_parts(settings, Arc::new(ScriptedFeed::new()), Arc::new(MemoryStore::new()))
    }

    /// Build an engine over an existing feed and store, as after a restart
    pub fn with_parts(settings: &Settings, feed: Arc<ScriptedFeed>, store: Arc<MemoryStore>) -> Self {
        Self::build(settings, feed, store, Arc::new(PaperBroker::new(1, 0.0)), None)
    }

    pub fn with_broker(settings: &Settings, broker: Arc<dyn ExecutionClient>) -> Self {
        Self::build(
            settings,
            Arc::new(ScriptedFeed::new()),
            Arc::new(MemoryStore::new()),
            broker,
            None,
        )
    }

    pub fn with_strategies(settings: &Settings, strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self::build(
            settings,
            Arc::new(ScriptedFeed::new()),
            Arc::new(MemoryStore::new()),
            Arc::new(PaperBroker::new(1, 0.0)),
            Some(strategies),
        )
    }

    fn build(
        settings: &Settings,
        feed: Arc<ScriptedFeed>,
        store: Arc<MemoryStore>,
        broker: Arc<dyn ExecutionClient>,
        strategies: Option<Vec<Box<dyn Strategy>>>,
    ) -> Self {
        let ledger = Arc::new(PaperLedger::new(10_000.0));
        let (notifier, alerts) = ChannelNotifier::new();

        let mut engine = TradingEngine::new(
            settings,
            Collaborators {
                feed: feed.clone(),
                ledger: ledger.clone(),
                store: store.clone(),
                broker,
                notifier: Arc::new(notifier),
            },
        );
        if let Some(strategies) = strategies {
            engine = engine.with_strategies(strategies);
        }

        Self {
            engine: Arc::new(engine),
            feed,
            ledger,
            store,
            alerts,
        }
    }

    /// Every alert emitted so far
    pub fn drain_alerts(&mut self) -> Vec<Alert> {
        let mut alerts = Vec::new();
        while let Ok(alert) = self.alerts.try_recv() {
            alerts.push(alert);
        }
        alerts
    }
}

/// Model that always reports the same score
pub struct FixedSignal {
    pub name: &'static str,
    pub family: ModelFamily,
    pub score: f64,
    pub confidence: f64,
}

impl FixedSignal {
    pub fn boxed(
        name: &'static str,
        family: ModelFamily,
        score: f64,
        confidence: f64,
    ) -> Box<dyn Strategy> {
        Box::new(Self {
            name,
            family,
            score,
            confidence,
        })
    }
}

impl Strategy for FixedSignal {
    fn evaluate(&self, _candles: &[Candle]) -> Result<StrategySignal> {
        Ok(StrategySignal::new(
            self.name,
            self.family,
            self.score,
            self.confidence,
            "fixed",
        ))
    }

    fn name(&self) -> &str {
        self.name
    }

    fn family(&self) -> ModelFamily {
        self.family
    }

    fn min_candles_required(&self) -> usize {
        0
    }
}

/// Paper fills after a fixed delay, leaving an open in flight
pub struct SlowBroker {
    delay: std::time::Duration,
    inner: PaperBroker,
}

impl SlowBroker {
    pub fn new(delay: std::time::Duration) -> Self {
        Self {
            delay,
            inner: PaperBroker::new(1, 0.0),
        }
    }
}

#[async_trait]
impl ExecutionClient for SlowBroker {
    async fn submit(&self, decision: &Decision) -> Result<Fill> {
        tokio::time::sleep(self.delay).await;
        self.inner.submit(decision).await
    }
}

pub fn count_kind(alerts: &[Alert], kind: AlertKind) -> usize {
    alerts.iter().filter(|a| a.kind == kind).count()
}
