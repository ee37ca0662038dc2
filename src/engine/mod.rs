// Trading engine module
// Wires the decision pipeline to the lifecycle manager and owns the admin surface.
pub mod scheduler;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Settings;
use crate::ensemble::{EnsembleDecision, SignalEnsemble};
use crate::execution::{
    CloseReason, ExecutionClient, Position, PositionLifecycleManager, PositionProposal,
    PositionState,
};
use crate::feed::{AccountLedger, MarketDataFeed};
use crate::indicators::calculate_atr;
use crate::models::{Alert, AlertKind, Candle, Side, TradingMode};
use crate::notify::Notifier;
use crate::persistence::PersistenceStore;
use crate::regime::{RegimeClassifier, RegimeState};
use crate::risk::{BreakerStatus, CircuitBreaker, ProposedTrade, RiskCheck, RiskDecision, RiskGate};
use crate::sizing::{PositionSizer, SizingRequest, WinRateTracker};
use crate::strategy::{
    CarryStrategy, CycleStrategy, MeanReversionStrategy, MomentumStrategy,
    MultiTimeframeStrategy, Strategy, StrategySignal,
};
use crate::timeframe::TimeframeAligner;
use crate::{Result, TradingError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub symbols: Vec<String>,
    pub tick_interval_secs: u64,
    pub monitor_interval_secs: u64,
    pub reaper_interval_secs: u64,
    /// Base candles fetched per evaluation; must cover the longest model lookback
    pub candle_lookback: usize,
    pub atr_period: usize,
    /// Stop distance in ATRs, before the regime stop multiplier
    pub stop_atr_multiple: f64,
    /// Target distance as a multiple of stop distance
    pub target_reward_risk: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTC".to_string(), "ETH".to_string(), "SOL".to_string()],
            tick_interval_secs: 15,
            monitor_interval_secs: 5,
            reaper_interval_secs: 10,
            candle_lookback: 480,
            atr_period: 14,
            stop_atr_multiple: 2.0,
            target_reward_risk: 2.5,
        }
    }
}

/// External collaborators injected into the engine
pub struct Collaborators {
    pub feed: Arc<dyn MarketDataFeed>,
    pub ledger: Arc<dyn AccountLedger>,
    pub store: Arc<dyn PersistenceStore>,
    pub broker: Arc<dyn ExecutionClient>,
    pub notifier: Arc<dyn Notifier>,
}

/// What happened to one symbol in one tick
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// Nothing evaluated (paused, data unavailable, regime, timeframes not aligned, no stop)
    Skipped(String),
    /// Ensemble produced no direction
    NoSignal(EnsembleDecision),
    Denied(RiskDecision),
    /// A position was created (Monitoring in paper, PendingConfirmation in live)
    Opened(Position),
    Failed(String),
}

/// Planned stop and target for a directional decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitPlan {
    pub stop_loss: f64,
    pub take_profit: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub mode: TradingMode,
    pub paused: bool,
    pub circuit_breaker: BreakerStatus,
    pub daily_loss_latched_on: Option<NaiveDate>,
    pub positions: Vec<Position>,
    pub recent_closed: usize,
    pub win_rate: Option<f64>,
    pub consecutive_losses: usize,
}

#[derive(Debug, Default)]
struct DenialStreak {
    check: Option<RiskCheck>,
    count: usize,
}

pub struct TradingEngine {
    config: EngineConfig,
    mode: TradingMode,
    feed: Arc<dyn MarketDataFeed>,
    ledger: Arc<dyn AccountLedger>,
    notifier: Arc<dyn Notifier>,
    classifier: RegimeClassifier,
    aligner: TimeframeAligner,
    strategies: Vec<Box<dyn Strategy>>,
    ensemble: SignalEnsemble,
    sizer: PositionSizer,
    gate: RiskGate,
    lifecycle: PositionLifecycleManager,
    breaker: Arc<CircuitBreaker>,
    tracker: Arc<WinRateTracker>,
    paused: AtomicBool,
    denials: Mutex<DenialStreak>,
}

/// The standard model set, one per family
pub fn default_strategies(settings: &Settings) -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(MomentumStrategy::new(settings.momentum.clone())),
        Box::new(MeanReversionStrategy::new(settings.mean_reversion.clone())),
        Box::new(CycleStrategy::new(settings.cycle.clone())),
        Box::new(CarryStrategy::new(settings.carry.clone())),
        Box::new(MultiTimeframeStrategy::new(TimeframeAligner::new(
            settings.timeframe.clone(),
        ))),
    ]
}

/// Deterministic key for a decision: UUIDv5 over `symbol:tick:fingerprint`.
///
/// The fingerprint is direction, confidence to 2dp and the sorted
/// contributing models, so a resubmitted decision in the same tick window
/// carries the same key.
pub fn idempotency_key(symbol: &str, tick: i64, decision: &EnsembleDecision) -> String {
    let mut models = decision.contributing_models.clone();
    models.sort();
    let fingerprint = format!(
        "{:?}:{:.2}:{}",
        decision.direction,
        decision.confidence,
        models.join(",")
    );
    let name = format!("{}:{}:{}", symbol, tick, fingerprint);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

impl TradingEngine {
    pub fn new(settings: &Settings, collaborators: Collaborators) -> Self {
        let tracker = Arc::new(WinRateTracker::new(settings.sizing.win_rate_window));
        let breaker = Arc::new(CircuitBreaker::new());

        let lifecycle = PositionLifecycleManager::new(
            settings.mode,
            settings.lifecycle.clone(),
            collaborators.store,
            collaborators.broker,
            breaker.clone(),
        );

        Self {
            config: settings.engine.clone(),
            mode: settings.mode,
            feed: collaborators.feed,
            ledger: collaborators.ledger,
            notifier: collaborators.notifier,
            classifier: RegimeClassifier::new(settings.regime.clone()),
            aligner: TimeframeAligner::new(settings.timeframe.clone()),
            strategies: default_strategies(settings),
            ensemble: SignalEnsemble::new(settings.ensemble.clone(), tracker.clone()),
            sizer: PositionSizer::new(settings.sizing.clone(), tracker.clone()),
            gate: RiskGate::new(settings.risk.clone(), breaker.clone()),
            lifecycle,
            breaker,
            tracker,
            paused: AtomicBool::new(false),
            denials: Mutex::new(DenialStreak::default()),
        }
    }

    /// Replace the model set
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn Strategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &PositionLifecycleManager {
        &self.lifecycle
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn win_rate_tracker(&self) -> &Arc<WinRateTracker> {
        &self.tracker
    }

    pub fn risk_gate(&self) -> &RiskGate {
        &self.gate
    }

    // ---- decision pipeline ----

    /// Evaluate every tracked symbol concurrently
    pub async fn run_tick(&self) -> Vec<(String, Evaluation)> {
        let now = Utc::now();
        let tick = now.timestamp() / self.config.tick_interval_secs.max(1) as i64;

        tracing::info!("🔄 Decision tick {} over {} symbols", tick, self.config.symbols.len());

        let evaluations = join_all(
            self.config
                .symbols
                .iter()
                .map(|symbol| self.evaluate_symbol(symbol, tick)),
        )
        .await;

        self.config
            .symbols
            .iter()
            .cloned()
            .zip(evaluations)
            .collect()
    }

    /// Regime → alignment → strategies → ensemble → exits → sizing → risk → open
    pub async fn evaluate_symbol(&self, symbol: &str, tick: i64) -> Evaluation {
        if self.is_paused() {
            return Evaluation::Skipped("engine paused".to_string());
        }

        let snapshot = match self.feed.get_snapshot(symbol).await {
            Ok(snapshot) => snapshot,
            Err(e) => return self.skip(symbol, e),
        };
        let candles = match self
            .feed
            .get_candles(symbol, self.config.candle_lookback)
            .await
        {
            Ok(candles) => candles,
            Err(e) => return self.skip(symbol, e),
        };

        let regime = self.classifier.classify(&candles, snapshot.spread);
        tracing::debug!(
            symbol = %symbol,
            "Regime {} (volatility {:.4}, confidence {:.2})",
            regime.state,
            regime.volatility,
            regime.confidence
        );
        if !regime.state.is_tradeable() {
            return Evaluation::Skipped(format!("regime {}", regime.state));
        }

        // Horizons must agree before any model is consulted
        let alignment = self.aligner.analyze(&candles);
        if !alignment.aligned {
            tracing::debug!(symbol = %symbol, "Timeframes not aligned, no trade");
            return Evaluation::Skipped("timeframes not aligned".to_string());
        }

        let signals = self.collect_signals(symbol, &candles);
        let decision = self.ensemble.combine(&signals);
        let Some(side) = decision.direction.side() else {
            tracing::debug!(symbol = %symbol, "No signal: {}", decision.rationale);
            return Evaluation::NoSignal(decision);
        };
        if decision.direction != alignment.direction.as_direction() {
            tracing::debug!(
                symbol = %symbol,
                "Ensemble {:?} contradicts {:?} timeframe alignment",
                decision.direction,
                alignment.direction
            );
            return Evaluation::NoSignal(EnsembleDecision::abstain(format!(
                "ensemble {:?} contradicts {:?} timeframe alignment",
                decision.direction, alignment.direction
            )));
        }

        let entry = snapshot.price;
        let Some(exits) = self.plan_exits(&candles, &regime, side, entry) else {
            return Evaluation::Skipped("no valid stop distance".to_string());
        };

        let mut account = match self.ledger.account_state().await {
            Ok(account) => account,
            Err(e) => return self.skip(symbol, e),
        };
        account.open_exposure_usd = account
            .open_exposure_usd
            .max(self.lifecycle.open_exposure().await);

        let sizing = self.sizer.size(&SizingRequest {
            symbol: symbol.to_string(),
            entry_price: entry,
            stop_loss: exits.stop_loss,
            take_profit: exits.take_profit,
            confidence: decision.confidence,
            balance_usd: account.balance_usd,
            regime: regime.state,
        });

        let trade = ProposedTrade {
            symbol: symbol.to_string(),
            side,
            entry_price: entry,
            stop_loss: exits.stop_loss,
            take_profit: exits.take_profit,
            quantity: sizing.quantity,
            notional_usd: sizing.notional_usd,
            regime: regime.state,
        };

        let has_active = self.lifecycle.has_active_position(symbol).await;
        let risk = self.gate.evaluate(&trade, &account, has_active, Utc::now());
        if !risk.allowed {
            self.track_denial(symbol, &risk).await;
            return Evaluation::Denied(risk);
        }
        self.clear_denials();

        let proposal = PositionProposal {
            symbol: symbol.to_string(),
            side,
            entry_price: entry,
            quantity: sizing.quantity,
            stop_loss: exits.stop_loss,
            take_profit: exits.take_profit,
            idempotency_key: idempotency_key(symbol, tick, &decision),
            rationale: format!("{} | {}", decision.rationale, sizing.rationale),
        };

        match self.lifecycle.open(proposal).await {
            Ok(position) => {
                self.on_opened(&position).await;
                Evaluation::Opened(position)
            }
            Err(TradingError::PositionExists(_)) => Evaluation::Denied(RiskDecision::deny(
                RiskCheck::ActivePosition,
                format!("{} already has an active position", symbol),
            )),
            Err(TradingError::RiskLimitBreached(reason)) => {
                Evaluation::Denied(RiskDecision::deny(RiskCheck::CircuitBreaker, reason))
            }
            Err(e) => {
                self.alert_error(Some(symbol), &e).await;
                Evaluation::Failed(e.to_string())
            }
        }
    }

    fn collect_signals(&self, symbol: &str, candles: &[Candle]) -> Vec<StrategySignal> {
        let mut signals = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            match strategy.evaluate(candles) {
                Ok(signal) => {
                    tracing::debug!(
                        symbol = %symbol,
                        model = %signal.model,
                        "score {:.3}, confidence {:.2}: {}",
                        signal.score,
                        signal.confidence,
                        signal.rationale
                    );
                    signals.push(signal);
                }
                Err(e) if e.is_silent() => {
                    tracing::debug!(symbol = %symbol, model = strategy.name(), "Skipped: {}", e);
                }
                Err(e) => {
                    tracing::warn!(symbol = %symbol, model = strategy.name(), "Model failed: {}", e);
                }
            }
        }
        signals
    }

    /// ATR-based stop scaled by the regime, target at `target_reward_risk`
    pub fn plan_exits(
        &self,
        candles: &[Candle],
        regime: &RegimeState,
        side: Side,
        entry: f64,
    ) -> Option<ExitPlan> {
        let atr = calculate_atr(candles, self.config.atr_period)?;
        let distance = atr * self.config.stop_atr_multiple * regime.state.stop_multiplier();
        if !(distance.is_finite() && distance > 0.0 && entry.is_finite() && entry > 0.0) {
            return None;
        }

        let target = distance * self.config.target_reward_risk;
        let plan = match side {
            Side::Long => ExitPlan {
                stop_loss: entry - distance,
                take_profit: entry + target,
            },
            Side::Short => ExitPlan {
                stop_loss: entry + distance,
                take_profit: entry - target,
            },
        };

        if plan.stop_loss <= 0.0 || plan.take_profit <= 0.0 {
            return None;
        }
        Some(plan)
    }

    fn skip(&self, symbol: &str, error: TradingError) -> Evaluation {
        if error.is_silent() {
            tracing::warn!(symbol = %symbol, "Skipping this tick: {}", error);
        } else {
            tracing::error!(symbol = %symbol, "Skipping this tick: {}", error);
        }
        Evaluation::Skipped(error.to_string())
    }

    // ---- monitoring ----

    /// One pass of the monitoring loop over every Monitoring position.
    /// Returns positions closed in this pass.
    pub async fn monitor_once(&self) -> Vec<Position> {
        let symbols: HashSet<String> = self
            .lifecycle
            .open_positions()
            .await
            .into_iter()
            .filter(|p| p.state == PositionState::Monitoring)
            .map(|p| p.symbol)
            .collect();

        let mut closed = Vec::new();
        for symbol in symbols {
            let price = match self.feed.get_snapshot(&symbol).await {
                Ok(snapshot) => snapshot.price,
                Err(e) => {
                    tracing::warn!(symbol = %symbol, "Monitor skipped: {}", e);
                    continue;
                }
            };

            match self.lifecycle.update_and_check(&symbol, price).await {
                Ok(positions) => {
                    for position in positions {
                        self.on_closed(&position).await;
                        closed.push(position);
                    }
                }
                Err(e) => self.alert_error(Some(&symbol), &e).await,
            }
        }

        if !closed.is_empty() {
            self.check_losing_streak().await;
        }
        closed
    }

    /// Cancel expired confirmations and alert on each
    pub async fn reap_once(&self, now: DateTime<Utc>) -> Vec<Position> {
        let cancelled = self.lifecycle.reap_expired(now).await;
        for position in &cancelled {
            self.alert(
                Alert::new(
                    AlertKind::ConfirmationExpired,
                    "Confirmation expired",
                    format!("Pending order {} was not confirmed in time", position.id),
                )
                .for_symbol(&position.symbol),
            )
            .await;
        }
        cancelled
    }

    // ---- admin ----

    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            tracing::warn!("⏸️  Engine paused: no new positions will be proposed");
        }
    }

    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::SeqCst) {
            tracing::info!("▶️  Engine resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Halt trading and flatten every filled position.
    /// Returns the flatten result per position.
    ///
    /// On an already tripped breaker this retries the flatten for anything
    /// a previous attempt left open.
    pub async fn trip_circuit_breaker(&self, reason: &str) -> Vec<Result<Position>> {
        if self.breaker.trip(reason) {
            self.alert(Alert::new(
                AlertKind::CircuitBreakerTripped,
                "Circuit breaker tripped",
                reason,
            ))
            .await;
        } else if !self.lifecycle.has_filled_positions().await {
            return Vec::new();
        } else {
            tracing::warn!("Circuit breaker already tripped, retrying flatten ({})", reason);
        }

        let mut prices = HashMap::new();
        for position in self.lifecycle.open_positions().await {
            if prices.contains_key(&position.symbol) {
                continue;
            }
            if let Ok(snapshot) = self.feed.get_snapshot(&position.symbol).await {
                prices.insert(position.symbol.clone(), snapshot.price);
            }
        }

        let results = self.lifecycle.flatten_all(&prices).await;
        for result in &results {
            match result {
                Ok(position) => self.on_closed(position).await,
                Err(e) => self.alert_error(None, e).await,
            }
        }
        results
    }

    /// The only way to clear a tripped breaker
    pub async fn reset_circuit_breaker(&self) -> bool {
        if !self.breaker.reset() {
            return false;
        }
        self.alert(Alert::new(
            AlertKind::CircuitBreakerReset,
            "Circuit breaker reset",
            "Trading may resume",
        ))
        .await;
        true
    }

    pub async fn confirm_pending_order(
        &self,
        id: Uuid,
        token: Uuid,
        approve: bool,
    ) -> Result<Position> {
        match self.lifecycle.confirm(id, token, approve, Utc::now()).await {
            Ok(position) => {
                if position.state == PositionState::Monitoring {
                    self.on_opened(&position).await;
                }
                Ok(position)
            }
            Err(e) => {
                if e.requires_alert() {
                    self.alert_error(None, &e).await;
                }
                Err(e)
            }
        }
    }

    /// Manual close at the freshest available price
    pub async fn close_position(&self, id: Uuid) -> Result<Position> {
        let position = self
            .lifecycle
            .get(id)
            .await
            .ok_or(TradingError::PositionNotFound(id))?;

        let price = match self.feed.get_snapshot(&position.symbol).await {
            Ok(snapshot) => snapshot.price,
            Err(_) => position.mark_price.unwrap_or(position.entry_price),
        };

        match self.lifecycle.close(id, price, CloseReason::Manual).await {
            Ok(closed) => {
                self.on_closed(&closed).await;
                self.check_losing_streak().await;
                Ok(closed)
            }
            Err(e) => {
                if e.requires_alert() {
                    self.alert_error(Some(&position.symbol), &e).await;
                }
                Err(e)
            }
        }
    }

    pub async fn status(&self) -> EngineStatus {
        EngineStatus {
            mode: self.mode,
            paused: self.is_paused(),
            circuit_breaker: self.breaker.status(),
            daily_loss_latched_on: self.gate.latch().latched_on(),
            positions: self.lifecycle.open_positions().await,
            recent_closed: self.lifecycle.recent_closed().await.len(),
            win_rate: self.tracker.win_rate(),
            consecutive_losses: self.tracker.consecutive_losses(),
        }
    }

    /// Reload persisted positions after a restart
    pub async fn restore(&self) -> Result<usize> {
        let restored = self.lifecycle.restore().await?;

        for position in &restored {
            match position.state {
                PositionState::Failed => {
                    self.alert(
                        Alert::new(
                            AlertKind::ExecutionFailure,
                            "Unknown submission outcome",
                            format!(
                                "Position {} was proposed before shutdown; review it manually",
                                position.id
                            ),
                        )
                        .for_symbol(&position.symbol),
                    )
                    .await;
                }
                PositionState::Monitoring => {
                    if let Err(e) = self.ledger.on_position_opened(position).await {
                        tracing::warn!("Ledger did not accept restored position: {}", e);
                    }
                }
                _ => {}
            }
        }

        Ok(restored.len())
    }

    // ---- bookkeeping ----

    async fn on_opened(&self, position: &Position) {
        match position.state {
            PositionState::PendingConfirmation => {
                let token = position
                    .confirmation
                    .as_ref()
                    .map(|c| c.token.to_string())
                    .unwrap_or_default();
                self.alert(
                    Alert::new(
                        AlertKind::PendingConfirmation,
                        "Order awaiting confirmation",
                        format!(
                            "{:?} {:.6} @ ${:.4}, position {}, token {}",
                            position.side,
                            position.quantity,
                            position.entry_price,
                            position.id,
                            token
                        ),
                    )
                    .for_symbol(&position.symbol),
                )
                .await;
            }
            _ => {
                if let Err(e) = self.ledger.on_position_opened(position).await {
                    tracing::warn!("Ledger did not accept opened position: {}", e);
                }
                self.alert(
                    Alert::new(
                        AlertKind::TradeOpened,
                        "Position opened",
                        format!(
                            "{:?} {:.6} @ ${:.4} (stop ${:.4}, target ${:.4})",
                            position.side,
                            position.quantity,
                            position.entry_price,
                            position.stop_loss,
                            position.take_profit
                        ),
                    )
                    .for_symbol(&position.symbol),
                )
                .await;
            }
        }
    }

    async fn on_closed(&self, position: &Position) {
        let pnl = position.realized_pnl.unwrap_or(0.0);
        self.sizer.record_outcome(pnl);

        if let Err(e) = self.ledger.on_position_closed(position).await {
            tracing::warn!("Ledger did not accept closed position: {}", e);
        }

        self.alert(
            Alert::new(
                AlertKind::TradeClosed,
                "Position closed",
                format!(
                    "{:?} @ ${:.4}, P&L ${:.2}",
                    position.close_reason,
                    position.exit_price.unwrap_or(0.0),
                    pnl
                ),
            )
            .for_symbol(&position.symbol),
        )
        .await;
    }

    /// Trip the breaker once the losing streak reaches the configured limit
    async fn check_losing_streak(&self) {
        let limit = self.gate.limits().max_consecutive_losses;
        if limit == 0 {
            return;
        }

        let losses = self.tracker.consecutive_losses();
        if losses >= limit && !self.breaker.is_tripped() {
            let reason = format!("{} consecutive losing trades", losses);
            self.trip_circuit_breaker(&reason).await;
        }
    }

    /// Count identical account-level denials; alert when the run hits the threshold
    async fn track_denial(&self, symbol: &str, decision: &RiskDecision) {
        let Some(check) = decision.check.filter(|c| c.is_account_level()) else {
            return;
        };

        let count = {
            let mut streak = match self.denials.lock() {
                Ok(streak) => streak,
                Err(poisoned) => poisoned.into_inner(),
            };
            if streak.check == Some(check) {
                streak.count += 1;
            } else {
                streak.check = Some(check);
                streak.count = 1;
            }
            streak.count
        };

        if count == self.gate.limits().repeat_alert_threshold {
            self.alert(
                Alert::new(
                    AlertKind::RiskBreach,
                    "Repeated risk denials",
                    format!(
                        "{} consecutive {:?} denials: {}",
                        count,
                        check,
                        decision.reason.as_deref().unwrap_or("")
                    ),
                )
                .for_symbol(symbol),
            )
            .await;
        }
    }

    fn clear_denials(&self) {
        let mut streak = match self.denials.lock() {
            Ok(streak) => streak,
            Err(poisoned) => poisoned.into_inner(),
        };
        *streak = DenialStreak::default();
    }

    async fn alert_error(&self, symbol: Option<&str>, error: &TradingError) {
        let kind = match error {
            TradingError::PersistenceFailure(_) => AlertKind::PersistenceFailure,
            TradingError::ConfirmationExpired(_) => AlertKind::ConfirmationExpired,
            _ => AlertKind::ExecutionFailure,
        };

        let mut alert = Alert::new(kind, "Lifecycle failure", error.to_string());
        if let Some(symbol) = symbol {
            alert = alert.for_symbol(symbol);
        }
        self.alert(alert).await;
    }

    async fn alert(&self, alert: Alert) {
        if let Err(e) = self.notifier.notify(&alert).await {
            tracing::warn!("Failed to deliver alert '{}': {}", alert.title, e);
        }
    }
}
