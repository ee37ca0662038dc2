/// Position lifecycle manager
///
/// Owns every position from proposal to a terminal state. It is the single
/// source of truth: each transition is persisted (with bounded retry) before
/// the in-memory index changes, and all mutations for a symbol run under that
/// symbol's lock so at most one position per symbol is ever active.
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::{sleep, Duration};
use uuid::Uuid;

use super::position::{CloseReason, PendingConfirmation, Position, PositionState};
use super::{ExecutionClient, SymbolLocks};
use crate::models::{Decision, DecisionAction, Side, TradingMode};
use crate::persistence::PersistenceStore;
use crate::risk::CircuitBreaker;
use crate::{Result, TradingError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Share of open profit locked in by the trailing stop
    pub trail_fraction: f64,
    pub confirmation_ttl_secs: i64,
    pub persist_max_attempts: u32,
    pub persist_initial_backoff_ms: u64,
    /// Terminal positions kept in memory for status queries
    pub recent_closed_limit: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            trail_fraction: 0.5,
            confirmation_ttl_secs: 300,
            persist_max_attempts: 3,
            persist_initial_backoff_ms: 50,
            recent_closed_limit: 100,
        }
    }
}

/// A risk-approved trade ready to become a position
#[derive(Debug, Clone)]
pub struct PositionProposal {
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub quantity: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub idempotency_key: String,
    pub rationale: String,
}

pub struct PositionLifecycleManager {
    mode: TradingMode,
    config: LifecycleConfig,
    store: Arc<dyn PersistenceStore>,
    broker: Arc<dyn ExecutionClient>,
    breaker: Arc<CircuitBreaker>,
    locks: SymbolLocks,
    /// Non-terminal positions by id
    positions: RwLock<HashMap<Uuid, Position>>,
    recent_closed: RwLock<VecDeque<Position>>,
}

impl PositionLifecycleManager {
    pub fn new(
        mode: TradingMode,
        config: LifecycleConfig,
        store: Arc<dyn PersistenceStore>,
        broker: Arc<dyn ExecutionClient>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            mode,
            config,
            store,
            broker,
            breaker,
            locks: SymbolLocks::new(),
            positions: RwLock::new(HashMap::new()),
            recent_closed: RwLock::new(VecDeque::new()),
        }
    }

    pub fn mode(&self) -> TradingMode {
        self.mode
    }

    // ---- queries ----

    pub async fn get(&self, id: Uuid) -> Option<Position> {
        if let Some(position) = self.positions.read().await.get(&id) {
            return Some(position.clone());
        }
        self.recent_closed
            .read()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    /// All non-terminal positions, oldest first
    pub async fn open_positions(&self) -> Vec<Position> {
        let mut positions: Vec<Position> = self.positions.read().await.values().cloned().collect();
        positions.sort_by_key(|p| p.created_at);
        positions
    }

    pub async fn recent_closed(&self) -> Vec<Position> {
        self.recent_closed.read().await.iter().cloned().collect()
    }

    /// True if the symbol's slot is taken by any non-terminal position
    pub async fn has_active_position(&self, symbol: &str) -> bool {
        self.positions
            .read()
            .await
            .values()
            .any(|p| p.symbol == symbol)
    }

    /// Notional of filled positions (Open and Monitoring)
    pub async fn open_exposure(&self) -> f64 {
        self.positions
            .read()
            .await
            .values()
            .filter(|p| matches!(p.state, PositionState::Open | PositionState::Monitoring))
            .map(|p| p.notional())
            .sum()
    }

    // ---- commands ----

    /// Create a position from an approved proposal.
    ///
    /// Paper mode submits immediately and returns the Monitoring position;
    /// live mode returns a PendingConfirmation position carrying the token.
    pub async fn open(&self, proposal: PositionProposal) -> Result<Position> {
        let _guard = self.locks.acquire(&proposal.symbol).await;

        if self.has_active_position(&proposal.symbol).await {
            return Err(TradingError::PositionExists(proposal.symbol));
        }

        // Re-read under the symbol lock, immediately before commit
        if self.breaker.is_tripped() {
            return Err(TradingError::RiskLimitBreached(
                "circuit breaker tripped".to_string(),
            ));
        }

        let position = Position::proposed(
            &proposal.symbol,
            proposal.side,
            proposal.entry_price,
            proposal.quantity,
            proposal.stop_loss,
            proposal.take_profit,
            proposal.idempotency_key,
            proposal.rationale,
        );
        self.commit(position.clone()).await?;

        tracing::info!(
            id = %position.id,
            symbol = %position.symbol,
            side = ?position.side,
            quantity = position.quantity,
            "Position proposed"
        );

        match self.mode {
            TradingMode::Paper => self.submit_open(position).await,
            TradingMode::Live => {
                let now = Utc::now();
                let mut next = position;
                next.transition(PositionState::PendingConfirmation, now)?;
                next.confirmation = Some(PendingConfirmation {
                    token: Uuid::new_v4(),
                    expires_at: now + ChronoDuration::seconds(self.config.confirmation_ttl_secs),
                });
                self.commit(next.clone()).await?;

                tracing::info!(
                    id = %next.id,
                    symbol = %next.symbol,
                    "Awaiting operator confirmation"
                );
                Ok(next)
            }
        }
    }

    /// Approve or reject a pending live order
    pub async fn confirm(
        &self,
        id: Uuid,
        token: Uuid,
        approve: bool,
        now: DateTime<Utc>,
    ) -> Result<Position> {
        let symbol = self
            .positions
            .read()
            .await
            .get(&id)
            .map(|p| p.symbol.clone())
            .ok_or(TradingError::PositionNotFound(id))?;
        let _guard = self.locks.acquire(&symbol).await;

        let position = self
            .positions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(TradingError::PositionNotFound(id))?;

        let Some(confirmation) = position.confirmation.clone() else {
            return Err(TradingError::InvalidTransition {
                id,
                from: position.state,
                to: PositionState::Open,
            });
        };
        if position.state != PositionState::PendingConfirmation {
            return Err(TradingError::InvalidTransition {
                id,
                from: position.state,
                to: PositionState::Open,
            });
        }
        if confirmation.token != token {
            return Err(TradingError::InvalidConfirmationToken(id));
        }

        if now > confirmation.expires_at {
            let mut next = position;
            next.transition(PositionState::Cancelled, now)?;
            self.commit(next).await?;
            return Err(TradingError::ConfirmationExpired(id));
        }

        if !approve {
            let mut next = position;
            next.transition(PositionState::Cancelled, now)?;
            self.commit(next.clone()).await?;
            tracing::info!(id = %id, symbol = %symbol, "Pending order rejected by operator");
            return Ok(next);
        }

        if self.breaker.is_tripped() {
            let mut next = position;
            next.transition(PositionState::Cancelled, now)?;
            self.commit(next).await?;
            return Err(TradingError::RiskLimitBreached(
                "circuit breaker tripped before confirmation".to_string(),
            ));
        }

        self.submit_open(position).await
    }

    /// Apply a fresh price: ratchet trailing stops and close on stop/target.
    /// Returns positions closed by this update.
    pub async fn update_and_check(&self, symbol: &str, price: f64) -> Result<Vec<Position>> {
        if !(price.is_finite() && price > 0.0) {
            return Ok(Vec::new());
        }

        let _guard = self.locks.acquire(symbol).await;

        let monitored: Vec<Position> = self
            .positions
            .read()
            .await
            .values()
            .filter(|p| p.symbol == symbol && p.state == PositionState::Monitoring)
            .cloned()
            .collect();

        let mut closed = Vec::new();
        for mut position in monitored {
            position.mark_price = Some(price);

            let previous_stop = position.stop_loss;
            if position.update_trailing_stop(price, self.config.trail_fraction) {
                position.updated_at = Utc::now();
                self.commit(position.clone()).await?;
                tracing::info!(
                    id = %position.id,
                    symbol = %symbol,
                    "Trailing stop {:.4} -> {:.4}",
                    previous_stop,
                    position.stop_loss
                );
            } else if let Some(p) = self.positions.write().await.get_mut(&position.id) {
                // Mark is an observation, not a transition
                p.mark_price = Some(price);
            }

            if let Some(reason) = position.exit_trigger(price) {
                closed.push(self.close_locked(position, price, reason).await?);
            }
        }

        Ok(closed)
    }

    /// Close an Open or Monitoring position
    pub async fn close(&self, id: Uuid, price: f64, reason: CloseReason) -> Result<Position> {
        let symbol = self
            .positions
            .read()
            .await
            .get(&id)
            .map(|p| p.symbol.clone())
            .ok_or(TradingError::PositionNotFound(id))?;
        let _guard = self.locks.acquire(&symbol).await;

        let position = self
            .positions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(TradingError::PositionNotFound(id))?;

        self.close_locked(position, price, reason).await
    }

    /// Close every filled position at the best price available:
    /// snapshot price, then last mark, then entry.
    ///
    /// Takes each symbol's lock first, so an open still awaiting its fill
    /// completes and is then closed here. Call only after the breaker is
    /// tripped; opens that start later are refused.
    pub async fn flatten_all(&self, prices: &HashMap<String, f64>) -> Vec<Result<Position>> {
        let mut symbols: BTreeSet<String> = self.locks.symbols().into_iter().collect();
        symbols.extend(
            self.positions
                .read()
                .await
                .values()
                .map(|p| p.symbol.clone()),
        );

        let mut results = Vec::new();
        for symbol in symbols {
            let _guard = self.locks.acquire(&symbol).await;

            let targets: Vec<Position> = self
                .positions
                .read()
                .await
                .values()
                .filter(|p| p.symbol == symbol)
                .filter(|p| matches!(p.state, PositionState::Open | PositionState::Monitoring))
                .cloned()
                .collect();

            for position in targets {
                let price = prices
                    .get(&symbol)
                    .copied()
                    .filter(|v| v.is_finite() && *v > 0.0)
                    .or(position.mark_price)
                    .unwrap_or(position.entry_price);
                results.push(
                    self.close_locked(position, price, CloseReason::EmergencyFlatten)
                        .await,
                );
            }
        }

        let failed = results.iter().filter(|r| r.is_err()).count();
        tracing::warn!(
            "Flattened {} open positions ({} failed)",
            results.len() - failed,
            failed
        );
        results
    }

    /// True if any position is filled (Open or Monitoring)
    pub async fn has_filled_positions(&self) -> bool {
        self.positions
            .read()
            .await
            .values()
            .any(|p| matches!(p.state, PositionState::Open | PositionState::Monitoring))
    }

    /// Cancel pending confirmations past their TTL. Never retries.
    pub async fn reap_expired(&self, now: DateTime<Utc>) -> Vec<Position> {
        let expired: Vec<(Uuid, String)> = self
            .positions
            .read()
            .await
            .values()
            .filter(|p| p.state == PositionState::PendingConfirmation)
            .filter(|p| {
                p.confirmation
                    .as_ref()
                    .map(|c| c.expires_at <= now)
                    .unwrap_or(true)
            })
            .map(|p| (p.id, p.symbol.clone()))
            .collect();

        let mut cancelled = Vec::new();
        for (id, symbol) in expired {
            let _guard = self.locks.acquire(&symbol).await;

            let Some(mut position) = self.positions.read().await.get(&id).cloned() else {
                continue;
            };
            if position.state != PositionState::PendingConfirmation {
                continue;
            }
            if position.transition(PositionState::Cancelled, now).is_err() {
                continue;
            }

            match self.commit(position.clone()).await {
                Ok(()) => {
                    tracing::info!(id = %id, symbol = %symbol, "Pending confirmation expired");
                    cancelled.push(position);
                }
                Err(e) => {
                    tracing::error!(id = %id, "Failed to cancel expired confirmation: {}", e);
                }
            }
        }
        cancelled
    }

    /// Reload non-terminal positions after a restart.
    ///
    /// Open resumes as Monitoring, PendingConfirmation is kept for the reaper,
    /// and Proposed (submission outcome unknown) becomes Failed.
    pub async fn restore(&self) -> Result<Vec<Position>> {
        let loaded = self.store.load_non_terminal_positions().await?;
        let now = Utc::now();
        let mut restored = Vec::with_capacity(loaded.len());

        for mut position in loaded {
            match position.state {
                PositionState::Open => {
                    position.transition(PositionState::Monitoring, now)?;
                    self.commit(position.clone()).await?;
                }
                PositionState::Proposed => {
                    position.transition(PositionState::Failed, now)?;
                    self.commit(position.clone()).await?;
                    tracing::warn!(
                        id = %position.id,
                        symbol = %position.symbol,
                        "Proposed position found on restart, marked failed for review"
                    );
                }
                _ => {
                    self.positions
                        .write()
                        .await
                        .insert(position.id, position.clone());
                }
            }
            restored.push(position);
        }

        tracing::info!("Restored {} positions from persistence", restored.len());
        Ok(restored)
    }

    // ---- internals ----

    async fn submit_open(&self, position: Position) -> Result<Position> {
        let decision = Decision {
            action: DecisionAction::Open,
            position_id: position.id,
            symbol: position.symbol.clone(),
            side: position.side,
            size: position.quantity,
            reference_price: position.entry_price,
            stop_loss: position.stop_loss,
            take_profit: position.take_profit,
            rationale: position.rationale.clone(),
            idempotency_key: position.idempotency_key.clone(),
            issued_at: Utc::now(),
        };

        let fill = match self.broker.submit(&decision).await {
            Ok(fill) => fill,
            Err(e) => return Err(self.fail(position, e).await),
        };

        let now = Utc::now();
        let mut next = position;
        next.entry_price = fill.price;
        next.quantity = fill.quantity;
        next.mark_price = Some(fill.price);
        next.confirmation = None;
        next.transition(PositionState::Open, now)?;
        self.commit(next.clone()).await?;

        next.transition(PositionState::Monitoring, now)?;
        self.commit(next.clone()).await?;

        tracing::info!(
            id = %next.id,
            symbol = %next.symbol,
            side = ?next.side,
            "Position opened @ ${:.4} (stop ${:.4}, target ${:.4})",
            next.entry_price,
            next.stop_loss,
            next.take_profit
        );

        Ok(next)
    }

    /// Caller must hold the symbol lock
    async fn close_locked(
        &self,
        position: Position,
        price: f64,
        reason: CloseReason,
    ) -> Result<Position> {
        if !matches!(position.state, PositionState::Open | PositionState::Monitoring) {
            return Err(TradingError::InvalidTransition {
                id: position.id,
                from: position.state,
                to: PositionState::Closed,
            });
        }

        let decision = Decision {
            action: DecisionAction::Close,
            position_id: position.id,
            symbol: position.symbol.clone(),
            side: position.side,
            size: position.quantity,
            reference_price: price,
            stop_loss: position.stop_loss,
            take_profit: position.take_profit,
            rationale: format!("{:?}", reason),
            idempotency_key: format!("{}:close", position.id),
            issued_at: Utc::now(),
        };

        let fill = match self.broker.submit(&decision).await {
            Ok(fill) => fill,
            Err(e) => return Err(self.fail(position, e).await),
        };

        let mut next = position;
        next.close(fill.price, reason, Utc::now())?;
        self.commit(next.clone()).await?;

        tracing::info!(
            id = %next.id,
            symbol = %next.symbol,
            reason = ?reason,
            "Position closed @ ${:.4}, P&L ${:.2}",
            fill.price,
            next.realized_pnl.unwrap_or(0.0)
        );

        Ok(next)
    }

    /// Mark a position Failed after an execution error; returns the error
    async fn fail(&self, position: Position, error: TradingError) -> TradingError {
        tracing::error!(
            id = %position.id,
            symbol = %position.symbol,
            "Execution failed: {}",
            error
        );

        let mut next = position;
        if next.transition(PositionState::Failed, Utc::now()).is_ok() {
            if let Err(e) = self.commit(next).await {
                tracing::error!("Could not record failed position: {}", e);
            }
        }

        match error {
            TradingError::ExecutionFailure(_) => error,
            other => TradingError::ExecutionFailure(other.to_string()),
        }
    }

    /// Persist, then update the index
    async fn commit(&self, position: Position) -> Result<()> {
        self.persist_with_retry(&position).await?;

        let mut positions = self.positions.write().await;
        if position.state.is_terminal() {
            positions.remove(&position.id);
            drop(positions);

            let mut closed = self.recent_closed.write().await;
            closed.push_back(position);
            while closed.len() > self.config.recent_closed_limit {
                closed.pop_front();
            }
        } else {
            positions.insert(position.id, position);
        }
        Ok(())
    }

    async fn persist_with_retry(&self, position: &Position) -> Result<()> {
        let max_attempts = self.config.persist_max_attempts.max(1);
        let mut backoff_ms = self.config.persist_initial_backoff_ms;

        for attempt in 1..=max_attempts {
            match self.store.save_transition(position).await {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::info!(
                            "Persisted position {} after {} attempts",
                            position.id,
                            attempt
                        );
                    }
                    return Ok(());
                }
                Err(e) if attempt < max_attempts => {
                    tracing::warn!(
                        "Persist attempt {}/{} failed for {}: {}. Retrying in {}ms...",
                        attempt,
                        max_attempts,
                        position.id,
                        e,
                        backoff_ms
                    );
                    sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = backoff_ms.saturating_mul(2);
                }
                Err(e) => {
                    tracing::error!(
                        "Persist failed for {} after {} attempts: {}",
                        position.id,
                        max_attempts,
                        e
                    );
                    return Err(TradingError::PersistenceFailure(format!(
                        "position {} ({}): {}",
                        position.id,
                        position.state.as_str(),
                        e
                    )));
                }
            }
        }

        Err(TradingError::PersistenceFailure(format!(
            "position {}: no persist attempts made",
            position.id
        )))
    }
}
