use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Side;
use crate::{Result, TradingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    Proposed,
    PendingConfirmation,
    Open,
    Monitoring,
    Closed,
    Cancelled,
    Failed,
}

impl PositionState {
    /// States that occupy the symbol's single position slot
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PositionState::PendingConfirmation | PositionState::Open | PositionState::Monitoring
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PositionState::Closed | PositionState::Cancelled | PositionState::Failed
        )
    }

    pub fn can_transition_to(&self, next: PositionState) -> bool {
        use PositionState::*;
        matches!(
            (self, next),
            (Proposed, Open)
                | (Proposed, PendingConfirmation)
                | (Proposed, Failed)
                | (PendingConfirmation, Open)
                | (PendingConfirmation, Cancelled)
                | (PendingConfirmation, Failed)
                | (Open, Monitoring)
                | (Open, Closed)
                | (Open, Failed)
                | (Monitoring, Closed)
                | (Monitoring, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PositionState::Proposed => "proposed",
            PositionState::PendingConfirmation => "pending_confirmation",
            PositionState::Open => "open",
            PositionState::Monitoring => "monitoring",
            PositionState::Closed => "closed",
            PositionState::Cancelled => "cancelled",
            PositionState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
    Manual,
    EmergencyFlatten,
}

/// Operator confirmation required before a live order is submitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub token: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub quantity: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub state: PositionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub opened_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub exit_price: Option<f64>,
    pub realized_pnl: Option<f64>,
    pub close_reason: Option<CloseReason>,
    /// Last observed price, used as a fallback when flattening
    pub mark_price: Option<f64>,
    pub idempotency_key: String,
    pub rationale: String,
    pub confirmation: Option<PendingConfirmation>,
}

impl Position {
    #[allow(clippy::too_many_arguments)]
    pub fn proposed(
        symbol: &str,
        side: Side,
        entry_price: f64,
        quantity: f64,
        stop_loss: f64,
        take_profit: f64,
        idempotency_key: String,
        rationale: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            entry_price,
            quantity,
            stop_loss,
            take_profit,
            state: PositionState::Proposed,
            created_at: now,
            updated_at: now,
            opened_at: None,
            closed_at: None,
            exit_price: None,
            realized_pnl: None,
            close_reason: None,
            mark_price: None,
            idempotency_key,
            rationale,
            confirmation: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn notional(&self) -> f64 {
        self.entry_price * self.quantity
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.side.pnl_per_unit(self.entry_price, price) * self.quantity
    }

    /// Move to `next`, rejecting transitions the state machine does not allow
    pub fn transition(&mut self, next: PositionState, now: DateTime<Utc>) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(TradingError::InvalidTransition {
                id: self.id,
                from: self.state,
                to: next,
            });
        }

        self.state = next;
        self.updated_at = now;
        match next {
            PositionState::Open => self.opened_at = Some(now),
            PositionState::Closed | PositionState::Cancelled | PositionState::Failed => {
                self.closed_at = Some(now);
                self.confirmation = None;
            }
            _ => {}
        }
        Ok(())
    }

    /// Record the exit and move to Closed
    pub fn close(&mut self, exit_price: f64, reason: CloseReason, now: DateTime<Utc>) -> Result<()> {
        self.transition(PositionState::Closed, now)?;
        self.exit_price = Some(exit_price);
        self.realized_pnl = Some(self.unrealized_pnl(exit_price));
        self.close_reason = Some(reason);
        self.mark_price = Some(exit_price);
        Ok(())
    }

    /// Ratchet the stop toward price once the trade is in profit.
    ///
    /// Long: `entry + trail_fraction * (price - entry)`, only ever raised.
    /// Short: `entry - trail_fraction * (entry - price)`, only ever lowered.
    /// Returns true if the stop moved.
    pub fn update_trailing_stop(&mut self, price: f64, trail_fraction: f64) -> bool {
        if !price.is_finite() {
            return false;
        }

        match self.side {
            Side::Long if price > self.entry_price => {
                let candidate = self.entry_price + trail_fraction * (price - self.entry_price);
                if candidate > self.stop_loss {
                    self.stop_loss = candidate;
                    return true;
                }
            }
            Side::Short if price < self.entry_price => {
                let candidate = self.entry_price - trail_fraction * (self.entry_price - price);
                if candidate < self.stop_loss {
                    self.stop_loss = candidate;
                    return true;
                }
            }
            _ => {}
        }
        false
    }

    /// Stop-loss or take-profit hit at `price`
    pub fn exit_trigger(&self, price: f64) -> Option<CloseReason> {
        match self.side {
            Side::Long if price <= self.stop_loss => Some(CloseReason::StopLoss),
            Side::Long if price >= self.take_profit => Some(CloseReason::TakeProfit),
            Side::Short if price >= self.stop_loss => Some(CloseReason::StopLoss),
            Side::Short if price <= self.take_profit => Some(CloseReason::TakeProfit),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_position() -> Position {
        Position::proposed(
            "BTC",
            Side::Long,
            100.0,
            2.0,
            95.0,
            112.5,
            "key".to_string(),
            "test".to_string(),
        )
    }

    #[test]
    fn test_active_and_terminal_states() {
        assert!(PositionState::Monitoring.is_active());
        assert!(PositionState::PendingConfirmation.is_active());
        assert!(!PositionState::Proposed.is_active());
        assert!(PositionState::Cancelled.is_terminal());
        assert!(!PositionState::Open.is_terminal());
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut position = long_position();
        let err = position
            .transition(PositionState::Monitoring, Utc::now())
            .unwrap_err();
        assert!(matches!(err, TradingError::InvalidTransition { .. }));
        assert_eq!(position.state, PositionState::Proposed);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut position = long_position();
        position.transition(PositionState::Failed, Utc::now()).unwrap();
        assert!(position.transition(PositionState::Open, Utc::now()).is_err());
        assert!(position.closed_at.is_some());
    }

    #[test]
    fn test_close_records_pnl() {
        let mut position = long_position();
        let now = Utc::now();
        position.transition(PositionState::Open, now).unwrap();
        position.transition(PositionState::Monitoring, now).unwrap();
        position.close(110.0, CloseReason::Manual, now).unwrap();

        assert_eq!(position.state, PositionState::Closed);
        assert_eq!(position.realized_pnl, Some(20.0));
        assert_eq!(position.close_reason, Some(CloseReason::Manual));
    }

    #[test]
    fn test_trailing_stop_long_only_rises() {
        let mut position = long_position();

        assert!(!position.update_trailing_stop(98.0, 0.5)); // under water
        assert!(position.update_trailing_stop(110.0, 0.5));
        assert_eq!(position.stop_loss, 105.0);

        assert!(!position.update_trailing_stop(104.0, 0.5)); // pullback
        assert_eq!(position.stop_loss, 105.0);
    }

    #[test]
    fn test_trailing_stop_short_only_falls() {
        let mut position = long_position();
        position.side = Side::Short;
        position.stop_loss = 105.0;
        position.take_profit = 87.5;

        assert!(position.update_trailing_stop(90.0, 0.5));
        assert_eq!(position.stop_loss, 95.0);
        assert!(!position.update_trailing_stop(96.0, 0.5));
        assert_eq!(position.stop_loss, 95.0);
    }

    #[test]
    fn test_exit_triggers() {
        let position = long_position();
        assert_eq!(position.exit_trigger(94.0), Some(CloseReason::StopLoss));
        assert_eq!(position.exit_trigger(113.0), Some(CloseReason::TakeProfit));
        assert_eq!(position.exit_trigger(100.0), None);
    }

    #[test]
    fn test_json_roundtrip_is_identical() {
        let position = long_position();
        let json = serde_json::to_string(&position).unwrap();
        let restored: Position = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, position);
    }
}
