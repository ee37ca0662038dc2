use thiserror::Error;
use uuid::Uuid;

use crate::execution::PositionState;

/// Failure taxonomy for the decision pipeline and position lifecycle.
///
/// Local, recoverable failures (`DataUnavailable`, `InsufficientHistory`)
/// degrade to "no trade this tick" without alerting. Account-level and
/// execution failures are always surfaced.
#[derive(Debug, Error)]
pub enum TradingError {
    #[error("market data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("insufficient history for {symbol}: have {have} candles, need {need}")]
    InsufficientHistory {
        symbol: String,
        have: usize,
        need: usize,
    },

    #[error("risk limit breached: {0}")]
    RiskLimitBreached(String),

    #[error("confirmation expired for position {0}")]
    ConfirmationExpired(Uuid),

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("execution failure: {0}")]
    ExecutionFailure(String),

    #[error("symbol {0} already has an active position")]
    PositionExists(String),

    #[error("position not found: {0}")]
    PositionNotFound(Uuid),

    #[error("invalid transition for position {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        id: Uuid,
        from: PositionState,
        to: PositionState,
    },

    #[error("invalid confirmation token for position {0}")]
    InvalidConfirmationToken(Uuid),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("alert delivery failed: {0}")]
    Notification(String),
}

impl TradingError {
    pub fn data_unavailable(symbol: &str, reason: impl std::fmt::Display) -> Self {
        Self::DataUnavailable {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Errors that mean "skip this symbol for this tick" and never alert.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            Self::DataUnavailable { .. } | Self::InsufficientHistory { .. }
        )
    }

    /// Errors that must always reach the notification collaborator.
    pub fn requires_alert(&self) -> bool {
        matches!(
            self,
            Self::PersistenceFailure(_) | Self::ExecutionFailure(_) | Self::ConfirmationExpired(_)
        )
    }
}

impl From<sqlx::Error> for TradingError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceFailure(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for TradingError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::PersistenceFailure(err.to_string())
    }
}

impl From<redis::RedisError> for TradingError {
    fn from(err: redis::RedisError) -> Self {
        Self::PersistenceFailure(err.to_string())
    }
}

impl From<serde_json::Error> for TradingError {
    fn from(err: serde_json::Error) -> Self {
        Self::PersistenceFailure(format!("serialization: {}", err))
    }
}

impl From<::config::ConfigError> for TradingError {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TradingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_errors() {
        assert!(TradingError::data_unavailable("BTC", "timeout").is_silent());
        assert!(TradingError::InsufficientHistory {
            symbol: "BTC".to_string(),
            have: 3,
            need: 20
        }
        .is_silent());
        assert!(!TradingError::ExecutionFailure("rejected".to_string()).is_silent());
    }

    #[test]
    fn test_alerting_errors() {
        assert!(TradingError::PersistenceFailure("down".to_string()).requires_alert());
        assert!(TradingError::ExecutionFailure("rejected".to_string()).requires_alert());
        assert!(!TradingError::RiskLimitBreached("daily loss".to_string()).requires_alert());
    }

    #[test]
    fn test_error_messages() {
        let err = TradingError::data_unavailable("ETH", "feed offline");
        assert_eq!(
            err.to_string(),
            "market data unavailable for ETH: feed offline"
        );
    }
}
