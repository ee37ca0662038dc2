use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Global trading halt.
///
/// Once tripped, no new position may be committed until an explicit
/// `reset()`. Flattening open positions on trip is the engine's job.
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    state: RwLock<BreakerStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BreakerStatus {
    pub tripped: bool,
    pub reason: Option<String>,
    pub tripped_at: Option<DateTime<Utc>>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the breaker. Returns false if it was already tripped
    /// (the original reason is kept).
    pub fn trip(&self, reason: &str) -> bool {
        let mut state = match self.state.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if state.tripped {
            return false;
        }

        state.tripped = true;
        state.reason = Some(reason.to_string());
        state.tripped_at = Some(Utc::now());
        tracing::error!(reason, "Circuit breaker TRIPPED");
        true
    }

    /// Clear the breaker. Returns false if it was not tripped.
    pub fn reset(&self) -> bool {
        let mut state = match self.state.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !state.tripped {
            return false;
        }

        *state = BreakerStatus::default();
        tracing::warn!("Circuit breaker reset");
        true
    }

    /// Poisoned lock reads as tripped
    pub fn is_tripped(&self) -> bool {
        self.state.read().map(|s| s.tripped).unwrap_or(true)
    }

    pub fn status(&self) -> BreakerStatus {
        match self.state.read() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trip_and_reset() {
        let breaker = CircuitBreaker::new();
        assert!(!breaker.is_tripped());

        assert!(breaker.trip("manual"));
        assert!(breaker.is_tripped());
        assert_eq!(breaker.status().reason.as_deref(), Some("manual"));
        assert!(breaker.status().tripped_at.is_some());

        assert!(breaker.reset());
        assert!(!breaker.is_tripped());
        assert_eq!(breaker.status(), BreakerStatus::default());
    }

    #[test]
    fn test_second_trip_keeps_first_reason() {
        let breaker = CircuitBreaker::new();
        assert!(breaker.trip("drawdown"));
        assert!(!breaker.trip("manual"));
        assert_eq!(breaker.status().reason.as_deref(), Some("drawdown"));
    }

    #[test]
    fn test_reset_when_clear_is_noop() {
        let breaker = CircuitBreaker::new();
        assert!(!breaker.reset());
    }
}
