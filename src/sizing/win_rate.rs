use std::collections::VecDeque;
use std::sync::RwLock;

/// Rolling window of realized trade outcomes.
///
/// Shared between the position sizer (writes, probability blend) and the
/// ensemble (losing-streak penalty). A trade with pnl > 0 is a win.
#[derive(Debug)]
pub struct WinRateTracker {
    capacity: usize,
    outcomes: RwLock<VecDeque<f64>>,
}

impl WinRateTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            outcomes: RwLock::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    pub fn record(&self, pnl: f64) {
        if !pnl.is_finite() {
            tracing::warn!("Ignoring non-finite trade outcome");
            return;
        }
        if let Ok(mut outcomes) = self.outcomes.write() {
            if outcomes.len() == self.capacity {
                outcomes.pop_front();
            }
            outcomes.push_back(pnl);
        }
    }

    pub fn len(&self) -> usize {
        self.outcomes.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fraction of winning trades in the window, None when empty
    pub fn win_rate(&self) -> Option<f64> {
        let outcomes = self.outcomes.read().ok()?;
        if outcomes.is_empty() {
            return None;
        }
        let wins = outcomes.iter().filter(|pnl| **pnl > 0.0).count();
        Some(wins as f64 / outcomes.len() as f64)
    }

    /// Length of the trailing run of non-winning trades
    pub fn consecutive_losses(&self) -> usize {
        self.outcomes
            .read()
            .map(|o| o.iter().rev().take_while(|pnl| **pnl <= 0.0).count())
            .unwrap_or(0)
    }
}

impl Default for WinRateTracker {
    fn default() -> Self {
        Self::new(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tracker() {
        let tracker = WinRateTracker::default();
        assert!(tracker.is_empty());
        assert_eq!(tracker.win_rate(), None);
        assert_eq!(tracker.consecutive_losses(), 0);
    }

    #[test]
    fn test_win_rate_and_streak() {
        let tracker = WinRateTracker::default();
        for pnl in [10.0, -5.0, 20.0, -1.0, 0.0] {
            tracker.record(pnl);
        }

        assert_eq!(tracker.len(), 5);
        assert_eq!(tracker.win_rate(), Some(0.4));
        assert_eq!(tracker.consecutive_losses(), 2);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let tracker = WinRateTracker::new(3);
        for pnl in [-1.0, -1.0, 5.0, 5.0, 5.0] {
            tracker.record(pnl);
        }

        assert_eq!(tracker.len(), 3);
        assert_eq!(tracker.win_rate(), Some(1.0));
    }

    #[test]
    fn test_non_finite_outcome_ignored() {
        let tracker = WinRateTracker::default();
        tracker.record(f64::NAN);
        assert!(tracker.is_empty());
    }
}
