use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::PersistenceStore;
use crate::execution::{Position, PositionState};
use crate::{Result, TradingError};

/// In-process store for paper trading and tests.
///
/// Keeps the latest version of every position plus an append-only
/// transition log. `fail_next` injects write failures.
#[derive(Debug, Default)]
pub struct MemoryStore {
    positions: RwLock<HashMap<Uuid, Position>>,
    transitions: RwLock<Vec<(Uuid, PositionState)>>,
    failures_remaining: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` writes fail with `PersistenceFailure`
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Every recorded (position, state) pair, in write order
    pub async fn transition_log(&self) -> Vec<(Uuid, PositionState)> {
        self.transitions.read().await.clone()
    }

    pub async fn all_positions(&self) -> Vec<Position> {
        self.positions.read().await.values().cloned().collect()
    }

    fn take_failure(&self) -> bool {
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    async fn save_transition(&self, position: &Position) -> Result<()> {
        if self.take_failure() {
            return Err(TradingError::PersistenceFailure(
                "injected write failure".to_string(),
            ));
        }

        let mut positions = self.positions.write().await;
        let mut transitions = self.transitions.write().await;
        positions.insert(position.id, position.clone());
        transitions.push((position.id, position.state));
        Ok(())
    }

    async fn load_non_terminal_positions(&self) -> Result<Vec<Position>> {
        let mut positions: Vec<Position> = self
            .positions
            .read()
            .await
            .values()
            .filter(|p| !p.state.is_terminal())
            .cloned()
            .collect();
        positions.sort_by_key(|p| p.created_at);
        Ok(positions)
    }

    async fn load_position(&self, id: Uuid) -> Result<Option<Position>> {
        Ok(self.positions.read().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use chrono::Utc;

    fn position() -> Position {
        Position::proposed(
            "BTC",
            Side::Long,
            100.0,
            1.0,
            95.0,
            112.5,
            "k".to_string(),
            "r".to_string(),
        )
    }

    #[test]
    fn test_roundtrip_and_archive() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            let mut p = position();
            store.save_transition(&p).await.unwrap();

            assert_eq!(store.load_position(p.id).await.unwrap(), Some(p.clone()));
            assert_eq!(store.load_non_terminal_positions().await.unwrap().len(), 1);

            p.transition(PositionState::Failed, Utc::now()).unwrap();
            store.save_transition(&p).await.unwrap();

            // Archived, still loadable, no longer non-terminal
            assert!(store.load_non_terminal_positions().await.unwrap().is_empty());
            assert_eq!(
                store.load_position(p.id).await.unwrap().map(|p| p.state),
                Some(PositionState::Failed)
            );
            assert_eq!(store.transition_log().await.len(), 2);
        });
    }

    #[test]
    fn test_injected_failures() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            store.fail_next(1);

            assert!(store.save_transition(&position()).await.is_err());
            assert!(store.save_transition(&position()).await.is_ok());
        });
    }
}
