use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

/// One async mutex per symbol; lifecycle mutations for a symbol are serialized.
#[derive(Debug, Default)]
pub struct SymbolLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SymbolLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `symbol`; released when the guard drops
    pub async fn acquire(&self, symbol: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = match self.locks.lock() {
                Ok(locks) => locks,
                Err(poisoned) => poisoned.into_inner(),
            };
            locks
                .entry(symbol.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Every symbol that has ever been locked
    pub fn symbols(&self) -> Vec<String> {
        let locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_symbol_is_exclusive() {
        let locks = SymbolLocks::new();
        let guard = locks.acquire("BTC").await;

        let second = tokio::time::timeout(Duration::from_millis(50), locks.acquire("BTC")).await;
        assert!(second.is_err(), "second acquire should block");

        drop(guard);
        let third = tokio::time::timeout(Duration::from_millis(50), locks.acquire("BTC")).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn test_symbols_lists_every_locked_symbol() {
        let locks = SymbolLocks::new();
        drop(locks.acquire("BTC").await);
        let _eth = locks.acquire("ETH").await;

        let mut symbols = locks.symbols();
        symbols.sort();
        assert_eq!(symbols, vec!["BTC".to_string(), "ETH".to_string()]);
    }

    #[tokio::test]
    async fn test_different_symbols_do_not_block() {
        let locks = SymbolLocks::new();
        let _btc = locks.acquire("BTC").await;

        let eth = tokio::time::timeout(Duration::from_millis(50), locks.acquire("ETH")).await;
        assert!(eth.is_ok());
    }
}
