//! Single-flight gate: one pipeline run per cache key at a time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

type Gates = Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>;

/// Per-key async mutexes, created on demand and dropped with the last holder.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    gates: Gates,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other request holds `key`, then hold it.
    pub async fn acquire(&self, key: &str) -> InFlightGuard {
        let gate = {
            let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
            gates
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        let guard = gate.lock_owned().await;
        InFlightGuard {
            key: key.to_string(),
            gates: self.gates.clone(),
            guard: Some(guard),
        }
    }

    /// Number of keys with a holder or waiter.
    pub fn len(&self) -> usize {
        self.gates.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Holds a key until dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    key: String,
    gates: Gates,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        // Release first so the strong count reflects only waiters
        self.guard.take();
        if let Some(gate) = gates.get(&self.key) {
            // Map entry is the only remaining reference: nobody is waiting
            if Arc::strong_count(gate) == 1 {
                gates.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_serializes() {
        let inflight = InFlight::new();
        let guard = inflight.acquire("k").await;

        let waiter = {
            let inflight = inflight.clone();
            tokio::spawn(async move {
                let _guard = inflight.acquire("k").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
        assert!(inflight.is_empty());
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let inflight = InFlight::new();
        let _a = inflight.acquire("a").await;
        let _b = tokio::time::timeout(Duration::from_millis(100), inflight.acquire("b"))
            .await
            .unwrap();
        assert_eq!(inflight.len(), 2);
    }
}
