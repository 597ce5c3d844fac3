//! Per-phase timing for a single extraction.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};

/// Accumulates elapsed milliseconds per named phase.
#[derive(Debug, Default)]
pub struct ProfileCollector {
    phases: BTreeMap<String, Duration>,
}

impl ProfileCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a duration to a phase.
    pub fn record(&mut self, phase: &str, elapsed: Duration) {
        *self.phases.entry(phase.to_string()).or_default() += elapsed;
    }

    /// Time a synchronous block.
    pub fn track<T>(&mut self, phase: &str, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let value = f();
        self.record(phase, started.elapsed());
        value
    }

    /// Time a future.
    pub async fn track_async<T>(&mut self, phase: &str, fut: impl Future<Output = T>) -> T {
        let started = Instant::now();
        let value = fut.await;
        self.record(phase, started.elapsed());
        value
    }

    /// Timings in whole milliseconds.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.phases
            .iter()
            .map(|(phase, elapsed)| (phase.clone(), elapsed.as_millis() as u64))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates() {
        let mut profile = ProfileCollector::new();
        profile.record("heuristics_ms", Duration::from_millis(3));
        profile.record("heuristics_ms", Duration::from_millis(4));
        let value = profile.track("learning_ms", || 42);

        assert_eq!(value, 42);
        let snapshot = profile.snapshot();
        assert_eq!(snapshot["heuristics_ms"], 7);
        assert!(snapshot.contains_key("learning_ms"));
    }

    #[tokio::test]
    async fn test_track_async() {
        let mut profile = ProfileCollector::new();
        profile
            .track_async("llm_batch_ms", tokio::time::sleep(Duration::from_millis(5)))
            .await;
        assert!(profile.snapshot()["llm_batch_ms"] >= 5);
    }
}
