//! # Fibonacci Backoff
//!
//! Progressive retry intervals for failing resources.
//!
//! The sequence is `min, min, 2*min, 3*min, 5*min, ...` capped at `max`. Each
//! resource keeps its own state so one broken object never slows down the
//! others.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Fibonacci backoff in seconds
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_secs: u64,
    max_secs: u64,
    previous: u64,
    current: u64,
}

impl FibonacciBackoff {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        let min_secs = min_secs.max(1);
        Self {
            min_secs,
            max_secs: max_secs.max(min_secs),
            previous: 0,
            current: min_secs,
        }
    }

    /// Return the current interval and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let value = self.current.min(self.max_secs);
        if self.current < self.max_secs {
            let next = self.previous.saturating_add(self.current);
            self.previous = self.current;
            self.current = next;
        }
        value
    }

    pub fn reset(&mut self) {
        self.previous = 0;
        self.current = self.min_secs;
    }

    /// Interval for the `error_count`-th consecutive error (0-indexed)
    pub fn calculate_for_error_count(error_count: u32, min_secs: u64, max_secs: u64) -> Duration {
        let mut backoff = Self::new(min_secs, max_secs);
        let mut secs = backoff.next_backoff_seconds();
        for _ in 0..error_count {
            secs = backoff.next_backoff_seconds();
        }
        Duration::from_secs(secs)
    }
}

/// Backoff state of one resource
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
    pub last_error: Option<Instant>,
}

impl BackoffState {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
            last_error: None,
        }
    }

    pub fn increment_error(&mut self, now: Instant) {
        self.error_count = self.error_count.saturating_add(1);
        self.last_error = Some(now);
    }
}

/// Per-resource backoff keyed by `namespace/name`
#[derive(Debug)]
pub struct BackoffRegistry {
    min_secs: u64,
    max_secs: u64,
    states: Mutex<HashMap<String, BackoffState>>,
}

impl BackoffRegistry {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs,
            max_secs,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Record an error for `key`; returns the delay and the consecutive error count
    ///
    /// `None` when the state lock is poisoned.
    pub fn record_error(&self, key: &str) -> Option<(Duration, u32)> {
        self.record_error_at(key, Instant::now())
    }

    /// Entries idle for longer than this belong to objects that stopped
    /// failing without a successful pass, usually because they were deleted.
    /// A resource still failing is retried at least once per `max_secs`.
    fn idle_window(&self) -> Duration {
        Duration::from_secs(self.max_secs.max(self.min_secs).saturating_mul(2))
    }

    fn record_error_at(&self, key: &str, now: Instant) -> Option<(Duration, u32)> {
        let idle = self.idle_window();
        let mut states = self.states.lock().ok()?;
        states.retain(|_, state| {
            state
                .last_error
                .is_some_and(|at| now.saturating_duration_since(at) <= idle)
        });
        let state = states
            .entry(key.to_string())
            .or_insert_with(|| BackoffState::new(self.min_secs, self.max_secs));
        state.increment_error(now);
        let secs = state.backoff.next_backoff_seconds();
        Some((Duration::from_secs(secs), state.error_count))
    }

    /// Forget the error history of `key` after a successful pass
    pub fn reset(&self, key: &str) {
        if let Ok(mut states) = self.states.lock() {
            states.remove(key);
        }
    }

    /// Number of resources with an error history
    pub fn tracked_resources(&self) -> usize {
        self.states.lock().map(|states| states.len()).unwrap_or(0)
    }

    pub fn error_count(&self, key: &str) -> u32 {
        self.states
            .lock()
            .ok()
            .and_then(|states| states.get(key).map(|s| s.error_count))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fibonacci_sequence() {
        let mut backoff = FibonacciBackoff::new(1, 100);
        let seq: Vec<u64> = (0..7).map(|_| backoff.next_backoff_seconds()).collect();
        assert_eq!(seq, vec![1, 1, 2, 3, 5, 8, 13]);
    }

    #[test]
    fn test_capped_at_max() {
        let mut backoff = FibonacciBackoff::new(1, 4);
        let seq: Vec<u64> = (0..7).map(|_| backoff.next_backoff_seconds()).collect();
        assert_eq!(seq, vec![1, 1, 2, 3, 4, 4, 4]);
    }

    #[test]
    fn test_reset() {
        let mut backoff = FibonacciBackoff::new(2, 60);
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.reset();
        assert_eq!(backoff.next_backoff_seconds(), 2);
    }

    #[test]
    fn test_calculate_for_error_count() {
        assert_eq!(
            FibonacciBackoff::calculate_for_error_count(0, 1, 300),
            Duration::from_secs(1)
        );
        assert_eq!(
            FibonacciBackoff::calculate_for_error_count(4, 1, 300),
            Duration::from_secs(5)
        );
        assert_eq!(
            FibonacciBackoff::calculate_for_error_count(40, 1, 300),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_registry_tracks_resources_independently() {
        let registry = BackoffRegistry::new(1, 300);
        registry.record_error("default/a");
        registry.record_error("default/a");
        let (delay, count) = registry.record_error("default/a").unwrap();
        assert_eq!(delay, Duration::from_secs(2));
        assert_eq!(count, 3);

        let (delay, count) = registry.record_error("default/b").unwrap();
        assert_eq!(delay, Duration::from_secs(1));
        assert_eq!(count, 1);

        registry.reset("default/a");
        assert_eq!(registry.error_count("default/a"), 0);
        assert_eq!(registry.error_count("default/b"), 1);
    }

    #[test]
    fn test_idle_entries_are_pruned() {
        let registry = BackoffRegistry::new(1, 10);
        let start = Instant::now();
        registry.record_error_at("default/gone", start);
        registry.record_error_at("default/flaky", start + Duration::from_secs(15));

        registry.record_error_at("default/flaky", start + Duration::from_secs(21));

        assert_eq!(registry.error_count("default/gone"), 0);
        assert_eq!(registry.error_count("default/flaky"), 2);
        assert_eq!(registry.tracked_resources(), 1);
    }
}
