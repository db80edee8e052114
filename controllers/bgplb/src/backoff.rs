//! # Fibonacci Backoff
//!
//! Retry delays for failed Service reconciliations. The sequence grows more
//! slowly than exponential backoff, so a conflicting write or a brief API
//! outage is retried quickly while a persistent failure settles at the cap.
//!
//! Default sequence: 1s, 1s, 2s, 3s, 5s, 8s, 13s, 21s, 34s, 55s, 60s (max).

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, capped at `max_seconds`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Minimum backoff in seconds (for reset)
    min_seconds: u64,
    /// Previous backoff in seconds
    prev_seconds: u64,
    /// Current backoff in seconds
    current_seconds: u64,
    /// Maximum backoff in seconds
    max_seconds: u64,
}

impl FibonacciBackoff {
    /// Create a backoff starting at `min_seconds` and capped at `max_seconds`
    ///
    /// # Arguments
    ///
    /// * `min_seconds` - First two delays (typically 1)
    /// * `max_seconds` - Cap for the sequence (typically 60)
    #[must_use]
    pub fn new(min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            min_seconds,
            prev_seconds: 0,
            current_seconds: min_seconds.min(max_seconds),
            max_seconds,
        }
    }

    /// Get the next delay in seconds and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result = self.current_seconds;

        let next = self.prev_seconds.saturating_add(self.current_seconds);
        self.prev_seconds = self.current_seconds;
        self.current_seconds = next.min(self.max_seconds);

        result
    }

    /// Get the next delay as a `Duration` and advance the sequence
    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev_seconds = 0;
        self.current_seconds = self.min_seconds.min(self.max_seconds);
    }
}
