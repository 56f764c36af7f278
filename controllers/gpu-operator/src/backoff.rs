//! # Fibonacci Backoff
//!
//! Provides a Fibonacci-based backoff mechanism for retrying failed
//! initialization passes, such as a platform lookup, node labeling or a
//! ClusterPolicy fetch. It grows more slowly than exponential backoff.
//!
//! Sequence: 1s, 1s, 2s, 3s, 5s, 8s, ... capped at 5 minutes. A policy
//! that initializes successfully drops its backoff and starts over.

/// Fibonacci backoff calculator
///
/// Each backoff is the sum of the previous two, capped at `max_seconds`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Previous backoff value in seconds
    prev_seconds: u64,
    /// Current backoff value in seconds
    current_seconds: u64,
    /// Maximum backoff value in seconds
    max_seconds: u64,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff with specified minimum and maximum values in seconds
    ///
    /// # Arguments
    ///
    /// * `min_seconds` - Minimum backoff duration (used for the first two values, typically 1)
    /// * `max_seconds` - Maximum backoff duration (caps the sequence, typically 300)
    #[must_use]
    pub fn new(min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            prev_seconds: 0,
            current_seconds: min_seconds,
            max_seconds,
        }
    }

    /// Get the next backoff duration in seconds and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result = self.current_seconds;

        let next = self.prev_seconds + self.current_seconds;
        self.prev_seconds = self.current_seconds;
        self.current_seconds = std::cmp::min(next, self.max_seconds);

        result
    }
}
