//! Capped exponential backoff for arbiter retries.

use std::time::Duration;

/// Yields the delays between successive retries, doubling up to a cap.
#[derive(Debug, Clone)]
pub struct Backoff {
    remaining: u32,
    next: Duration,
    max: Duration,
}

impl Backoff {
    /// Backoff allowing `attempts` retries, starting at `initial`.
    pub fn new(attempts: u32, initial: Duration, max: Duration) -> Self {
        Self {
            remaining: attempts,
            next: initial.min(max),
            max,
        }
    }

    /// Delay before the next retry, or `None` once retries are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        Some(delay)
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        self.next_delay()
    }
}
