//! Per-namespace token bucket.

use std::time::{Duration, Instant};

/// Remaining permits for one namespace within one window.
///
/// A bucket is never shared directly; it lives inside the store's map and is
/// only touched while the map's shard lock for its namespace is held.
#[derive(Debug, Clone)]
pub struct Bucket {
    /// Permits left in this window
    remaining: u64,
    /// Store-unique id tying the bucket to the expiry entry armed for it
    generation: u64,
    /// When this window opened
    created_at: Instant,
}

impl Bucket {
    /// Create a full bucket for a fresh window.
    pub fn new(threshold: u64, generation: u64) -> Self {
        Self {
            remaining: threshold,
            generation,
            created_at: Instant::now(),
        }
    }

    /// Try to take a permit.
    ///
    /// Returns `Some(remaining)` after the decision when a permit is available,
    /// `None` when the bucket is empty. The count is only decremented when
    /// `consume` is set; an empty bucket is never mutated.
    pub fn take(&mut self, consume: bool) -> Option<u64> {
        if self.remaining == 0 {
            return None;
        }

        if consume {
            self.remaining -= 1;
        }

        Some(self.remaining)
    }

    /// Permits left in this window.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Time left until a window of `window` length, opened at creation, closes.
    pub fn time_until_reset(&self, window: Duration) -> Duration {
        window.saturating_sub(self.created_at.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_consumes_one_permit() {
        let mut bucket = Bucket::new(3, 1);

        assert_eq!(bucket.take(true), Some(2));
        assert_eq!(bucket.take(true), Some(1));
        assert_eq!(bucket.take(true), Some(0));
        assert_eq!(bucket.take(true), None);
        assert_eq!(bucket.remaining(), 0);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut bucket = Bucket::new(2, 1);

        assert_eq!(bucket.take(false), Some(2));
        assert_eq!(bucket.take(false), Some(2));
        assert_eq!(bucket.remaining(), 2);
    }

    #[test]
    fn test_empty_bucket_rejects_peek() {
        let mut bucket = Bucket::new(0, 7);

        assert_eq!(bucket.take(false), None);
        assert_eq!(bucket.take(true), None);
        assert_eq!(bucket.generation(), 7);
    }

    #[test]
    fn test_time_until_reset_is_bounded_by_window() {
        let bucket = Bucket::new(1, 1);
        let window = Duration::from_secs(10);

        let left = bucket.time_until_reset(window);
        assert!(left <= window);
        assert!(left > Duration::from_secs(9));

        assert_eq!(bucket.time_until_reset(Duration::ZERO), Duration::ZERO);
    }
}
