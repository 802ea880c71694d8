//! Wall-clock source, injectable so replay-window checks can be tested
//! at exact millisecond boundaries.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// Delegates to `chrono::Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Time only moves when [`set`](MockClock::set) or
/// [`advance`](MockClock::advance) is called.
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    current: Arc<AtomicI64>,
}

impl MockClock {
    pub fn at(ms: i64) -> Self {
        Self {
            current: Arc::new(AtomicI64::new(ms)),
        }
    }

    pub fn set(&self, ms: i64) {
        self.current.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.current.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> i64 {
        self.current.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }

    #[test]
    fn test_mock_clock_only_moves_when_told() {
        let clock = MockClock::at(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        clock.advance(500);
        assert_eq!(clock.now_ms(), 1_500);
        clock.set(42);
        assert_eq!(clock.now_ms(), 42);
    }
}
