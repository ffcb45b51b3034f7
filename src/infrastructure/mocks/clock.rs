//! Mock clock for testing.

use crate::application::ports::Clock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Mock clock for testing.
///
/// Allows tests to control time progression explicitly, enabling deterministic
/// testing of the sliding-window limiter.
///
/// # Examples
///
/// ```
/// use redisolar::infrastructure::mocks::MockClock;
/// use redisolar::application::ports::Clock;
/// use std::time::Duration;
///
/// let clock = MockClock::new(0);
/// assert_eq!(clock.now_millis(), 0);
///
/// // Advance time explicitly
/// clock.advance(Duration::from_millis(250));
/// assert_eq!(clock.now_millis(), 250);
///
/// // Or set to a specific reading
/// clock.set(1300);
/// assert_eq!(clock.now_millis(), 1300);
/// ```
///
/// # Thread Safety
///
/// All clones share the same underlying time value, so advancing time in
/// one clone affects all clones.
#[derive(Debug, Clone)]
pub struct MockClock {
    current_millis: Arc<AtomicU64>,
}

impl MockClock {
    /// Create a mock clock starting at `start_millis`.
    pub fn new(start_millis: u64) -> Self {
        Self {
            current_millis: Arc::new(AtomicU64::new(start_millis)),
        }
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.current_millis.fetch_add(millis, Ordering::SeqCst);
    }

    /// Set the clock to a specific reading.
    pub fn set(&self, millis: u64) {
        self.current_millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_millis(&self) -> u64 {
        self.current_millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock() {
        let clock = MockClock::new(100);
        assert_eq!(clock.now_millis(), 100);

        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now_millis(), 1100);

        clock.set(5);
        assert_eq!(clock.now_millis(), 5);
    }

    #[test]
    fn test_clones_share_time() {
        let clock = MockClock::new(0);
        let other = clock.clone();

        let handle = std::thread::spawn(move || other.advance(Duration::from_millis(5)));
        handle.join().unwrap();

        assert_eq!(clock.now_millis(), 5);
    }
}
