//! Clock adapters for time operations.
//!
//! - [`SystemClock`]: Unix-epoch milliseconds that advance monotonically.
//!   The epoch offset is read once per process, after which readings follow
//!   `Instant`, so wall-clock adjustments during a run cannot move time
//!   backwards. Readings from a restarted process continue where the old
//!   one left off, which keeps ledgers written by earlier runs trimmable.
//! - [`UnixClock`]: plain wall-clock milliseconds since the Unix epoch,
//!   following every adjustment.
//!
//! # Testing
//!
//! See `MockClock` (in `crate::infrastructure::mocks`) for a controllable test clock.
//! Available with the `test-helpers` feature or in test builds:
//!
//! ```toml
//! [dev-dependencies]
//! redisolar = { version = "*", features = ["test-helpers"] }
//! ```

use crate::application::ports::Clock;
use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Pairs a monotonic instant with the wall-clock time it was taken at.
struct Anchor {
    instant: Instant,
    unix_millis: u64,
}

fn anchor() -> &'static Anchor {
    static ANCHOR: OnceLock<Anchor> = OnceLock::new();
    ANCHOR.get_or_init(|| Anchor {
        instant: Instant::now(),
        unix_millis: unix_millis(),
    })
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

/// Monotonic clock on the Unix-epoch scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        let anchor = anchor();
        let elapsed = u64::try_from(anchor.instant.elapsed().as_millis()).unwrap_or(u64::MAX);
        anchor.unix_millis.saturating_add(elapsed)
    }
}

/// Wall clock in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixClock;

impl UnixClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for UnixClock {
    fn now_millis(&self) -> u64 {
        unix_millis()
    }
}
