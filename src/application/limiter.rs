//! Sliding-window rate limiter.
//!
//! Each limiter name owns a sorted-set ledger in the store. Members are
//! unique hit tokens, scores are hit timestamps in milliseconds. A hit is
//! one non-transactional batch:
//!
//! ```text
//! ZADD             ledger now "{now}-{random}"
//! ZREMRANGEBYSCORE ledger 0 (now - window)
//! ZCARD            ledger
//! ```
//!
//! The hit is recorded before it is judged, so a rejected hit still occupies
//! the window. Batches from concurrent callers may interleave, which makes
//! the count approximate under heavy contention on one name; no transaction
//! is used.

use crate::application::command::{Batch, Command};
use crate::application::metrics::LimiterMetrics;
use crate::application::ports::{Clock, Store, StoreError};
use crate::domain::keys::KeySchema;
use crate::infrastructure::clock::SystemClock;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Error returned by [`SlidingWindowRateLimiter::hit`].
#[derive(Debug)]
pub enum RateLimitError {
    /// The window holds more hits than allowed, including this one
    Exceeded {
        name: String,
        count: u64,
        max_hits: u64,
    },
    /// Store communication failed
    Store(StoreError),
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::Exceeded {
                name,
                count,
                max_hits,
            } => write!(
                f,
                "rate limit exceeded for {}: {} hits in window, limit {}",
                name, count, max_hits
            ),
            RateLimitError::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

impl std::error::Error for RateLimitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RateLimitError::Store(e) => Some(e),
            RateLimitError::Exceeded { .. } => None,
        }
    }
}

impl From<StoreError> for RateLimitError {
    fn from(e: StoreError) -> Self {
        RateLimitError::Store(e)
    }
}

/// Error returned when building a limiter fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimiterConfigError {
    /// Window must be at least one millisecond
    ZeroWindow,
    /// Maximum hits must be greater than zero
    ZeroMaxHits,
}

impl fmt::Display for LimiterConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimiterConfigError::ZeroWindow => {
                write!(f, "window must be at least one millisecond")
            }
            LimiterConfigError::ZeroMaxHits => write!(f, "max_hits must be greater than 0"),
        }
    }
}

impl std::error::Error for LimiterConfigError {}

/// An accepted hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitOutcome {
    /// Hits in the window after this one was recorded
    pub count: u64,
    /// Further hits the window accepts right now
    pub remaining: u64,
}

/// Bounds the number of hits per name within a trailing window.
pub struct SlidingWindowRateLimiter<S> {
    store: S,
    keys: KeySchema,
    clock: Arc<dyn Clock>,
    window_ms: u64,
    max_hits: u64,
    metrics: LimiterMetrics,
}

impl<S: Clone> Clone for SlidingWindowRateLimiter<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            keys: self.keys.clone(),
            clock: Arc::clone(&self.clock),
            window_ms: self.window_ms,
            max_hits: self.max_hits,
            metrics: self.metrics.clone(),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for SlidingWindowRateLimiter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlidingWindowRateLimiter")
            .field("store", &self.store)
            .field("keys", &self.keys)
            .field("window_ms", &self.window_ms)
            .field("max_hits", &self.max_hits)
            .finish_non_exhaustive()
    }
}

impl SlidingWindowRateLimiter<()> {
    /// Create a builder for configuring a limiter.
    ///
    /// # Example
    /// ```
    /// use redisolar::{MemoryStore, SlidingWindowRateLimiter};
    /// use std::time::Duration;
    ///
    /// let limiter = SlidingWindowRateLimiter::builder()
    ///     .with_window(Duration::from_secs(1))
    ///     .with_max_hits(3)
    ///     .build(MemoryStore::new())
    ///     .unwrap();
    /// assert_eq!(limiter.max_hits(), 3);
    /// ```
    pub fn builder() -> SlidingWindowRateLimiterBuilder {
        SlidingWindowRateLimiterBuilder::default()
    }
}

impl<S: Store> SlidingWindowRateLimiter<S> {
    /// Create a limiter with the default key schema and system clock.
    ///
    /// # Errors
    /// Fails if `window` is shorter than a millisecond or `max_hits` is zero.
    pub fn new(store: S, window: Duration, max_hits: u64) -> Result<Self, LimiterConfigError> {
        SlidingWindowRateLimiterBuilder::default()
            .with_window(window)
            .with_max_hits(max_hits)
            .build(store)
    }

    /// Record a hit for `name` and check it against the limit.
    ///
    /// # Errors
    /// `Exceeded` if the window now holds more than `max_hits` hits. The hit
    /// is recorded either way.
    pub async fn hit(&self, name: &str) -> Result<HitOutcome, RateLimitError> {
        let key = self
            .keys
            .sliding_window_rate_limiter_key(name, self.window_ms, self.max_hits);
        let now = self.clock.now_millis();
        let token = format!("{}-{}", now, rand::thread_rng().gen_range(0..=self.max_hits));

        let batch = Batch::pipeline()
            .with(Command::SortedSetAdd {
                key: key.clone(),
                member: token,
                score: now as f64,
            })
            .with(Command::SortedSetRemoveRangeByScore {
                key: key.clone(),
                min: 0.0,
                max: now as f64 - self.window_ms as f64,
            })
            .with(Command::SortedSetCard { key });

        let count = match self.store.execute(batch).await?.pop() {
            Some(reply) => reply.into_count()?,
            None => {
                return Err(StoreError::ReplyCount {
                    expected: 3,
                    actual: 0,
                }
                .into())
            }
        };

        tracing::trace!(name, count, max_hits = self.max_hits, "hit recorded");

        if count > self.max_hits {
            self.metrics.record_rejected();
            return Err(RateLimitError::Exceeded {
                name: name.to_string(),
                count,
                max_hits: self.max_hits,
            });
        }

        self.metrics.record_accepted();
        Ok(HitOutcome {
            count,
            remaining: self.max_hits - count,
        })
    }

    /// Window length in milliseconds.
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    pub fn max_hits(&self) -> u64 {
        self.max_hits
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &LimiterMetrics {
        &self.metrics
    }

    /// Get a reference to the store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Builder for constructing a [`SlidingWindowRateLimiter`].
#[derive(Debug, Default)]
pub struct SlidingWindowRateLimiterBuilder {
    window: Duration,
    max_hits: u64,
    clock: Option<Arc<dyn Clock>>,
    keys: Option<KeySchema>,
}

impl SlidingWindowRateLimiterBuilder {
    /// Set the trailing window. Sub-millisecond precision is truncated.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the number of hits allowed within one window.
    pub fn with_max_hits(mut self, max_hits: u64) -> Self {
        self.max_hits = max_hits;
        self
    }

    /// Set a custom clock (useful for testing or for a shared time source).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set a custom key schema.
    pub fn with_key_schema(mut self, keys: KeySchema) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Build the limiter over `store`.
    ///
    /// # Errors
    /// Returns `LimiterConfigError` if the window or the hit limit is zero.
    pub fn build<S: Store>(self, store: S) -> Result<SlidingWindowRateLimiter<S>, LimiterConfigError> {
        let window_ms = u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX);
        if window_ms == 0 {
            return Err(LimiterConfigError::ZeroWindow);
        }
        if self.max_hits == 0 {
            return Err(LimiterConfigError::ZeroMaxHits);
        }

        Ok(SlidingWindowRateLimiter {
            store,
            keys: self.keys.unwrap_or_default(),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock::new())),
            window_ms,
            max_hits: self.max_hits,
            metrics: LimiterMetrics::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory_store::MemoryStore;
    use crate::infrastructure::mocks::{MockClock, RecordingStore};

    fn limiter(
        window_ms: u64,
        max_hits: u64,
    ) -> (
        SlidingWindowRateLimiter<RecordingStore<Arc<MemoryStore>>>,
        MockClock,
        RecordingStore<Arc<MemoryStore>>,
    ) {
        let clock = MockClock::new(0);
        let store = RecordingStore::new(Arc::new(MemoryStore::new()));
        let limiter = SlidingWindowRateLimiter::builder()
            .with_window(Duration::from_millis(window_ms))
            .with_max_hits(max_hits)
            .with_clock(Arc::new(clock.clone()))
            .with_key_schema(KeySchema::new("test"))
            .build(store.clone())
            .unwrap();
        (limiter, clock, store)
    }

    #[tokio::test]
    async fn test_hits_within_limit_succeed() {
        let (limiter, clock, _) = limiter(1000, 3);

        for expected in 1..=3 {
            let outcome = limiter.hit("api").await.unwrap();
            assert_eq!(outcome.count, expected);
            assert_eq!(outcome.remaining, 3 - expected);
            clock.advance(Duration::from_millis(100));
        }
    }

    #[tokio::test]
    async fn test_hit_over_limit_fails_and_window_recovers() {
        let (limiter, clock, _) = limiter(1000, 3);

        for t in [0, 100, 200] {
            clock.set(t);
            limiter.hit("api").await.unwrap();
        }

        clock.set(300);
        assert!(matches!(
            limiter.hit("api").await,
            Err(RateLimitError::Exceeded {
                count: 4,
                max_hits: 3,
                ..
            })
        ));

        clock.set(1300);
        // Hits at 0..=300 have aged out
        assert_eq!(limiter.hit("api").await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_rejected_hit_is_recorded() {
        let (limiter, clock, _) = limiter(1000, 1);

        limiter.hit("api").await.unwrap();
        clock.advance(Duration::from_millis(10));
        assert!(limiter.hit("api").await.is_err());
        clock.advance(Duration::from_millis(10));
        assert!(matches!(
            limiter.hit("api").await,
            Err(RateLimitError::Exceeded { count: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_names_are_independent() {
        let (limiter, clock, _) = limiter(1000, 2);

        for _ in 0..3 {
            let _ = limiter.hit("a").await;
            clock.advance(Duration::from_millis(1));
        }
        assert!(limiter.hit("a").await.is_err());
        assert_eq!(limiter.hit("b").await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_hit_is_one_batch_of_three_commands() {
        let (limiter, clock, store) = limiter(1000, 3);
        clock.set(5000);
        limiter.hit("api").await.unwrap();

        let batches = store.batches();
        assert_eq!(batches.len(), 1);
        assert!(!batches[0].is_transactional());

        let commands = batches[0].commands();
        assert!(matches!(
            &commands[0],
            Command::SortedSetAdd { key, score, member }
                if key == "test:limiter:api:1000:3" && *score == 5000.0 && member.starts_with("5000-")
        ));
        assert!(matches!(
            &commands[1],
            Command::SortedSetRemoveRangeByScore { min, max, .. } if *min == 0.0 && *max == 4000.0
        ));
        assert!(matches!(&commands[2], Command::SortedSetCard { .. }));
    }

    #[tokio::test]
    async fn test_window_boundary_is_trimmed() {
        let (limiter, clock, _) = limiter(1000, 1);

        clock.set(0);
        limiter.hit("api").await.unwrap();
        // A hit exactly one window old falls in [0, now - window]
        clock.set(1000);
        assert_eq!(limiter.hit("api").await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_metrics_track_decisions() {
        let (limiter, clock, _) = limiter(1000, 1);

        limiter.hit("api").await.unwrap();
        clock.advance(Duration::from_millis(1));
        let _ = limiter.hit("api").await;

        let snapshot = limiter.metrics().snapshot();
        assert_eq!(snapshot.hits_accepted, 1);
        assert_eq!(snapshot.hits_rejected, 1);
    }

    #[test]
    fn test_builder_rejects_zero_window() {
        let result = SlidingWindowRateLimiter::builder()
            .with_max_hits(1)
            .with_window(Duration::from_micros(500))
            .build(MemoryStore::new());
        assert!(matches!(result, Err(LimiterConfigError::ZeroWindow)));
    }

    #[test]
    fn test_builder_rejects_zero_max_hits() {
        let result = SlidingWindowRateLimiter::new(MemoryStore::new(), Duration::from_secs(1), 0);
        assert!(matches!(result, Err(LimiterConfigError::ZeroMaxHits)));
    }

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            LimiterConfigError::ZeroMaxHits.to_string(),
            "max_hits must be greater than 0"
        );
    }
}
