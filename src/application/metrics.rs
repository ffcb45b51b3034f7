//! Decision counters for a sliding-window limiter.
//!
//! A limiter bumps exactly one counter per `hit` whose batch reached the
//! store: `hits_accepted` when the observed window count was within
//! `max_hits`, `hits_rejected` when it was above. Hits that failed with a
//! store error bump neither.
//!
//! Counters cover this process only. When several processes share a ledger,
//! the window count in the store is the source of truth.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Accepted and rejected hit counts of one limiter.
///
/// Clones of a limiter, and clones of this handle, share the same counters.
#[derive(Debug, Clone)]
pub struct LimiterMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    /// `hit` returned `Ok(HitOutcome)`
    hits_accepted: AtomicU64,
    /// `hit` returned `Err(RateLimitError::Exceeded)`; the hit stayed in the ledger
    hits_rejected: AtomicU64,
}

impl LimiterMetrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                hits_accepted: AtomicU64::new(0),
                hits_rejected: AtomicU64::new(0),
            }),
        }
    }

    pub(crate) fn record_accepted(&self) {
        self.inner.hits_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.inner.hits_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Hits this process let through.
    pub fn hits_accepted(&self) -> u64 {
        self.inner.hits_accepted.load(Ordering::Relaxed)
    }

    /// Hits this process turned away. Each one still occupies the window
    /// until it ages out.
    pub fn hits_rejected(&self) -> u64 {
        self.inner.hits_rejected.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits_accepted: self.hits_accepted(),
            hits_rejected: self.hits_rejected(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        self.inner.hits_accepted.store(0, Ordering::Relaxed);
        self.inner.hits_rejected.store(0, Ordering::Relaxed);
    }
}

impl Default for LimiterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter values read at one moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub hits_accepted: u64,
    pub hits_rejected: u64,
}

impl MetricsSnapshot {
    /// Share of judged hits that were rejected, from 0.0 to 1.0.
    ///
    /// A limiter under sustained overload approaches 1.0, because rejected
    /// hits keep the window full. Returns 0.0 if no hits have been judged.
    pub fn rejection_rate(&self) -> f64 {
        let total = self.total_hits();
        if total == 0 {
            0.0
        } else {
            self.hits_rejected as f64 / total as f64
        }
    }

    /// Hits judged against the limit, excluding those lost to store errors.
    pub fn total_hits(&self) -> u64 {
        self.hits_accepted.saturating_add(self.hits_rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initial_state() {
        let metrics = LimiterMetrics::new();
        assert_eq!(metrics.hits_accepted(), 0);
        assert_eq!(metrics.hits_rejected(), 0);
    }

    #[test]
    fn test_snapshot_rejection_rate() {
        let metrics = LimiterMetrics::new();
        assert_eq!(metrics.snapshot().rejection_rate(), 0.0);

        metrics.record_accepted();
        metrics.record_accepted();
        metrics.record_accepted();
        metrics.record_rejected();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_hits(), 4);
        assert!((snapshot.rejection_rate() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reset() {
        let metrics = LimiterMetrics::new();
        metrics.record_accepted();
        metrics.record_rejected();

        metrics.reset();
        assert_eq!(metrics.snapshot().total_hits(), 0);
    }

    #[test]
    fn test_concurrent_updates() {
        use std::thread;

        let metrics = LimiterMetrics::new();
        let mut handles = vec![];

        for _ in 0..10 {
            let m = metrics.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    m.record_accepted();
                    m.record_rejected();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.hits_accepted(), 1000);
        assert_eq!(metrics.hits_rejected(), 1000);
    }
}
