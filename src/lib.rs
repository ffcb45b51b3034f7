//! # redisolar
//!
//! Data-access layer for a solar-site monitoring service, backed by Redis.
//!
//! Sites are stored as one hash per site plus an entry in a geo index, and
//! can be looked up by id, by radius around a point, or all at once. A
//! sliding-window rate limiter bounds how often a named operation may run.
//!
//! Everything talks to the store through the [`Store`] port. Commands are
//! grouped into a [`Batch`] and sent in one round trip, either as a plain
//! pipeline or as a `MULTI`/`EXEC` transaction. Two adapters ship with the
//! crate:
//! - [`MemoryStore`]: in-process store with Redis semantics, for tests and demos
//! - `RedisStore`: the real thing (requires the `redis-store` feature)
//!
//! ## Quick Start
//!
//! ```rust
//! use redisolar::{Coordinate, GeoQuery, GeoUnit, MemoryStore, Site, SiteGeoRepository};
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let sites = SiteGeoRepository::new(MemoryStore::new());
//!
//! let oakland = Coordinate::new(37.8044, -122.2712);
//! sites
//!     .insert(&Site::new(1).with_capacity(4.5).with_coordinate(oakland))
//!     .await
//!     .unwrap();
//!
//! let nearby = sites
//!     .find_by_geo(&GeoQuery::new(oakland, 10.0, GeoUnit::Kilometers))
//!     .await
//!     .unwrap();
//! assert_eq!(nearby.len(), 1);
//! # });
//! ```
//!
//! ## Rate Limiting
//!
//! ```rust
//! use redisolar::{MemoryStore, RateLimitError, SlidingWindowRateLimiter};
//! use std::time::Duration;
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let limiter = SlidingWindowRateLimiter::builder()
//!     .with_window(Duration::from_secs(60))
//!     .with_max_hits(2)
//!     .build(MemoryStore::new())
//!     .unwrap();
//!
//! assert!(limiter.hit("reports").await.is_ok());
//! assert!(limiter.hit("reports").await.is_ok());
//! assert!(matches!(
//!     limiter.hit("reports").await,
//!     Err(RateLimitError::Exceeded { .. })
//! ));
//! # });
//! ```
//!
//! ## Key Layout
//!
//! All keys live under one prefix (default `ru102py-test`), configurable
//! through [`KeySchema`]. See [`domain::keys`] for the full layout.
//!
//! ## Observability
//!
//! The crate emits `tracing` events; install any subscriber to see them.
//! Every store batch, radius query and limiter hit is traced at `TRACE`;
//! the Redis adapter adds connection events at `DEBUG` and `WARN`.
//! Repositories and limiters return errors without logging them. Limiters
//! also count their decisions in [`LimiterMetrics`].

// Domain layer - pure data types
pub mod domain;

// Application layer - repositories and limiters
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    keys::{KeySchema, DEFAULT_KEY_PREFIX},
    schema::{DecodeError, Fields},
    site::{Coordinate, GeoQuery, GeoUnit, MetricUnit, Site},
};

pub use application::{
    command::{Batch, BatchMode, Command, Reply},
    limiter::{
        HitOutcome, LimiterConfigError, RateLimitError, SlidingWindowRateLimiter,
        SlidingWindowRateLimiterBuilder,
    },
    metrics::{LimiterMetrics, MetricsSnapshot},
    ports::{Clock, Store, StoreError},
    site_geo::{SiteError, SiteGeoRepository, CAPACITY_THRESHOLD},
};

pub use infrastructure::{
    clock::{SystemClock, UnixClock},
    memory_store::MemoryStore,
};

#[cfg(feature = "redis-store")]
pub use infrastructure::redis_store::{RedisStore, RedisStoreConfig};
