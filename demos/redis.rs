//! Example running the site repository and rate limiter against Redis.
//!
//! # Quick Start
//!
//! 1. Start Redis:
//!    ```bash
//!    docker run -p 6379:6379 redis:7-alpine
//!    ```
//!
//! 2. Run the example (from project root):
//!    ```bash
//!    cargo run --example redis --features redis-store
//!    ```
//!
//! Connection settings are read from `REDISOLAR_REDIS_HOST`,
//! `REDISOLAR_REDIS_PORT`, `REDISOLAR_REDIS_USERNAME` and
//! `REDISOLAR_REDIS_PASSWORD`.
//!
//! # Testing Distributed Rate Limiting
//!
//! Run several instances at the same time: they share one ledger, so the
//! limit applies across all of them. The limiter uses the wall clock here
//! so that timestamps from different processes are comparable.

use redisolar::{
    Coordinate, GeoQuery, GeoUnit, KeySchema, RateLimitError, RedisStore, RedisStoreConfig, Site,
    SiteGeoRepository, SlidingWindowRateLimiter, UnixClock,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RedisStoreConfig::from_env();
    info!(url = %config.url(), "connecting to Redis");

    let store = match RedisStore::connect_with_config(config).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "failed to connect to Redis");
            eprintln!("\nMake sure Redis is running:");
            eprintln!("  docker run -p 6379:6379 redis:7-alpine");
            std::process::exit(1);
        }
    };

    let keys = KeySchema::new("redisolar-demo");
    let sites = SiteGeoRepository::with_key_schema(store.clone(), keys.clone());

    let site = Site::new(1)
        .with_capacity(4.5)
        .with_panels(12)
        .with_address("1 Solar Way", "Oakland", "CA", "94612")
        .with_coordinate(Coordinate::new(37.8044, -122.2712));
    if let Err(e) = sites.insert(&site).await {
        error!(error = %e, "insert failed");
        std::process::exit(1);
    }

    let query = GeoQuery::new(Coordinate::new(37.80, -122.27), 5.0, GeoUnit::Kilometers);
    match sites.find_by_geo(&query).await {
        Ok(found) => info!(count = found.len(), "sites near Oakland"),
        Err(e) => error!(error = %e, "geo query failed"),
    }

    let limiter = match SlidingWindowRateLimiter::builder()
        .with_window(Duration::from_secs(10))
        .with_max_hits(5)
        .with_clock(Arc::new(UnixClock::new()))
        .with_key_schema(keys)
        .build(store)
    {
        Ok(limiter) => limiter,
        Err(e) => {
            error!(error = %e, "invalid limiter configuration");
            std::process::exit(1);
        }
    };

    for attempt in 1..=10 {
        match limiter.hit("demo").await {
            Ok(outcome) => info!(attempt, remaining = outcome.remaining, "hit allowed"),
            Err(RateLimitError::Exceeded { count, .. }) => {
                warn!(attempt, count, "hit rejected")
            }
            Err(e) => error!(attempt, error = %e, "limiter unavailable"),
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}
