//! Example demonstrating the site repository and the rate limiter.
//!
//! Runs entirely in memory: no Redis needed.
//!
//! ```bash
//! RUST_LOG=redisolar=debug cargo run --example sites
//! ```

use redisolar::{
    Command, Coordinate, GeoQuery, GeoUnit, KeySchema, MemoryStore, RateLimitError, Site,
    SiteGeoRepository, SlidingWindowRateLimiter, Store,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Site Repository Example ===\n");

    let store = Arc::new(MemoryStore::new());
    let keys = KeySchema::default();
    let sites = SiteGeoRepository::with_key_schema(Arc::clone(&store), keys.clone());

    let catalog = [
        ("Oakland", 37.8044, -122.2712, 4.5, 0.35),
        ("Berkeley", 37.8716, -122.2727, 3.0, 0.05),
        ("Alameda", 37.7652, -122.2416, 6.0, 0.6),
        ("Los Angeles", 34.0522, -118.2437, 10.0, 0.9),
    ];

    for (id, (city, lat, lng, capacity, score)) in catalog.iter().enumerate() {
        let id = id as u64 + 1;
        let site = Site::new(id)
            .with_capacity(*capacity)
            .with_panels(12)
            .with_address(format!("{} Solar Way", id), *city, "CA", "94000")
            .with_coordinate(Coordinate::new(*lat, *lng));
        sites.insert(&site).await?;

        // Capacity scores are maintained by the reporting pipeline
        store
            .query(Command::SortedSetAdd {
                key: keys.capacity_ranking_key(),
                member: id.to_string(),
                score: *score,
            })
            .await?;
    }
    info!(count = catalog.len(), "sites loaded");

    let oakland = Coordinate::new(37.8044, -122.2712);
    let query = GeoQuery::new(oakland, 15.0, GeoUnit::Kilometers);

    println!("Sites within 15 km of Oakland:");
    for site in sites.find_by_geo(&query).await? {
        println!("  #{} {} ({} kW)", site.id, site.city, site.capacity);
    }

    println!("\nSites within 15 km of Oakland with excess capacity:");
    for site in sites.find_by_geo(&query.with_excess_capacity()).await? {
        println!("  #{} {} ({} kW)", site.id, site.city, site.capacity);
    }

    println!("\nAll sites: {}", sites.find_all().await?.len());

    println!("\n=== Sliding Window Rate Limiter ===\n");
    println!("Window: 1s, max hits: 3\n");

    let limiter = SlidingWindowRateLimiter::builder()
        .with_window(Duration::from_secs(1))
        .with_max_hits(3)
        .with_key_schema(keys)
        .build(Arc::clone(&store))?;

    for attempt in 1..=5 {
        match limiter.hit("site-report").await {
            Ok(outcome) => println!(
                "  attempt {}: allowed ({} remaining)",
                attempt, outcome.remaining
            ),
            Err(RateLimitError::Exceeded { count, .. }) => {
                warn!(attempt, count, "rate limited");
                println!("  attempt {}: rejected ({} hits in window)", attempt, count);
            }
            Err(e) => return Err(e.into()),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    println!("\nWaiting for the window to pass...");
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let outcome = limiter.hit("site-report").await?;
    println!("  after wait: allowed ({} in window)", outcome.count);

    let snapshot = limiter.metrics().snapshot();
    println!(
        "\nMetrics: {} accepted, {} rejected ({:.0}% rejected)",
        snapshot.hits_accepted,
        snapshot.hits_rejected,
        snapshot.rejection_rate() * 100.0
    );

    Ok(())
}
