use redisolar::infrastructure::mocks::MockClock;
use redisolar::{
    Coordinate, GeoQuery, GeoUnit, MemoryStore, Site, SiteGeoRepository, SlidingWindowRateLimiter,
};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// Layer that keeps the level and message of every event.
#[derive(Clone, Default)]
struct CaptureLayer {
    captured: Arc<Mutex<Vec<(Level, String)>>>,
}

impl CaptureLayer {
    fn messages_at(&self, level: Level) -> Vec<String> {
        self.captured
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.captured
            .lock()
            .unwrap()
            .push((*event.metadata().level(), visitor.0));
    }
}

#[tokio::test]
async fn test_core_paths_emit_trace_events() {
    let capture = CaptureLayer::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let store = Arc::new(MemoryStore::new());
    let sites = SiteGeoRepository::new(Arc::clone(&store));
    let oakland = Coordinate::new(37.8044, -122.2712);
    sites
        .insert(&Site::new(1).with_coordinate(oakland))
        .await
        .unwrap();
    sites
        .find_by_geo(&GeoQuery::new(oakland, 1.0, GeoUnit::Kilometers))
        .await
        .unwrap();

    let limiter = SlidingWindowRateLimiter::builder()
        .with_window(Duration::from_secs(1))
        .with_max_hits(1)
        .with_clock(Arc::new(MockClock::new(0)))
        .build(store)
        .unwrap();
    limiter.hit("api").await.unwrap();

    let traces = capture.messages_at(Level::TRACE);
    assert!(traces.iter().any(|m| m == "executing batch in memory"));
    assert!(traces.iter().any(|m| m == "geo radius resolved"));
    assert!(traces.iter().any(|m| m == "hit recorded"));
}

#[tokio::test]
async fn test_rejected_hit_is_not_logged_as_error() {
    let capture = CaptureLayer::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let clock = MockClock::new(0);
    let limiter = SlidingWindowRateLimiter::builder()
        .with_window(Duration::from_secs(1))
        .with_max_hits(1)
        .with_clock(Arc::new(clock.clone()))
        .build(MemoryStore::new())
        .unwrap();
    limiter.hit("api").await.unwrap();
    clock.advance(Duration::from_millis(1));
    assert!(limiter.hit("api").await.is_err());

    assert!(capture.messages_at(Level::ERROR).is_empty());
    assert!(capture.messages_at(Level::WARN).is_empty());
}
