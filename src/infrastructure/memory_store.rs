//! In-memory store.
//!
//! Implements the [`Store`] port over a sharded concurrent map so that the
//! repository and limiter can run without a live Redis. Semantics follow
//! Redis where the core depends on them:
//!
//! - absent hashes read as empty, absent members score as `None`
//! - sorted sets that become empty are deleted
//! - a geo index is a sorted set scored by a 52-bit geohash, so `ZRANGE`
//!   and `ZCARD` work on it
//! - radius queries use the haversine distance with Redis' earth radius and
//!   include the boundary
//! - commands against a key of another type fail with `WrongType`
//!
//! Non-transactional batches apply command by command, so commands from
//! concurrent batches interleave. Transactional batches hold an exclusive
//! gate for their whole duration and roll back on the first error.

use crate::application::command::{Batch, Command, Reply};
use crate::application::ports::{Store, StoreError};
use crate::domain::schema::Fields;
use crate::domain::site::Coordinate;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

/// Earth radius used by Redis geo commands, in meters.
const EARTH_RADIUS_METERS: f64 = 6_372_797.560_856;

const GEO_LAT_MIN: f64 = -85.051_128_78;
const GEO_LAT_MAX: f64 = 85.051_128_78;
const GEO_LNG_MIN: f64 = -180.0;
const GEO_LNG_MAX: f64 = 180.0;
const GEO_STEP_BITS: u32 = 26;

#[derive(Debug, Clone)]
enum Value {
    Hash(Fields),
    SortedSet(SortedSet),
}

#[derive(Debug, Clone, Copy)]
struct Member {
    score: f64,
    /// Set for members added through GEOADD
    position: Option<Coordinate>,
}

#[derive(Debug, Clone, Default)]
struct SortedSet {
    members: HashMap<String, Member>,
}

impl SortedSet {
    /// Insert or update a member. Returns true if the member is new.
    fn insert(&mut self, member: String, score: f64, position: Option<Coordinate>) -> bool {
        self.members
            .insert(member, Member { score, position })
            .is_none()
    }

    fn remove_range_by_score(&mut self, min: f64, max: f64) -> u64 {
        let before = self.members.len();
        self.members
            .retain(|_, member| !(min <= member.score && member.score <= max));
        (before - self.members.len()) as u64
    }

    /// Members ordered by score, ties broken by member name.
    fn ordered(&self) -> Vec<&String> {
        let mut entries: Vec<(&String, f64)> = self
            .members
            .iter()
            .map(|(name, member)| (name, member.score))
            .collect();
        entries.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        entries.into_iter().map(|(name, _)| name).collect()
    }

    fn range(&self, start: i64, stop: i64) -> Vec<String> {
        let len = self.members.len() as i64;
        let start = (if start < 0 { start + len } else { start }).max(0);
        let stop = (if stop < 0 { stop + len } else { stop }).min(len - 1);

        if start > stop || start >= len {
            return Vec::new();
        }

        self.ordered()
            .into_iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect()
    }

    /// Positioned members within `radius_meters` of `center`, nearest first.
    fn within(&self, center: Coordinate, radius_meters: f64) -> Vec<String> {
        let mut hits: Vec<(&String, f64)> = self
            .members
            .iter()
            .filter_map(|(name, member)| {
                let distance = distance_meters(center, member.position?);
                (distance <= radius_meters).then_some((name, distance))
            })
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        hits.into_iter().map(|(name, _)| name.clone()).collect()
    }
}

/// Great-circle distance in meters.
pub(crate) fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let u = ((lat2 - lat1) / 2.0).sin();
    let v = ((b.lng - a.lng).to_radians() / 2.0).sin();
    2.0 * EARTH_RADIUS_METERS * (u * u + lat1.cos() * lat2.cos() * v * v).sqrt().asin()
}

/// Interleaved geohash used as the sorted-set score of a geo member.
fn geohash_score(coordinate: Coordinate) -> f64 {
    let cells = 1u64 << GEO_STEP_BITS;
    let scale = cells as f64;
    let lat = (((coordinate.lat - GEO_LAT_MIN) / (GEO_LAT_MAX - GEO_LAT_MIN) * scale) as u64)
        .min(cells - 1);
    let lng = (((coordinate.lng - GEO_LNG_MIN) / (GEO_LNG_MAX - GEO_LNG_MIN) * scale) as u64)
        .min(cells - 1);

    let mut hash = 0u64;
    for bit in 0..GEO_STEP_BITS {
        hash |= ((lat >> bit) & 1) << (2 * bit);
        hash |= ((lng >> bit) & 1) << (2 * bit + 1);
    }
    hash as f64
}

fn validate_position(coordinate: Coordinate) -> Result<(), StoreError> {
    let valid = (GEO_LAT_MIN..=GEO_LAT_MAX).contains(&coordinate.lat)
        && (GEO_LNG_MIN..=GEO_LNG_MAX).contains(&coordinate.lng);
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidArgument {
            command: "GEOADD",
            reason: format!(
                "invalid longitude,latitude pair {},{}",
                coordinate.lng, coordinate.lat
            ),
        })
    }
}

/// Thread-safe in-memory implementation of the [`Store`] port.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: DashMap<String, Value, ahash::RandomState>,
    /// Shared by single commands, held exclusively by transactions
    gate: RwLock<()>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check if a key exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Delete every key.
    pub fn clear(&self) {
        let _gate = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        self.data.clear();
    }

    fn apply(&self, command: Command) -> Result<Reply, StoreError> {
        match command {
            Command::HashSet { key, fields } => {
                let mut entry = self
                    .data
                    .entry(key.clone())
                    .or_insert_with(|| Value::Hash(Fields::new()));
                match entry.value_mut() {
                    Value::Hash(hash) => {
                        let mut added = 0;
                        for (field, value) in fields {
                            if hash.insert(field, value).is_none() {
                                added += 1;
                            }
                        }
                        Ok(Reply::Count(added))
                    }
                    _ => Err(StoreError::WrongType { key }),
                }
            }
            Command::HashGetAll { key } => match self.data.get(&key).as_deref() {
                None => Ok(Reply::Fields(Fields::new())),
                Some(Value::Hash(hash)) => Ok(Reply::Fields(hash.clone())),
                Some(_) => Err(StoreError::WrongType { key }),
            },
            Command::GeoAdd {
                key,
                coordinate,
                member,
            } => {
                validate_position(coordinate)?;
                self.with_sorted_set(key, |set| {
                    let added = set.insert(member, geohash_score(coordinate), Some(coordinate));
                    Reply::Count(u64::from(added))
                })
            }
            Command::GeoRadius {
                key,
                center,
                radius,
                unit,
            } => self.read_sorted_set(key, Reply::Members(Vec::new()), |set| {
                Reply::Members(set.within(center, radius * unit.meters()))
            }),
            Command::SortedSetAdd { key, member, score } => self.with_sorted_set(key, |set| {
                Reply::Count(u64::from(set.insert(member, score, None)))
            }),
            Command::SortedSetRemoveRangeByScore { key, min, max } => {
                let removed = match self.data.get_mut(&key).as_deref_mut() {
                    None => 0,
                    Some(Value::SortedSet(set)) => set.remove_range_by_score(min, max),
                    Some(_) => return Err(StoreError::WrongType { key }),
                };
                self.data.remove_if(&key, |_, value| {
                    matches!(value, Value::SortedSet(set) if set.members.is_empty())
                });
                Ok(Reply::Count(removed))
            }
            Command::SortedSetCard { key } => self.read_sorted_set(key, Reply::Count(0), |set| {
                Reply::Count(set.members.len() as u64)
            }),
            Command::SortedSetScore { key, member } => {
                self.read_sorted_set(key, Reply::Score(None), |set| {
                    Reply::Score(set.members.get(&member).map(|m| m.score))
                })
            }
            Command::SortedSetRange { key, start, stop } => {
                self.read_sorted_set(key, Reply::Members(Vec::new()), |set| {
                    Reply::Members(set.range(start, stop))
                })
            }
        }
    }

    /// Mutate the sorted set at `key`, creating it if absent.
    fn with_sorted_set(
        &self,
        key: String,
        f: impl FnOnce(&mut SortedSet) -> Reply,
    ) -> Result<Reply, StoreError> {
        let mut entry = self
            .data
            .entry(key.clone())
            .or_insert_with(|| Value::SortedSet(SortedSet::default()));
        match entry.value_mut() {
            Value::SortedSet(set) => Ok(f(set)),
            _ => Err(StoreError::WrongType { key }),
        }
    }

    /// Read the sorted set at `key`, answering `absent` if there is none.
    fn read_sorted_set(
        &self,
        key: String,
        absent: Reply,
        f: impl FnOnce(&SortedSet) -> Reply,
    ) -> Result<Reply, StoreError> {
        match self.data.get(&key).as_deref() {
            None => Ok(absent),
            Some(Value::SortedSet(set)) => Ok(f(set)),
            Some(_) => Err(StoreError::WrongType { key }),
        }
    }

    fn execute_transaction(&self, commands: Vec<Command>) -> Result<Vec<Reply>, StoreError> {
        let _gate = self.gate.write().unwrap_or_else(PoisonError::into_inner);

        let keys: BTreeSet<String> = commands.iter().map(|c| c.key().to_string()).collect();
        let snapshot: Vec<(String, Option<Value>)> = keys
            .into_iter()
            .map(|key| {
                let value = self.data.get(&key).map(|v| v.value().clone());
                (key, value)
            })
            .collect();

        let result = commands
            .into_iter()
            .map(|command| self.apply(command))
            .collect::<Result<Vec<_>, _>>();

        if result.is_err() {
            for (key, value) in snapshot {
                match value {
                    Some(value) => {
                        self.data.insert(key, value);
                    }
                    None => {
                        self.data.remove(&key);
                    }
                }
            }
        }

        result
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn execute(&self, batch: Batch) -> Result<Vec<Reply>, StoreError> {
        tracing::trace!(
            commands = batch.len(),
            transactional = batch.is_transactional(),
            "executing batch in memory"
        );

        if batch.is_transactional() {
            return self.execute_transaction(batch.into_commands());
        }

        batch
            .into_commands()
            .into_iter()
            .map(|command| {
                let _gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
                self.apply(command)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::site::GeoUnit;
    use std::sync::Arc;

    fn zadd(key: &str, member: &str, score: f64) -> Command {
        Command::SortedSetAdd {
            key: key.into(),
            member: member.into(),
            score,
        }
    }

    fn geoadd(member: &str, lat: f64, lng: f64) -> Command {
        Command::GeoAdd {
            key: "geo".into(),
            coordinate: Coordinate::new(lat, lng),
            member: member.into(),
        }
    }

    #[tokio::test]
    async fn test_hash_set_and_get() {
        let store = MemoryStore::new();
        let fields = Fields::from([("a".to_string(), "1".to_string())]);

        let added = store
            .query(Command::HashSet {
                key: "h".into(),
                fields: fields.clone(),
            })
            .await
            .unwrap();
        assert_eq!(added, Reply::Count(1));

        let read = store
            .query(Command::HashGetAll { key: "h".into() })
            .await
            .unwrap();
        assert_eq!(read.into_fields().unwrap(), fields);
    }

    #[tokio::test]
    async fn test_absent_values() {
        let store = MemoryStore::new();

        let hash = store.query(Command::HashGetAll { key: "x".into() }).await;
        assert!(hash.unwrap().into_fields().unwrap().is_empty());

        let score = store
            .query(Command::SortedSetScore {
                key: "z".into(),
                member: "m".into(),
            })
            .await;
        assert_eq!(score.unwrap(), Reply::Score(None));

        let card = store.query(Command::SortedSetCard { key: "z".into() }).await;
        assert_eq!(card.unwrap(), Reply::Count(0));
    }

    #[tokio::test]
    async fn test_score_zero_is_distinct_from_absent() {
        let store = MemoryStore::new();
        store.query(zadd("z", "m", 0.0)).await.unwrap();

        let score = store
            .query(Command::SortedSetScore {
                key: "z".into(),
                member: "m".into(),
            })
            .await
            .unwrap();
        assert_eq!(score, Reply::Score(Some(0.0)));
    }

    #[tokio::test]
    async fn test_remove_range_is_inclusive_and_deletes_empty_sets() {
        let store = MemoryStore::new();
        for (member, score) in [("a", 1.0), ("b", 2.0), ("c", 3.0)] {
            store.query(zadd("z", member, score)).await.unwrap();
        }

        let removed = store
            .query(Command::SortedSetRemoveRangeByScore {
                key: "z".into(),
                min: 1.0,
                max: 2.0,
            })
            .await
            .unwrap();
        assert_eq!(removed, Reply::Count(2));

        store
            .query(Command::SortedSetRemoveRangeByScore {
                key: "z".into(),
                min: 0.0,
                max: 3.0,
            })
            .await
            .unwrap();
        assert!(!store.contains_key("z"));
    }

    #[tokio::test]
    async fn test_range_orders_by_score() {
        let store = MemoryStore::new();
        for (member, score) in [("c", 3.0), ("a", 1.0), ("b", 2.0)] {
            store.query(zadd("z", member, score)).await.unwrap();
        }

        let all = store
            .query(Command::SortedSetRange {
                key: "z".into(),
                start: 0,
                stop: -1,
            })
            .await
            .unwrap();
        assert_eq!(all.into_members().unwrap(), vec!["a", "b", "c"]);

        let tail = store
            .query(Command::SortedSetRange {
                key: "z".into(),
                start: -2,
                stop: 10,
            })
            .await
            .unwrap();
        assert_eq!(tail.into_members().unwrap(), vec!["b", "c"]);

        let empty = store
            .query(Command::SortedSetRange {
                key: "z".into(),
                start: 5,
                stop: -1,
            })
            .await
            .unwrap();
        assert!(empty.into_members().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_geo_radius() {
        let store = MemoryStore::new();
        store.query(geoadd("oakland", 37.80, -122.27)).await.unwrap();
        store.query(geoadd("berkeley", 37.87, -122.27)).await.unwrap();
        store.query(geoadd("la", 34.05, -118.24)).await.unwrap();

        let near = store
            .query(Command::GeoRadius {
                key: "geo".into(),
                center: Coordinate::new(37.80, -122.27),
                radius: 20.0,
                unit: GeoUnit::Kilometers,
            })
            .await
            .unwrap();
        assert_eq!(near.into_members().unwrap(), vec!["oakland", "berkeley"]);
    }

    #[tokio::test]
    async fn test_geo_radius_includes_boundary() {
        let store = MemoryStore::new();
        store.query(geoadd("here", 10.0, 10.0)).await.unwrap();

        let exact = store
            .query(Command::GeoRadius {
                key: "geo".into(),
                center: Coordinate::new(10.0, 10.0),
                radius: 0.0,
                unit: GeoUnit::Meters,
            })
            .await
            .unwrap();
        assert_eq!(exact.into_members().unwrap(), vec!["here"]);
    }

    #[tokio::test]
    async fn test_geo_index_is_a_sorted_set() {
        let store = MemoryStore::new();
        store.query(geoadd("1", 37.80, -122.27)).await.unwrap();
        store.query(geoadd("1", 37.80, -122.27)).await.unwrap();
        store.query(geoadd("2", 34.05, -118.24)).await.unwrap();

        let card = store.query(Command::SortedSetCard { key: "geo".into() }).await;
        assert_eq!(card.unwrap(), Reply::Count(2));
    }

    #[tokio::test]
    async fn test_geo_add_rejects_invalid_position() {
        let store = MemoryStore::new();
        let result = store.query(geoadd("pole", 89.9, 0.0)).await;
        assert!(matches!(
            result,
            Err(StoreError::InvalidArgument {
                command: "GEOADD",
                ..
            })
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let store = MemoryStore::new();
        store.query(zadd("k", "m", 1.0)).await.unwrap();

        let result = store.query(Command::HashGetAll { key: "k".into() }).await;
        assert!(matches!(result, Err(StoreError::WrongType { key }) if key == "k"));
    }

    #[tokio::test]
    async fn test_batch_replies_in_order() {
        let store = MemoryStore::new();
        let batch = Batch::pipeline()
            .with(zadd("z", "a", 1.0))
            .with(zadd("z", "b", 2.0))
            .with(Command::SortedSetCard { key: "z".into() });

        let replies = store.execute(batch).await.unwrap();
        assert_eq!(
            replies,
            vec![Reply::Count(1), Reply::Count(1), Reply::Count(2)]
        );
    }

    #[tokio::test]
    async fn test_pipeline_keeps_commands_applied_before_error() {
        let store = MemoryStore::new();
        store.query(zadd("k", "m", 1.0)).await.unwrap();

        let batch = Batch::pipeline()
            .with(zadd("z", "a", 1.0))
            .with(Command::HashGetAll { key: "k".into() });
        assert!(store.execute(batch).await.is_err());
        assert!(store.contains_key("z"));
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_on_error() {
        let store = MemoryStore::new();
        store.query(zadd("k", "m", 1.0)).await.unwrap();

        let batch = Batch::transaction()
            .with(zadd("z", "a", 1.0))
            .with(zadd("k", "n", 2.0))
            .with(Command::HashGetAll { key: "k".into() });
        assert!(store.execute(batch).await.is_err());

        assert!(!store.contains_key("z"));
        let card = store.query(Command::SortedSetCard { key: "k".into() }).await;
        assert_eq!(card.unwrap(), Reply::Count(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_batches() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = vec![];

        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for j in 0..50 {
                    let member = format!("{}-{}", i, j);
                    store.query(zadd("z", &member, j as f64)).await.unwrap();
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        let card = store.query(Command::SortedSetCard { key: "z".into() }).await;
        assert_eq!(card.unwrap(), Reply::Count(400));
    }

    #[test]
    fn test_distance() {
        // One degree of latitude is roughly 111.2 km
        let d = distance_meters(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 0.0));
        assert!((d - 111_226.0).abs() < 100.0);
    }
}
