//! Geo-indexed site repository.
//!
//! Sites live in two places: a hash record per site and one entry in the
//! geo index. Both are written by [`SiteGeoRepository::insert`] in a single
//! non-transactional batch, so a concurrent reader may briefly see one
//! without the other.
//!
//! ## Excess-capacity queries
//!
//! The store has no command joining geo membership with a sorted-set score
//! threshold, so [`SiteGeoRepository::find_by_geo`] filters client-side
//! between dependent round trips:
//!
//! ```text
//! 1.  GEORADIUS sites:geo ...            -> candidate ids
//! 2a. ZSCORE sites:capacity:ranking id   (one batch, every candidate)
//! 2b. HGETALL sites:info:id              (one batch, score > threshold)
//! ```

use crate::application::command::{Batch, Command};
use crate::application::ports::{Store, StoreError};
use crate::domain::keys::KeySchema;
use crate::domain::schema::{self, DecodeError, Fields};
use crate::domain::site::{GeoQuery, Site};
use std::collections::BTreeMap;
use std::fmt;

/// Sites whose capacity score is at or below this value have no excess
/// capacity.
pub const CAPACITY_THRESHOLD: f64 = 0.2;

/// Error returned by [`SiteGeoRepository`] operations.
#[derive(Debug)]
pub enum SiteError {
    /// A geo-indexed site must carry a coordinate
    MissingCoordinate { site_id: u64 },
    /// No record exists for the id
    NotFound { site_id: u64 },
    /// A stored record could not be decoded
    Decode(DecodeError),
    /// Store communication failed
    Store(StoreError),
}

impl fmt::Display for SiteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteError::MissingCoordinate { site_id } => {
                write!(f, "site {} has no coordinate", site_id)
            }
            SiteError::NotFound { site_id } => write!(f, "site {} not found", site_id),
            SiteError::Decode(e) => write!(f, "malformed site record: {}", e),
            SiteError::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

impl std::error::Error for SiteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SiteError::Decode(e) => Some(e),
            SiteError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DecodeError> for SiteError {
    fn from(e: DecodeError) -> Self {
        SiteError::Decode(e)
    }
}

impl From<StoreError> for SiteError {
    fn from(e: StoreError) -> Self {
        SiteError::Store(e)
    }
}

/// Persists sites and answers geographic queries over them.
#[derive(Debug, Clone)]
pub struct SiteGeoRepository<S> {
    store: S,
    keys: KeySchema,
}

impl<S: Store> SiteGeoRepository<S> {
    /// Create a repository using the default key schema.
    pub fn new(store: S) -> Self {
        Self::with_key_schema(store, KeySchema::default())
    }

    /// Create a repository with a custom key schema.
    pub fn with_key_schema(store: S, keys: KeySchema) -> Self {
        Self { store, keys }
    }

    /// Get a reference to the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn key_schema(&self) -> &KeySchema {
        &self.keys
    }

    /// Write a site's record and register its coordinate.
    ///
    /// Re-inserting a site overwrites its record and moves its geo entry.
    ///
    /// # Errors
    /// `MissingCoordinate` if the site has no coordinate; nothing is written
    /// in that case.
    pub async fn insert(&self, site: &Site) -> Result<(), SiteError> {
        let coordinate = site
            .coordinate
            .ok_or(SiteError::MissingCoordinate { site_id: site.id })?;

        let batch = Batch::pipeline()
            .with(Command::HashSet {
                key: self.keys.site_hash_key(site.id),
                fields: schema::encode(site),
            })
            .with(Command::GeoAdd {
                key: self.keys.site_geo_key(),
                coordinate,
                member: site.id.to_string(),
            });
        self.store.execute(batch).await?;

        Ok(())
    }

    /// Insert each site in order, stopping at the first failure.
    ///
    /// Sites inserted before the failure stay inserted.
    pub async fn insert_many(&self, sites: &[Site]) -> Result<(), SiteError> {
        for site in sites {
            self.insert(site).await?;
        }
        Ok(())
    }

    /// Look up a site by id.
    ///
    /// # Errors
    /// `NotFound` if no record exists.
    pub async fn find_by_id(&self, site_id: u64) -> Result<Site, SiteError> {
        let fields = self
            .store
            .query(Command::HashGetAll {
                key: self.keys.site_hash_key(site_id),
            })
            .await?
            .into_fields()?;

        if fields.is_empty() {
            return Err(SiteError::NotFound { site_id });
        }

        Ok(schema::decode(&fields)?)
    }

    /// Find the sites within the query's radius.
    ///
    /// With `only_excess_capacity` set, sites whose capacity score is at or
    /// below [`CAPACITY_THRESHOLD`] are dropped; a site with no score counts
    /// as 0.0. Results are unique by id and ordered by id.
    pub async fn find_by_geo(&self, query: &GeoQuery) -> Result<Vec<Site>, SiteError> {
        let candidates = self.geo_radius(query).await?;
        tracing::trace!(
            candidates = candidates.len(),
            only_excess_capacity = query.only_excess_capacity,
            "geo radius resolved"
        );

        if query.only_excess_capacity {
            self.filter_by_capacity(candidates).await
        } else {
            self.load_all(candidates).await
        }
    }

    /// Every site in the geo index.
    pub async fn find_all(&self) -> Result<Vec<Site>, SiteError> {
        let site_ids = self
            .store
            .query(Command::SortedSetRange {
                key: self.keys.site_geo_key(),
                start: 0,
                stop: -1,
            })
            .await?
            .into_members()?;

        self.load_all(site_ids).await
    }

    async fn geo_radius(&self, query: &GeoQuery) -> Result<Vec<String>, SiteError> {
        let members = self
            .store
            .query(Command::GeoRadius {
                key: self.keys.site_geo_key(),
                center: query.coordinate,
                radius: query.radius,
                unit: query.radius_unit,
            })
            .await?
            .into_members()?;
        Ok(members)
    }

    async fn filter_by_capacity(&self, candidates: Vec<String>) -> Result<Vec<Site>, SiteError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let ranking_key = self.keys.capacity_ranking_key();
        let mut scores = Batch::pipeline();
        scores.extend(candidates.iter().map(|site_id| Command::SortedSetScore {
            key: ranking_key.clone(),
            member: site_id.clone(),
        }));
        let replies = self.store.execute(scores).await?;

        let mut with_capacity = Vec::new();
        for (site_id, reply) in candidates.into_iter().zip(replies) {
            let score = reply.into_score()?.unwrap_or(0.0);
            if score > CAPACITY_THRESHOLD {
                with_capacity.push(site_id);
            }
        }

        self.load_all(with_capacity).await
    }

    /// Read and decode the records of `site_ids` in one batch.
    async fn load_all(&self, site_ids: Vec<String>) -> Result<Vec<Site>, SiteError> {
        if site_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut batch = Batch::pipeline();
        batch.extend(site_ids.iter().map(|site_id| Command::HashGetAll {
            key: self.keys.site_hash_key(site_id),
        }));

        let mut sites = BTreeMap::new();
        for reply in self.store.execute(batch).await? {
            let fields: Fields = reply.into_fields()?;
            // Record removed after the index was read
            if fields.is_empty() {
                continue;
            }
            let site = schema::decode(&fields)?;
            sites.insert(site.id, site);
        }

        Ok(sites.into_values().collect())
    }
}
