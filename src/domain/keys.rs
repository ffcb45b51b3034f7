//! Key naming scheme.
//!
//! Every key the crate touches is built here. All keys share one namespace
//! prefix so that several deployments can live in a single store:
//!
//! ```text
//! {prefix}:sites:info:{site_id}
//! {prefix}:sites:geo
//! {prefix}:limiter:{name}:{window_ms}:{max_hits}
//! ```

use crate::domain::site::MetricUnit;
use chrono::NaiveDate;
use std::fmt;

/// Prefix used when none is configured.
pub const DEFAULT_KEY_PREFIX: &str = "ru102py-test";

/// Builds namespaced store keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeySchema {
    prefix: String,
}

impl KeySchema {
    /// Create a schema using `prefix` as the namespace.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The namespace prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key(&self, name: fmt::Arguments<'_>) -> String {
        format!("{}:{}", self.prefix, name)
    }

    /// Hash holding one site record.
    ///
    /// Takes any displayable id so that geo index members can be used as-is.
    pub fn site_hash_key(&self, site_id: impl fmt::Display) -> String {
        self.key(format_args!("sites:info:{site_id}"))
    }

    /// Set of all site ids.
    pub fn site_ids_key(&self) -> String {
        self.key(format_args!("sites:ids"))
    }

    /// Geo index of site coordinates.
    pub fn site_geo_key(&self) -> String {
        self.key(format_args!("sites:geo"))
    }

    /// Sorted set of per-day site statistics.
    pub fn site_stats_key(&self, site_id: u64, day: NaiveDate) -> String {
        self.key(format_args!(
            "sites:stats:{}:{site_id}",
            day.format("%Y-%m-%d")
        ))
    }

    /// Sorted set of capacity scores, one member per site id.
    pub fn capacity_ranking_key(&self) -> String {
        self.key(format_args!("sites:capacity:ranking"))
    }

    /// Sorted set of one day's readings of `unit` for a site.
    pub fn day_metric_key(&self, site_id: u64, unit: MetricUnit, day: NaiveDate) -> String {
        self.key(format_args!(
            "metric:{unit}:{}:{site_id}",
            day.format("%Y-%m-%d")
        ))
    }

    /// Stream of readings across all sites.
    pub fn global_feed_key(&self) -> String {
        self.key(format_args!("sites:feed"))
    }

    /// Stream of readings for one site.
    pub fn feed_key(&self, site_id: u64) -> String {
        self.key(format_args!("sites:feed:{site_id}"))
    }

    /// Counter for a fixed-window limiter block.
    pub fn fixed_rate_limiter_key(&self, name: &str, minute_block: u64, max_hits: u64) -> String {
        self.key(format_args!("limiter:{name}:{minute_block}:{max_hits}"))
    }

    /// Sorted-set ledger of a sliding-window limiter.
    pub fn sliding_window_rate_limiter_key(
        &self,
        name: &str,
        window_size_ms: u64,
        max_hits: u64,
    ) -> String {
        self.key(format_args!("limiter:{name}:{window_size_ms}:{max_hits}"))
    }

    /// Time series of `unit` readings for a site.
    pub fn timeseries_key(&self, site_id: u64, unit: MetricUnit) -> String {
        self.key(format_args!("sites:ts:{site_id}:{unit}"))
    }
}

impl Default for KeySchema {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}
