//! Store commands, replies and batches.
//!
//! A [`Batch`] is an ordered list of [`Command`]s sent to the store in one
//! round trip. The store answers with one [`Reply`] per command, in the same
//! order.

use crate::application::ports::StoreError;
use crate::domain::schema::Fields;
use crate::domain::site::{Coordinate, GeoUnit};
use std::fmt;

/// A single store command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Write a field mapping into a hash (HSET)
    HashSet { key: String, fields: Fields },
    /// Read every field of a hash; absent keys read as empty (HGETALL)
    HashGetAll { key: String },
    /// Register a member's position in a geo index (GEOADD)
    GeoAdd {
        key: String,
        coordinate: Coordinate,
        member: String,
    },
    /// Members within `radius` of `center`, boundary included (GEORADIUS)
    GeoRadius {
        key: String,
        center: Coordinate,
        radius: f64,
        unit: GeoUnit,
    },
    /// Add or update a member's score (ZADD)
    SortedSetAdd {
        key: String,
        member: String,
        score: f64,
    },
    /// Remove members with `min <= score <= max` (ZREMRANGEBYSCORE)
    SortedSetRemoveRangeByScore { key: String, min: f64, max: f64 },
    /// Number of members (ZCARD)
    SortedSetCard { key: String },
    /// Score of one member, `None` when absent (ZSCORE)
    SortedSetScore { key: String, member: String },
    /// Members by rank, negative indices count from the end (ZRANGE)
    SortedSetRange { key: String, start: i64, stop: i64 },
}

impl Command {
    /// Name of the store command this maps to.
    pub fn name(&self) -> &'static str {
        match self {
            Command::HashSet { .. } => "HSET",
            Command::HashGetAll { .. } => "HGETALL",
            Command::GeoAdd { .. } => "GEOADD",
            Command::GeoRadius { .. } => "GEORADIUS",
            Command::SortedSetAdd { .. } => "ZADD",
            Command::SortedSetRemoveRangeByScore { .. } => "ZREMRANGEBYSCORE",
            Command::SortedSetCard { .. } => "ZCARD",
            Command::SortedSetScore { .. } => "ZSCORE",
            Command::SortedSetRange { .. } => "ZRANGE",
        }
    }

    /// The key this command operates on.
    pub fn key(&self) -> &str {
        match self {
            Command::HashSet { key, .. }
            | Command::HashGetAll { key }
            | Command::GeoAdd { key, .. }
            | Command::GeoRadius { key, .. }
            | Command::SortedSetAdd { key, .. }
            | Command::SortedSetRemoveRangeByScore { key, .. }
            | Command::SortedSetCard { key }
            | Command::SortedSetScore { key, .. }
            | Command::SortedSetRange { key, .. } => key,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name(), self.key())
    }
}

/// Result of one command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Integer reply: cardinality, number of added or removed members
    Count(u64),
    /// Hash contents, empty when the key is absent
    Fields(Fields),
    /// Member list
    Members(Vec<String>),
    /// Member score, `None` when the member is absent
    Score(Option<f64>),
}

impl Reply {
    fn kind(&self) -> &'static str {
        match self {
            Reply::Count(_) => "count",
            Reply::Fields(_) => "fields",
            Reply::Members(_) => "members",
            Reply::Score(_) => "score",
        }
    }

    fn unexpected(self, expected: &'static str) -> StoreError {
        StoreError::UnexpectedReply {
            expected,
            found: self.kind(),
        }
    }

    pub fn into_count(self) -> Result<u64, StoreError> {
        match self {
            Reply::Count(count) => Ok(count),
            other => Err(other.unexpected("count")),
        }
    }

    pub fn into_fields(self) -> Result<Fields, StoreError> {
        match self {
            Reply::Fields(fields) => Ok(fields),
            other => Err(other.unexpected("fields")),
        }
    }

    pub fn into_members(self) -> Result<Vec<String>, StoreError> {
        match self {
            Reply::Members(members) => Ok(members),
            other => Err(other.unexpected("members")),
        }
    }

    pub fn into_score(self) -> Result<Option<f64>, StoreError> {
        match self {
            Reply::Score(score) => Ok(score),
            other => Err(other.unexpected("score")),
        }
    }
}

/// Isolation mode of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// All-or-nothing, isolated from other clients (MULTI/EXEC)
    Transactional,
    /// Ordered and sent in one round trip, but other clients' commands may
    /// run between ours
    #[default]
    NonTransactional,
}

/// Ordered commands executed in a single round trip.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    mode: BatchMode,
    commands: Vec<Command>,
}

impl Batch {
    /// Create an empty non-transactional batch.
    pub fn pipeline() -> Self {
        Self::default()
    }

    /// Create an empty transactional batch.
    pub fn transaction() -> Self {
        Self {
            mode: BatchMode::Transactional,
            commands: Vec::new(),
        }
    }

    /// Append a command.
    pub fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    /// Append a command, by value.
    pub fn with(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    pub fn is_transactional(&self) -> bool {
        self.mode == BatchMode::Transactional
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Extend<Command> for Batch {
    fn extend<I: IntoIterator<Item = Command>>(&mut self, iter: I) {
        self.commands.extend(iter);
    }
}
