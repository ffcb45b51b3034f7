//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use crate::application::command::{Batch, Command, Reply};
use async_trait::async_trait;
use std::fmt::{self, Debug};
use std::sync::Arc;

/// Port for obtaining the current time in milliseconds.
///
/// Limiter ledgers compare timestamps produced by this port, so every
/// process writing to the same ledger must use a comparable source.
/// Infrastructure provides `SystemClock` (monotonic on the Unix-epoch scale),
/// `UnixClock` (wall clock) and, for tests, `MockClock`.
pub trait Clock: Send + Sync + Debug {
    /// Current time in milliseconds.
    fn now_millis(&self) -> u64;
}

/// Error raised while talking to the store.
#[derive(Debug)]
pub enum StoreError {
    /// The command targeted a key holding another data type
    WrongType { key: String },
    /// The store rejected a command argument
    InvalidArgument {
        command: &'static str,
        reason: String,
    },
    /// A reply did not have the shape its command implies
    UnexpectedReply {
        expected: &'static str,
        found: &'static str,
    },
    /// The store returned a different number of replies than commands sent
    ReplyCount { expected: usize, actual: usize },
    /// Error reported by the Redis client
    #[cfg(feature = "redis-store")]
    Redis(redis::RedisError),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::WrongType { key } => {
                write!(
                    f,
                    "operation against key {} holding the wrong kind of value",
                    key
                )
            }
            StoreError::InvalidArgument { command, reason } => {
                write!(f, "invalid argument to {}: {}", command, reason)
            }
            StoreError::UnexpectedReply { expected, found } => {
                write!(f, "expected {} reply, got {}", expected, found)
            }
            StoreError::ReplyCount { expected, actual } => {
                write!(f, "expected {} replies, got {}", expected, actual)
            }
            #[cfg(feature = "redis-store")]
            StoreError::Redis(e) => write!(f, "redis error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            #[cfg(feature = "redis-store")]
            StoreError::Redis(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "redis-store")]
impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Redis(e)
    }
}

/// Port for the backing key-value store.
///
/// A store executes [`Batch`]es: ordered commands sent in one round trip,
/// answered by one [`Reply`] per command in submission order. Transactional
/// batches are isolated and all-or-nothing; non-transactional batches may
/// interleave with other clients' commands. Infrastructure provides
/// `MemoryStore` and, with the `redis-store` feature, `RedisStore`.
#[async_trait]
pub trait Store: Send + Sync + Debug {
    /// Execute a batch and return its replies in submission order.
    ///
    /// # Errors
    /// Returns the store's error unchanged. A failed non-transactional batch
    /// may have applied some of its commands.
    async fn execute(&self, batch: Batch) -> Result<Vec<Reply>, StoreError>;

    /// Execute a single command.
    async fn query(&self, command: Command) -> Result<Reply, StoreError> {
        let mut replies = self.execute(Batch::pipeline().with(command)).await?;
        match (replies.pop(), replies.len()) {
            (Some(reply), 0) => Ok(reply),
            (reply, rest) => Err(StoreError::ReplyCount {
                expected: 1,
                actual: rest + usize::from(reply.is_some()),
            }),
        }
    }
}

// Implement Store for Arc<S> so a store can be shared between components
#[async_trait]
impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    async fn execute(&self, batch: Batch) -> Result<Vec<Reply>, StoreError> {
        (**self).execute(batch).await
    }

    async fn query(&self, command: Command) -> Result<Reply, StoreError> {
        (**self).query(command).await
    }
}
