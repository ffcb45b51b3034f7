//! Recording store wrapper for testing.

use crate::application::command::{Batch, Reply};
use crate::application::ports::{Store, StoreError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Store wrapper that records every batch before delegating it.
///
/// Lets tests assert how many round trips an operation made and which
/// commands it sent.
///
/// # Examples
///
/// ```
/// use redisolar::infrastructure::memory_store::MemoryStore;
/// use redisolar::infrastructure::mocks::RecordingStore;
/// use redisolar::application::command::Command;
/// use redisolar::application::ports::Store;
///
/// # tokio_test_block(async {
/// let store = RecordingStore::new(MemoryStore::new());
/// store.query(Command::SortedSetCard { key: "k".into() }).await.unwrap();
/// assert_eq!(store.batch_count(), 1);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RecordingStore<S> {
    inner: S,
    batches: Arc<Mutex<Vec<Batch>>>,
}

impl<S> RecordingStore<S> {
    /// Wrap a store.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            batches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// All batches executed so far, in order.
    pub fn batches(&self) -> Vec<Batch> {
        self.batches
            .lock()
            .expect("RecordingStore mutex poisoned - a test thread panicked while holding the lock")
            .clone()
    }

    /// Number of batches (round trips) executed so far.
    pub fn batch_count(&self) -> usize {
        self.batches
            .lock()
            .expect("RecordingStore mutex poisoned - a test thread panicked while holding the lock")
            .len()
    }

    /// Forget recorded batches.
    pub fn clear(&self) {
        self.batches
            .lock()
            .expect("RecordingStore mutex poisoned - a test thread panicked while holding the lock")
            .clear();
    }
}

#[async_trait]
impl<S: Store> Store for RecordingStore<S> {
    async fn execute(&self, batch: Batch) -> Result<Vec<Reply>, StoreError> {
        self.batches
            .lock()
            .expect("RecordingStore mutex poisoned - a test thread panicked while holding the lock")
            .push(batch.clone());
        self.inner.execute(batch).await
    }
}
