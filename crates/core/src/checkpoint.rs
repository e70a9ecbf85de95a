//! Persistence of graph state between runs of the same thread.

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::GraphError;

/// Stores the latest state of each thread.
#[async_trait]
pub trait Checkpointer<S>: Send + Sync {
    /// Loads the state saved for `thread_id`.
    async fn get(&self, thread_id: &str) -> Result<Option<S>, GraphError>;

    /// Saves `state` as the latest state of `thread_id`.
    async fn put(&self, thread_id: &str, state: &S) -> Result<(), GraphError>;
}

#[async_trait]
impl<S, C> Checkpointer<S> for Arc<C>
where
    S: Sync + 'static,
    C: Checkpointer<S> + ?Sized,
{
    #[inline]
    async fn get(&self, thread_id: &str) -> Result<Option<S>, GraphError> {
        (**self).get(thread_id).await
    }

    #[inline]
    async fn put(&self, thread_id: &str, state: &S) -> Result<(), GraphError> {
        (**self).put(thread_id, state).await
    }
}

/// A checkpointer that keeps states in memory for the process lifetime.
///
/// Clones share the same store, so one saver can be handed to several
/// graphs.
pub struct MemorySaver<S> {
    threads: Arc<Mutex<HashMap<String, S>>>,
}

impl<S> MemorySaver<S> {
    /// Creates an empty saver.
    #[inline]
    pub fn new() -> Self {
        Self {
            threads: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<S> Default for MemorySaver<S> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for MemorySaver<S> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            threads: Arc::clone(&self.threads),
        }
    }
}

impl<S> Debug for MemorySaver<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySaver").finish_non_exhaustive()
    }
}

#[async_trait]
impl<S: Clone + Send + Sync + 'static> Checkpointer<S> for MemorySaver<S> {
    async fn get(&self, thread_id: &str) -> Result<Option<S>, GraphError> {
        Ok(self.threads.lock().await.get(thread_id).cloned())
    }

    async fn put(&self, thread_id: &str, state: &S) -> Result<(), GraphError> {
        trace!("saving checkpoint for thread {thread_id}");
        self.threads
            .lock()
            .await
            .insert(thread_id.to_owned(), state.clone());
        Ok(())
    }
}
