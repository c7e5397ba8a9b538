use std::sync::{Mutex, PoisonError};

use serde::Deserialize;
use tracing::debug;

use crate::POST_COLLECTION;
use crate::error::{Result, StoreResult};
use crate::store::{DocumentStore, Filter, Sort, from_document};

#[derive(Deserialize)]
struct IdRow {
    id: i64,
}

/// Hands out post ids as `max(id) + 1`.
///
/// The lock covers the caller's whole write sequence, not only the read of the
/// current maximum, so two allocations can never observe the same maximum.
/// This only serializes writers inside one process; a second process writing
/// to the same store would need a store-side counter instead.
#[derive(Default)]
pub struct PostIdAllocator {
    lock: Mutex<()>,
}

impl PostIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Largest post id in the store, or 0 when there are no posts.
    pub fn max_post_id(store: &dyn DocumentStore) -> StoreResult<i64> {
        let top = store.find_one(POST_COLLECTION, &Filter::new(), Some(&Sort::desc("id")))?;
        match top {
            Some(doc) => Ok(from_document::<IdRow>(doc)?.id),
            None => Ok(0),
        }
    }

    /// Runs `f` with the next post id while holding the post lock.
    /// The lock is released when `f` returns, whatever it returns.
    pub fn with_next_id<F, T>(&self, store: &dyn DocumentStore, f: F) -> Result<T>
    where
        F: FnOnce(i64) -> Result<T>,
    {
        // Only ordering is guarded; a poisoned lock holds no broken state.
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let id = Self::max_post_id(store)? + 1;
        debug!(post_id = id, "Post id allocated");
        f(id)
    }
}
