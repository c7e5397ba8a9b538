pub mod accounts;
pub mod allocator;
pub mod error;
pub mod memory;
pub mod metadata;
pub mod posts;
pub mod queries;
pub mod sqlite;
pub mod store;

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::allocator::PostIdAllocator;
use crate::error::Result;
use crate::sqlite::SqliteStore;
use crate::store::DocumentStore;

pub use crate::error::{DbError, StoreError};

pub const ACCOUNT_COLLECTION: &str = "account";
pub const POST_COLLECTION: &str = "post";
pub const POST_LOG_COLLECTION: &str = "post_log";
pub const METADATA_COLLECTION: &str = "metadata";

/// Persistence entry point shared by every request handler.
///
/// Holds the injected store capability and the post-ID allocator. Account,
/// metadata, post and query operations are implemented on this type in their
/// own modules.
pub struct Database {
    store: Arc<dyn DocumentStore>,
    allocator: PostIdAllocator,
}

impl Database {
    /// Opens the SQLite-backed store at `path` and prepares it.
    pub fn open(path: &Path, database: &str) -> Result<Self> {
        let store = SqliteStore::open(path, database)?;
        Self::init(Arc::new(store))
    }

    /// Prepares an already-connected store: connectivity check, unique
    /// indexes, metadata bootstrap. Any failure here must abort startup.
    pub fn init(store: Arc<dyn DocumentStore>) -> Result<Self> {
        store.ping()?;

        store.ensure_unique_index(POST_COLLECTION, "id")?;
        store.ensure_unique_index(ACCOUNT_COLLECTION, "uin")?;
        store.ensure_unique_index(METADATA_COLLECTION, "key")?;

        let inserted = metadata::bootstrap(store.as_ref())?;
        info!("Database ready ({} metadata defaults inserted)", inserted);

        Ok(Self {
            store,
            allocator: PostIdAllocator::new(),
        })
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }
}
