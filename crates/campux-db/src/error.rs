use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type Result<T> = std::result::Result<T, DbError>;

/// Failures raised by a [`DocumentStore`](crate::store::DocumentStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("duplicate value for unique field {field} in {collection}")]
    Duplicate { collection: String, field: String },

    #[error("invalid collection or field name: {0:?}")]
    InvalidName(String),

    #[error("value is not a document: {0}")]
    NotADocument(String),

    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        match self {
            Self::Duplicate { .. } => true,
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => {
                e.code == rusqlite::ErrorCode::ConstraintViolation
            }
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A post write is committed but the log entry recording it is not.
    /// Needs manual reconciliation; nothing is rolled back.
    #[error("post {post_id} was written but its log entry failed: {source}")]
    PartialWrite {
        post_id: i64,
        #[source]
        source: StoreError,
    },

    #[error("invalid page {page} with page size {page_size}")]
    InvalidPage { page: i64, page_size: i64 },
}

impl DbError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_duplicate())
    }
}
