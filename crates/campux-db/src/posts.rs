use chrono::Utc;
use serde_json::Value;
use tracing::{error, info};

use campux_types::models::{Post, PostLog, PostStatus};

use crate::error::{DbError, Result};
use crate::store::{Document, FindOptions, Filter, from_document, to_document};
use crate::{Database, POST_COLLECTION, POST_LOG_COLLECTION};

pub const NEW_SUBMISSION_COMMENT: &str = "new submission";

impl Database {
    // -- Lifecycle --

    /// Stores a new post under a freshly allocated id and logs its creation.
    ///
    /// The post is stamped with the id and with `PENDING_APPROVAL`. The whole
    /// sequence runs under the post lock. If the log append fails after the
    /// post row is written, the row stays and `DbError::PartialWrite` carries
    /// its id.
    pub fn add_post(&self, mut post: Post) -> Result<i64> {
        let store = self.store.as_ref();

        self.allocator.with_next_id(store, |id| {
            post.id = id;
            post.status = PostStatus::pending_approval();
            store.insert(POST_COLLECTION, to_document(&post)?)?;

            let log = PostLog {
                post_id: id,
                op: post.uin,
                old_status: PostStatus::any(),
                new_status: PostStatus::pending_approval(),
                comment: NEW_SUBMISSION_COMMENT.to_string(),
                created_at: Utc::now(),
            };
            let appended = to_document(&log).and_then(|doc| store.insert(POST_LOG_COLLECTION, doc));
            if let Err(source) = appended {
                error!("Post {} inserted without its creation log: {}", id, source);
                return Err(DbError::PartialWrite { post_id: id, source });
            }

            info!("Post {} created by {}", id, post.uin);
            Ok(id)
        })
    }

    /// Sets only the `status` field. Returns `false` when no post has this id.
    ///
    /// Unlike `add_post`, this writes no log entry: callers that change a
    /// status are expected to record the transition with `add_post_log`.
    pub fn update_post_status(&self, id: i64, status: &PostStatus) -> Result<bool> {
        let mut fields = Document::new();
        fields.insert("status".to_string(), Value::String(status.as_str().to_string()));

        let matched = self
            .store
            .update_one_set(POST_COLLECTION, &Filter::new().eq("id", id), fields)?;
        Ok(matched > 0)
    }

    // -- Logs --

    pub fn add_post_log(&self, log: &PostLog) -> Result<()> {
        self.store.insert(POST_LOG_COLLECTION, to_document(log)?)?;
        Ok(())
    }

    /// All log entries of a post, oldest first.
    pub fn get_post_logs(&self, post_id: i64) -> Result<Vec<PostLog>> {
        let docs = self.store.find_many(
            POST_LOG_COLLECTION,
            &Filter::new().eq("post_id", post_id),
            &FindOptions::default(),
        )?;

        docs.into_iter()
            .map(|doc| from_document(doc).map_err(DbError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::Duration;

    use super::*;
    use crate::error::{StoreError, StoreResult};
    use crate::memory::MemoryStore;
    use crate::sqlite::SqliteStore;
    use crate::store::{DocumentStore, Sort};

    fn post(uin: i64) -> Post {
        Post {
            id: 0,
            uin,
            text: format!("from {uin}"),
            images: vec![],
            anon: false,
            status: PostStatus::pending_approval(),
            created_at: Utc::now(),
        }
    }

    /// Delegates to a `MemoryStore` but can be told to fail log appends.
    #[derive(Default)]
    struct FlakyLogStore {
        inner: MemoryStore,
        fail_logs: AtomicBool,
    }

    impl DocumentStore for FlakyLogStore {
        fn ping(&self) -> StoreResult<()> {
            self.inner.ping()
        }

        fn insert(&self, collection: &str, doc: Document) -> StoreResult<()> {
            if collection == POST_LOG_COLLECTION && self.fail_logs.load(Ordering::SeqCst) {
                return Err(StoreError::LockPoisoned);
            }
            self.inner.insert(collection, doc)
        }

        fn find_one(&self, c: &str, f: &Filter, s: Option<&Sort>) -> StoreResult<Option<Document>> {
            self.inner.find_one(c, f, s)
        }

        fn find_many(&self, c: &str, f: &Filter, o: &FindOptions) -> StoreResult<Vec<Document>> {
            self.inner.find_many(c, f, o)
        }

        fn count(&self, c: &str, f: &Filter) -> StoreResult<u64> {
            self.inner.count(c, f)
        }

        fn update_one_set(&self, c: &str, f: &Filter, fields: Document) -> StoreResult<u64> {
            self.inner.update_one_set(c, f, fields)
        }

        fn ensure_unique_index(&self, c: &str, field: &str) -> StoreResult<()> {
            self.inner.ensure_unique_index(c, field)
        }
    }

    #[test]
    fn first_posts_get_sequential_ids_and_creation_logs() {
        let db = Database::init(Arc::new(MemoryStore::new())).unwrap();

        assert_eq!(db.add_post(post(100)).unwrap(), 1);

        let stored = db.get_post(1).unwrap().unwrap();
        assert_eq!(stored.uin, 100);
        assert_eq!(stored.status, PostStatus::pending_approval());

        let logs = db.get_post_logs(1).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].post_id, 1);
        assert_eq!(logs[0].op, 100);
        assert!(logs[0].old_status.is_any());
        assert_eq!(logs[0].new_status, PostStatus::pending_approval());
        assert_eq!(logs[0].comment, NEW_SUBMISSION_COMMENT);

        assert_eq!(db.add_post(post(200)).unwrap(), 2);
        assert_eq!(db.get_post_logs(2).unwrap().len(), 1);
        assert_eq!(db.count_posts().unwrap(), 2);
    }

    #[test]
    fn caller_supplied_id_and_status_are_overwritten() {
        let db = Database::init(Arc::new(SqliteStore::open_in_memory("campux").unwrap())).unwrap();

        let mut p = post(1);
        p.id = 42;
        p.status = PostStatus::new("approved");

        assert_eq!(db.add_post(p).unwrap(), 1);
        let stored = db.get_post(1).unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::pending_approval());
        assert!(db.get_post(42).unwrap().is_none());
    }

    #[test]
    fn log_failure_is_a_partial_write_carrying_the_id() {
        let store = Arc::new(FlakyLogStore::default());
        let db = Database::init(store.clone()).unwrap();
        db.add_post(post(1)).unwrap();

        store.fail_logs.store(true, Ordering::SeqCst);
        match db.add_post(post(2)) {
            Err(DbError::PartialWrite { post_id, .. }) => assert_eq!(post_id, 2),
            other => panic!("expected partial write, got {other:?}"),
        }

        // The row is visible but unlogged; allocation moves past it.
        assert!(db.get_post(2).unwrap().is_some());
        assert!(db.get_post_logs(2).unwrap().is_empty());

        store.fail_logs.store(false, Ordering::SeqCst);
        assert_eq!(db.add_post(post(3)).unwrap(), 3);
    }

    #[test]
    fn status_update_writes_no_log() {
        let db = Database::init(Arc::new(MemoryStore::new())).unwrap();
        let id = db.add_post(post(7)).unwrap();

        assert!(db.update_post_status(id, &PostStatus::new("approved")).unwrap());
        assert_eq!(db.get_post(id).unwrap().unwrap().status, PostStatus::new("approved"));
        assert_eq!(db.get_post_logs(id).unwrap().len(), 1);
    }

    #[test]
    fn status_update_of_missing_post_reports_false() {
        let db = Database::init(Arc::new(SqliteStore::open_in_memory("campux").unwrap())).unwrap();
        assert!(!db.update_post_status(99, &PostStatus::new("approved")).unwrap());
    }

    #[test]
    fn logs_append_in_order() {
        let db = Database::init(Arc::new(MemoryStore::new())).unwrap();
        let id = db.add_post(post(7)).unwrap();
        let now = Utc::now();

        db.add_post_log(&PostLog {
            post_id: id,
            op: 1,
            old_status: PostStatus::pending_approval(),
            new_status: PostStatus::new("approved"),
            comment: "looks fine".into(),
            created_at: now + Duration::seconds(1),
        })
        .unwrap();

        let logs = db.get_post_logs(id).unwrap();
        let transitions: Vec<&str> = logs.iter().map(|l| l.new_status.as_str()).collect();
        assert_eq!(transitions, vec![PostStatus::PENDING_APPROVAL, "approved"]);
        assert!(db.get_post_logs(id + 1).unwrap().is_empty());
    }
}
