use campux_types::models::{Post, PostStatus};

use crate::error::{DbError, Result};
use crate::store::{FindOptions, Filter, Sort, SortOrder, from_document};
use crate::{Database, POST_COLLECTION};

/// `uin` value meaning "posts of any author".
pub const ANY_UIN: i64 = -1;

impl Database {
    /// One page of posts ordered by `created_at`.
    ///
    /// `uin == ANY_UIN` and `status == ANY` disable the respective filter.
    /// `page` is 1-based; a page or page size below 1 is rejected.
    pub fn get_posts(
        &self,
        uin: i64,
        status: &PostStatus,
        time_order: SortOrder,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<Post>> {
        if page < 1 || page_size < 1 {
            return Err(DbError::InvalidPage { page, page_size });
        }

        let mut filter = Filter::new();
        if uin != ANY_UIN {
            filter = filter.eq("uin", uin);
        }
        if !status.is_any() {
            filter = filter.eq("status", status.as_str());
        }

        let options = FindOptions {
            sort: Some(Sort { field: "created_at".to_string(), order: time_order }),
            skip: ((page - 1) as u64).saturating_mul(page_size as u64),
            limit: Some(page_size as u64),
        };

        self.store
            .find_many(POST_COLLECTION, &filter, &options)?
            .into_iter()
            .map(|doc| from_document(doc).map_err(DbError::from))
            .collect()
    }

    /// `Ok(None)` when no post has this id.
    pub fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let doc = self
            .store
            .find_one(POST_COLLECTION, &Filter::new().eq("id", id), None)?;

        Ok(doc.map(from_document::<Post>).transpose()?)
    }

    pub fn count_posts(&self) -> Result<u64> {
        Ok(self.store.count(POST_COLLECTION, &Filter::new())?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::memory::MemoryStore;
    use crate::sqlite::SqliteStore;
    use crate::store::DocumentStore;

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + minute * 60_000).unwrap()
    }

    fn seed(store: Arc<dyn DocumentStore>, count: i64) -> Database {
        let db = Database::init(store).unwrap();
        for i in 1..=count {
            db.add_post(Post {
                id: 0,
                uin: if i % 3 == 0 { 300 } else { 100 },
                text: format!("post {i}"),
                images: vec![],
                anon: false,
                status: PostStatus::pending_approval(),
                created_at: at(i),
            })
            .unwrap();
        }
        db
    }

    fn ids(posts: &[Post]) -> Vec<i64> {
        posts.iter().map(|p| p.id).collect()
    }

    #[test]
    fn first_page_holds_the_newest_posts() {
        for store in [
            Arc::new(MemoryStore::new()) as Arc<dyn DocumentStore>,
            Arc::new(SqliteStore::open_in_memory("campux").unwrap()) as Arc<dyn DocumentStore>,
        ] {
            let db = seed(store, 15);
            let page = db
                .get_posts(ANY_UIN, &PostStatus::any(), SortOrder::Descending, 1, 10)
                .unwrap();
            assert_eq!(ids(&page), (6..=15).rev().collect::<Vec<_>>());
        }
    }

    #[test]
    fn later_pages_continue_where_the_last_stopped() {
        let db = seed(Arc::new(MemoryStore::new()), 15);

        let page = db
            .get_posts(ANY_UIN, &PostStatus::any(), SortOrder::Descending, 2, 10)
            .unwrap();
        assert_eq!(ids(&page), vec![5, 4, 3, 2, 1]);

        let past_end = db
            .get_posts(ANY_UIN, &PostStatus::any(), SortOrder::Descending, 3, 10)
            .unwrap();
        assert!(past_end.is_empty());
    }

    #[test]
    fn ascending_order_lists_oldest_first() {
        let db = seed(Arc::new(SqliteStore::open_in_memory("campux").unwrap()), 5);
        let page = db
            .get_posts(ANY_UIN, &PostStatus::any(), SortOrder::Ascending, 1, 3)
            .unwrap();
        assert_eq!(ids(&page), vec![1, 2, 3]);
    }

    #[test]
    fn author_and_status_filters_apply_only_when_set() {
        let db = seed(Arc::new(SqliteStore::open_in_memory("campux").unwrap()), 9);
        db.update_post_status(3, &PostStatus::new("approved")).unwrap();

        let by_author = db
            .get_posts(300, &PostStatus::any(), SortOrder::Ascending, 1, 10)
            .unwrap();
        assert_eq!(ids(&by_author), vec![3, 6, 9]);

        let approved = db
            .get_posts(ANY_UIN, &PostStatus::new("approved"), SortOrder::Ascending, 1, 10)
            .unwrap();
        assert_eq!(ids(&approved), vec![3]);

        let pending_by_author = db
            .get_posts(300, &PostStatus::pending_approval(), SortOrder::Ascending, 1, 10)
            .unwrap();
        assert_eq!(ids(&pending_by_author), vec![6, 9]);
    }

    #[test]
    fn non_positive_pages_are_rejected() {
        let db = seed(Arc::new(MemoryStore::new()), 1);

        for (page, page_size) in [(0, 10), (-1, 10), (1, 0)] {
            let err = db
                .get_posts(ANY_UIN, &PostStatus::any(), SortOrder::Descending, page, page_size)
                .unwrap_err();
            assert!(matches!(err, DbError::InvalidPage { .. }));
        }
    }

    #[test]
    fn missing_post_is_none() {
        let db = seed(Arc::new(MemoryStore::new()), 2);
        assert!(db.get_post(3).unwrap().is_none());
        assert_eq!(db.get_post(2).unwrap().unwrap().text, "post 2");
    }
}
