use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;

use campux_db::error::Result as DbResult;
use campux_db::store::SortOrder;
use campux_db::{Database, DbError};
use campux_types::api::{Claims, CreatePostRequest, CreatePostResponse, PostListQuery, UpdateStatusRequest};
use campux_types::models::{Post, PostLog, PostStatus};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::with_db;

/// Largest page a client may request.
const MAX_PAGE_SIZE: i64 = 100;

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = Post {
        id: 0,
        uin: claims.sub,
        text: req.text,
        images: req.images,
        anon: req.anon,
        status: PostStatus::pending_approval(),
        created_at: Utc::now(),
    };

    let id = with_db(&state, move |db| db.add_post(post)).await?;
    Ok((StatusCode::CREATED, Json(CreatePostResponse { id })))
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PostListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let order = SortOrder::from_direction(query.time_order)
        .ok_or_else(|| ApiError::BadRequest("time_order must be 1 or -1".into()))?;
    let page_size = query.page_size.min(MAX_PAGE_SIZE);

    let posts = with_db(&state, move |db| {
        db.get_posts(query.uin, &query.status, order, query.page, page_size)
    })
    .await?;

    Ok(Json(posts))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let post = with_db(&state, move |db| db.get_post(id))
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(post))
}

/// Records a moderation decision: sets the new status and appends the
/// matching log entry with the previous status.
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.status.is_any() {
        return Err(ApiError::BadRequest("status 'any' is a query wildcard".into()));
    }

    let op = claims.sub;
    let log = with_db(&state, move |db| transition(db, id, op, req))
        .await?
        .ok_or(ApiError::NotFound)?;

    info!("Post {} moved {} -> {} by {}", id, log.old_status, log.new_status, op);
    Ok(Json(log))
}

/// `Ok(None)` when the post does not exist. A log append that fails after the
/// status was changed is a `PartialWrite` for that post.
fn transition(db: &Database, id: i64, op: i64, req: UpdateStatusRequest) -> DbResult<Option<PostLog>> {
    let Some(post) = db.get_post(id)? else {
        return Ok(None);
    };
    if !db.update_post_status(id, &req.status)? {
        return Ok(None);
    }

    let log = PostLog {
        post_id: id,
        op,
        old_status: post.status,
        new_status: req.status,
        comment: req.comment,
        created_at: Utc::now(),
    };
    db.add_post_log(&log).map_err(|e| match e {
        DbError::Store(source) => DbError::PartialWrite { post_id: id, source },
        other => other,
    })?;
    Ok(Some(log))
}

pub async fn get_post_logs(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let logs = with_db(&state, move |db| db.get_post_logs(id)).await?;
    Ok(Json(logs))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use campux_db::error::StoreResult;
    use campux_db::memory::MemoryStore;
    use campux_db::store::{Document, DocumentStore, Filter, FindOptions, Sort};
    use campux_db::{POST_LOG_COLLECTION, StoreError};

    use super::*;

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

    fn approve() -> UpdateStatusRequest {
        UpdateStatusRequest { status: PostStatus::new("approved"), comment: "ok".into() }
    }

    fn submit(db: &Database) -> i64 {
        db.add_post(Post {
            id: 0,
            uin: 100,
            text: "lost umbrella".into(),
            images: vec![],
            anon: false,
            status: PostStatus::pending_approval(),
            created_at: Utc::now(),
        })
        .unwrap()
    }

    #[test]
    fn transition_logs_the_previous_status() {
        let db = Database::init(Arc::new(MemoryStore::new())).unwrap();
        let id = submit(&db);

        let log = transition(&db, id, 7, approve()).unwrap().unwrap();
        assert_eq!(log.old_status, PostStatus::pending_approval());
        assert_eq!(db.get_post_logs(id).unwrap().len(), 2);

        assert!(transition(&db, id + 1, 7, approve()).unwrap().is_none());
    }

    #[test]
    fn unlogged_transition_is_a_partial_write_carrying_the_id() {
        let store = Arc::new(FlakyLogStore::default());
        let db = Database::init(store.clone()).unwrap();
        let id = submit(&db);

        store.fail_logs.store(true, Ordering::SeqCst);
        match transition(&db, id, 7, approve()) {
            Err(DbError::PartialWrite { post_id, .. }) => assert_eq!(post_id, id),
            other => panic!("expected partial write, got {other:?}"),
        }

        // The status change stays; only the creation log exists.
        assert_eq!(db.get_post(id).unwrap().unwrap().status, PostStatus::new("approved"));
        assert_eq!(db.get_post_logs(id).unwrap().len(), 1);
    }
}
