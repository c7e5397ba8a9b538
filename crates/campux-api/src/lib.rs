pub mod auth;
pub mod error;
pub mod metadata;
pub mod middleware;
pub mod posts;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};
use tracing::error;

use campux_db::{Database, DbError};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::require_auth;

/// All routes, with authentication applied to the ones that act on behalf of an account.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/posts", get(posts::list_posts))
        .route("/posts/{id}", get(posts::get_post))
        .route("/posts/{id}/logs", get(posts::get_post_logs))
        .route("/metadata/{key}", get(metadata::get_metadata))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/password", put(auth::change_password))
        .route("/posts", post(posts::create_post))
        .route("/posts/{id}/status", put(posts::update_status))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

/// Runs a synchronous database call off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, DbError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.to_string())
        })?
        .map_err(ApiError::from)
}
