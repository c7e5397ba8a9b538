use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use campux_types::api::MetadataResponse;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::with_db;

pub async fn get_metadata(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let lookup = key.clone();
    let value = with_db(&state, move |db| db.get_metadata(&lookup))
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(MetadataResponse { key, value }))
}
