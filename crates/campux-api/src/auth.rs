use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;

use campux_db::Database;
use campux_types::api::{ChangePasswordRequest, Claims, LoginRequest, RegisterRequest, TokenResponse};
use campux_types::models::Account;

use crate::error::ApiError;
use crate::with_db;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

const MIN_PASSWORD_LEN: usize = 8;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.uin <= 0 {
        return Err(ApiError::BadRequest("uin must be positive".into()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest("password too short".into()));
    }

    let uin = req.uin;
    if with_db(&state, move |db| db.get_account_by_uin(uin)).await?.is_some() {
        return Err(ApiError::Conflict);
    }

    let (pwd, salt) = hash_password(&req.password)?;
    let account = Account { uin, pwd, salt };
    // A concurrent registration loses on the unique index and maps to 409.
    with_db(&state, move |db| db.add_account(&account)).await?;
    info!("Account {} registered", uin);

    let token = create_token(&state.jwt_secret, uin)?;
    Ok((StatusCode::CREATED, Json(TokenResponse { uin, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let uin = req.uin;
    let account = with_db(&state, move |db| db.get_account_by_uin(uin))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash =
        PasswordHash::new(&account.pwd).map_err(|e| ApiError::Internal(e.to_string()))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let token = create_token(&state.jwt_secret, uin)?;
    Ok(Json(TokenResponse { uin, token }))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest("password too short".into()));
    }

    let (pwd, salt) = hash_password(&req.password)?;
    let uin = claims.sub;
    let updated = with_db(&state, move |db| db.update_password(uin, &pwd, &salt)).await?;
    if !updated {
        return Err(ApiError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Argon2id hash in PHC format plus the salt it was made with.
fn hash_password(password: &str) -> Result<(String, String), ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .to_string();

    Ok((hash, salt.as_str().to_string()))
}

pub fn create_token(secret: &str, uin: i64) -> Result<String, ApiError> {
    let claims = Claims {
        sub: uin,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.to_string()))
}
