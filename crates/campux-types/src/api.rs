use serde::{Deserialize, Serialize};

use crate::models::PostStatus;

// -- JWT Claims --

/// JWT claims shared by the token issuer (auth handlers) and the
/// authentication middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account uin.
    pub sub: i64,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub uin: i64,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub uin: i64,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub uin: i64,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub password: String,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub text: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub anon: bool,
}

#[derive(Debug, Serialize)]
pub struct CreatePostResponse {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct PostListQuery {
    /// `-1` lists posts of every author.
    #[serde(default = "default_uin")]
    pub uin: i64,
    #[serde(default = "PostStatus::any")]
    pub status: PostStatus,
    /// Sort direction on `created_at`: `1` oldest first, `-1` newest first.
    #[serde(default = "default_time_order")]
    pub time_order: i32,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_uin() -> i64 {
    -1
}

fn default_time_order() -> i32 {
    -1
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    10
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusRequest {
    pub status: PostStatus,
    #[serde(default)]
    pub comment: String,
}

// -- Metadata --

#[derive(Debug, Serialize)]
pub struct MetadataResponse {
    pub key: String,
    pub value: String,
}
