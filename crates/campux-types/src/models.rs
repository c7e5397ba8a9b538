use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Moderation state of a post.
///
/// The persistence layer treats statuses as opaque values: it stores them and
/// compares them for equality, nothing more. Only the query wildcard and the
/// initial state of a new submission are named here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostStatus(String);

impl PostStatus {
    /// Query wildcard. Never a persisted post state, only a log `old_status`.
    pub const ANY: &'static str = "any";
    pub const PENDING_APPROVAL: &'static str = "pending_approval";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn any() -> Self {
        Self::new(Self::ANY)
    }

    pub fn pending_approval() -> Self {
        Self::new(Self::PENDING_APPROVAL)
    }

    pub fn is_any(&self) -> bool {
        self.0 == Self::ANY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PostStatus {
    fn default() -> Self {
        Self::pending_approval()
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PostStatus {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Assigned by the store on creation; any value set by the caller is overwritten.
    pub id: i64,
    pub uin: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub anon: bool,
    pub status: PostStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Append-only audit record of a post status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostLog {
    pub post_id: i64,
    /// uin of the actor that caused the transition.
    pub op: i64,
    pub old_status: PostStatus,
    pub new_status: PostStatus,
    #[serde(default)]
    pub comment: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub uin: i64,
    pub pwd: String,
    pub salt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub key: String,
    pub value: String,
}
