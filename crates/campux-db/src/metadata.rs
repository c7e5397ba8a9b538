use serde::Deserialize;
use tracing::info;

use campux_types::models::Metadata;

use crate::error::{Result, StoreResult};
use crate::store::{DocumentStore, Filter, from_document, to_document};
use crate::{Database, METADATA_COLLECTION};

/// Site settings that must exist after startup, with their first-run values.
/// Existing values are never overwritten.
pub const PRESET_METADATA: &[(&str, &str)] = &[
    ("banner", "投稿前请阅读投稿规则！"),
    ("popup_announcement", "欢迎使用 Campux！"),
    (
        "post_rules",
        r#"[
    "投稿规则是数组",
    "每个元素是一个字符串"
]"#,
    ),
    (
        "services",
        r#"[
    {
        "name": "服务名称",
        "description": "服务也是数组形式，会显示在服务tab",
        "link": "https://url.to.service",
        "toast": "点击时的提示",
        "emoji": "🗺️"
    }
]"#,
    ),
    ("brand", "Campux 这个是你的墙的名称"),
    ("beianhao", "桂ICP备1145141919号-1"),
];

/// Inserts every preset key that is missing. Returns how many were inserted.
pub fn bootstrap(store: &dyn DocumentStore) -> StoreResult<usize> {
    let mut inserted = 0;

    for (key, value) in PRESET_METADATA {
        let exists = store.count(METADATA_COLLECTION, &Filter::new().eq("key", *key))?;
        if exists > 0 {
            continue;
        }

        let meta = Metadata {
            key: key.to_string(),
            value: value.to_string(),
        };
        store.insert(METADATA_COLLECTION, to_document(&meta)?)?;
        info!("Metadata default inserted: {}", key);
        inserted += 1;
    }

    Ok(inserted)
}

#[derive(Deserialize)]
struct ValueRow {
    value: String,
}

impl Database {
    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let doc = self
            .store
            .find_one(METADATA_COLLECTION, &Filter::new().eq("key", key), None)?;

        match doc {
            Some(doc) => Ok(Some(from_document::<ValueRow>(doc)?.value)),
            None => Ok(None),
        }
    }
}
