//! Persistence of assignment tags and their post associations.
//!
//! Two interchangeable backends implement [`TagStore`]: [`SqlTagStore`] keeps
//! tags in the `assignment_tags`/`post_tags` tables, [`KvTagStore`] keeps them
//! as hash objects and sorted sets in the generic key-value store. The backend
//! is picked once at startup by [`open_tag_store`].

mod keyvalue;
mod relational;

pub use keyvalue::KvTagStore;
pub use relational::SqlTagStore;

use crate::config::StorageBackend;
use crate::db::kv::KvDatabase;
use crate::error::{ForumError, ForumResult};
use crate::models::{Tag, TagWithCount, UpdateTag, DEFAULT_TAG_COLOR};
use crate::Database;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

pub trait TagStore: Send + Sync {
    fn backend(&self) -> StorageBackend;

    fn create(&self, name: &str, color: Option<&str>, category: Option<&str>) -> ForumResult<Tag>;

    fn get(&self, id: i64) -> ForumResult<Option<Tag>>;

    /// All tags in insertion order.
    fn get_all(&self) -> ForumResult<Vec<Tag>>;

    fn update(&self, id: i64, changes: &UpdateTag) -> ForumResult<Tag>;

    /// Removes the tag together with every post association, returning the
    /// removed tag.
    fn delete(&self, id: i64) -> ForumResult<Tag>;

    fn exists(&self, id: i64) -> ForumResult<bool>;

    fn add_to_post(&self, pid: i64, tag_id: i64) -> ForumResult<()>;

    fn remove_from_post(&self, pid: i64, tag_id: i64) -> ForumResult<()>;

    /// Replaces the full tag set of a post. Either every tag is applied or
    /// nothing changes.
    fn set_post_tags(&self, pid: i64, tag_ids: &[i64]) -> ForumResult<()>;

    /// Tags of a post ordered by id.
    fn get_post_tags(&self, pid: i64) -> ForumResult<Vec<Tag>>;

    /// Posts carrying the tag, most recently tagged first.
    fn get_tag_posts(&self, tag_id: i64) -> ForumResult<Vec<i64>>;

    /// Keeps the posts of `pids` that carry at least one of `tag_ids`.
    /// Empty `pids` or `tag_ids` leave the input untouched.
    fn filter_posts_by_tags(&self, pids: &[i64], tag_ids: &[i64]) -> ForumResult<Vec<i64>>;

    fn tag_usage(&self) -> ForumResult<Vec<TagWithCount>> {
        Err(ForumError::BackendUnsupported("tag usage counts"))
    }
}

pub fn open_tag_store(backend: StorageBackend, db: &Database) -> Arc<dyn TagStore> {
    tracing::info!("Using {} assignment tag store", backend);
    match backend {
        StorageBackend::Relational => Arc::new(SqlTagStore::new(db.clone())),
        StorageBackend::KeyValue => Arc::new(KvTagStore::new(KvDatabase::new(db.clone()))),
    }
}

static COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid color regex"));

pub(crate) fn normalize_name(name: &str) -> ForumResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ForumError::invalid("tag name cannot be empty"));
    }
    if name.chars().count() > 255 {
        return Err(ForumError::invalid("tag name must be 255 characters or less"));
    }
    Ok(name.to_string())
}

pub(crate) fn normalize_color(color: Option<&str>) -> ForumResult<String> {
    match color.map(str::trim).filter(|c| !c.is_empty()) {
        None => Ok(DEFAULT_TAG_COLOR.to_string()),
        Some(c) if COLOR_RE.is_match(c) => Ok(c.to_string()),
        Some(c) => Err(ForumError::invalid(format!("'{}' is not a hex color", c))),
    }
}

pub(crate) fn normalize_category(category: Option<&str>) -> Option<String> {
    category
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
}

/// Drops repeated ids, keeping first occurrences in order.
pub(crate) fn unique_ids(ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Applies an update to a stored tag, validating the changed fields.
pub(crate) fn apply_update(mut tag: Tag, changes: &UpdateTag) -> ForumResult<Tag> {
    if let Some(name) = &changes.name {
        tag.name = normalize_name(name)?;
    }
    if let Some(color) = &changes.color {
        tag.color = normalize_color(Some(color))?;
    }
    if let Some(category) = &changes.category {
        tag.category = normalize_category(Some(category));
    }
    if !changes.is_empty() {
        tag.updated_at = now();
    }
    Ok(tag)
}

pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
