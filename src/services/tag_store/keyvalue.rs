use super::{apply_update, normalize_category, normalize_color, normalize_name, now, unique_ids, TagStore};
use crate::config::StorageBackend;
use crate::db::kv::{Kv, KvDatabase, Object};
use crate::error::{ForumError, ForumResult};
use crate::models::{Tag, UpdateTag};
use anyhow::anyhow;
use std::collections::HashSet;

const ALL_TAGS_KEY: &str = "assignment-tags:all";
const GLOBAL_KEY: &str = "global";
const NEXT_ID_FIELD: &str = "nextAssignmentTagId";

fn tag_key(id: i64) -> String {
    format!("assignment-tag:{}", id)
}

fn tag_posts_key(id: i64) -> String {
    format!("assignment-tag:{}:posts", id)
}

fn post_tags_key(pid: i64) -> String {
    format!("post:{}:assignment-tags", pid)
}

fn timestamp() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64
}

fn tag_fields(tag: &Tag) -> Vec<(&'static str, String)> {
    vec![
        ("id", tag.id.to_string()),
        ("name", tag.name.clone()),
        ("color", tag.color.clone()),
        ("category", tag.category.clone().unwrap_or_default()),
        ("createdAt", tag.created_at.clone()),
        ("updatedAt", tag.updated_at.clone()),
    ]
}

fn object_to_tag(object: Object) -> ForumResult<Tag> {
    let field = |name: &str| {
        object
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("assignment tag object is missing '{}'", name))
    };
    let id = field("id")?
        .parse::<i64>()
        .map_err(|e| anyhow!("assignment tag object has a bad id: {}", e))?;
    Ok(Tag {
        id,
        name: field("name")?,
        color: field("color")?,
        category: normalize_category(object.get("category").map(String::as_str)),
        created_at: field("createdAt")?,
        updated_at: field("updatedAt")?,
    })
}

fn parse_ids(members: Vec<String>) -> Vec<i64> {
    members.iter().filter_map(|m| m.parse().ok()).collect()
}

fn load_tag(kv: &Kv<'_>, id: i64) -> ForumResult<Option<Tag>> {
    kv.get_object(&tag_key(id))?.map(object_to_tag).transpose()
}

fn load_tags(kv: &Kv<'_>, ids: &[i64]) -> ForumResult<Vec<Tag>> {
    let keys: Vec<String> = ids.iter().map(|id| tag_key(*id)).collect();
    kv.get_objects(&keys)?
        .into_iter()
        .flatten()
        .map(object_to_tag)
        .collect()
}

fn ensure_tags_exist(kv: &Kv<'_>, ids: &[i64]) -> ForumResult<()> {
    for id in ids {
        if !kv.exists(&tag_key(*id))? {
            return Err(ForumError::NotFound("tag"));
        }
    }
    Ok(())
}

/// Tag store over the generic ordered-set key-value store.
///
/// Layout: `assignment-tag:{id}` holds the tag fields, `assignment-tags:all`
/// indexes every tag scored by id, and the association is kept from both
/// sides in `assignment-tag:{id}:posts` and `post:{pid}:assignment-tags`,
/// scored by the time it was made.
#[derive(Clone)]
pub struct KvTagStore {
    kv: KvDatabase,
}

impl KvTagStore {
    pub fn new(kv: KvDatabase) -> Self {
        Self { kv }
    }
}

impl TagStore for KvTagStore {
    fn backend(&self) -> StorageBackend {
        StorageBackend::KeyValue
    }

    fn create(&self, name: &str, color: Option<&str>, category: Option<&str>) -> ForumResult<Tag> {
        let name = normalize_name(name)?;
        let color = normalize_color(color)?;
        let category = normalize_category(category);

        self.kv.atomic(|kv| {
            let id = kv.incr_object_field(GLOBAL_KEY, NEXT_ID_FIELD)?;
            let created_at = now();
            let tag = Tag {
                id,
                name,
                color,
                category,
                updated_at: created_at.clone(),
                created_at,
            };
            kv.set_object(&tag_key(id), &tag_fields(&tag))?;
            kv.sorted_set_add(ALL_TAGS_KEY, id as f64, &id.to_string())?;
            Ok(tag)
        })
    }

    fn get(&self, id: i64) -> ForumResult<Option<Tag>> {
        self.kv.read(|kv| load_tag(kv, id))
    }

    fn get_all(&self) -> ForumResult<Vec<Tag>> {
        self.kv.read(|kv| {
            let ids = parse_ids(kv.get_sorted_set_range(ALL_TAGS_KEY)?);
            load_tags(kv, &ids)
        })
    }

    fn update(&self, id: i64, changes: &UpdateTag) -> ForumResult<Tag> {
        self.kv.atomic(|kv| {
            let existing = load_tag(kv, id)?.ok_or(ForumError::NotFound("tag"))?;
            let tag = apply_update(existing, changes)?;
            kv.set_object(&tag_key(id), &tag_fields(&tag))?;
            Ok(tag)
        })
    }

    fn delete(&self, id: i64) -> ForumResult<Tag> {
        self.kv.atomic(|kv| {
            let tag = load_tag(kv, id)?.ok_or(ForumError::NotFound("tag"))?;

            let pids = parse_ids(kv.get_sorted_set_range(&tag_posts_key(id))?);
            let post_keys: Vec<String> = pids.iter().map(|pid| post_tags_key(*pid)).collect();
            kv.sorted_sets_remove(&post_keys, &id.to_string())?;

            kv.delete(&tag_key(id))?;
            kv.delete(&tag_posts_key(id))?;
            kv.sorted_set_remove(ALL_TAGS_KEY, &id.to_string())?;
            Ok(tag)
        })
    }

    fn exists(&self, id: i64) -> ForumResult<bool> {
        self.kv.read(|kv| kv.exists(&tag_key(id)))
    }

    fn add_to_post(&self, pid: i64, tag_id: i64) -> ForumResult<()> {
        self.kv.atomic(|kv| {
            ensure_tags_exist(kv, &[tag_id])?;
            let post_key = post_tags_key(pid);
            if kv.is_sorted_set_member(&post_key, &tag_id.to_string())? {
                return Ok(());
            }
            let score = timestamp();
            kv.sorted_set_add(&post_key, score, &tag_id.to_string())?;
            kv.sorted_set_add(&tag_posts_key(tag_id), score, &pid.to_string())
        })
    }

    fn remove_from_post(&self, pid: i64, tag_id: i64) -> ForumResult<()> {
        self.kv.atomic(|kv| {
            kv.sorted_set_remove(&post_tags_key(pid), &tag_id.to_string())?;
            kv.sorted_set_remove(&tag_posts_key(tag_id), &pid.to_string())
        })
    }

    fn set_post_tags(&self, pid: i64, tag_ids: &[i64]) -> ForumResult<()> {
        let tag_ids = unique_ids(tag_ids);
        self.kv.atomic(|kv| {
            ensure_tags_exist(kv, &tag_ids)?;

            let post_key = post_tags_key(pid);
            let existing = parse_ids(kv.get_sorted_set_range(&post_key)?);
            if !existing.is_empty() {
                let tag_keys: Vec<String> = existing.iter().map(|id| tag_posts_key(*id)).collect();
                kv.sorted_sets_remove(&tag_keys, &pid.to_string())?;
                kv.delete(&post_key)?;
            }

            let score = timestamp();
            let mut entries = Vec::with_capacity(tag_ids.len() * 2);
            for tag_id in &tag_ids {
                entries.push((post_key.clone(), score, tag_id.to_string()));
                entries.push((tag_posts_key(*tag_id), score, pid.to_string()));
            }
            kv.sorted_set_add_bulk(&entries)
        })
    }

    fn get_post_tags(&self, pid: i64) -> ForumResult<Vec<Tag>> {
        let mut tags = self.kv.read(|kv| {
            let ids = parse_ids(kv.get_sorted_set_range(&post_tags_key(pid))?);
            load_tags(kv, &ids)
        })?;
        tags.sort_by_key(|t| t.id);
        Ok(tags)
    }

    fn get_tag_posts(&self, tag_id: i64) -> ForumResult<Vec<i64>> {
        self.kv
            .read(|kv| Ok(parse_ids(kv.get_sorted_set_rev_range(&tag_posts_key(tag_id))?)))
    }

    fn filter_posts_by_tags(&self, pids: &[i64], tag_ids: &[i64]) -> ForumResult<Vec<i64>> {
        if pids.is_empty() || tag_ids.is_empty() {
            return Ok(pids.to_vec());
        }

        let keys: Vec<String> = tag_ids.iter().map(|id| tag_posts_key(*id)).collect();
        let members = self.kv.read(|kv| kv.get_sorted_sets_members(&keys))?;
        let tagged: HashSet<i64> = members.into_iter().flat_map(parse_ids).collect();

        Ok(pids.iter().copied().filter(|pid| tagged.contains(pid)).collect())
    }
}
