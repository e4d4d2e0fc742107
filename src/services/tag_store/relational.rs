use super::{apply_update, normalize_category, normalize_color, normalize_name, now, unique_ids, TagStore};
use crate::config::StorageBackend;
use crate::error::{ForumError, ForumResult};
use crate::models::{Tag, TagWithCount, UpdateTag};
use crate::Database;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::HashSet;

const TAG_COLUMNS: &str = "id, name, color, category, created_at, updated_at";

/// Tag store over the `assignment_tags` and `post_tags` tables.
#[derive(Clone)]
pub struct SqlTagStore {
    db: Database,
}

impl SqlTagStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn row_to_tag(row: &Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        category: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

fn find_tag(conn: &Connection, id: i64) -> ForumResult<Option<Tag>> {
    let tag = conn
        .query_row(
            &format!("SELECT {} FROM assignment_tags WHERE id = ?", TAG_COLUMNS),
            [id],
            row_to_tag,
        )
        .optional()?;
    Ok(tag)
}

fn count_existing(conn: &Connection, ids: &[i64]) -> ForumResult<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let sql = format!(
        "SELECT COUNT(*) FROM assignment_tags WHERE id IN ({})",
        placeholders(ids.len())
    );
    let count: i64 = conn.query_row(&sql, params_from_iter(ids.iter()), |row| row.get(0))?;
    Ok(count as usize)
}

impl TagStore for SqlTagStore {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Relational
    }

    fn create(&self, name: &str, color: Option<&str>, category: Option<&str>) -> ForumResult<Tag> {
        let name = normalize_name(name)?;
        let color = normalize_color(color)?;
        let category = normalize_category(category);
        let created_at = now();

        let conn = self.db.get()?;
        conn.execute(
            "INSERT INTO assignment_tags (name, color, category, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![name, color, category, created_at],
        )?;

        Ok(Tag {
            id: conn.last_insert_rowid(),
            name,
            color,
            category,
            updated_at: created_at.clone(),
            created_at,
        })
    }

    fn get(&self, id: i64) -> ForumResult<Option<Tag>> {
        let conn = self.db.get()?;
        find_tag(&conn, id)
    }

    fn get_all(&self) -> ForumResult<Vec<Tag>> {
        let conn = self.db.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM assignment_tags ORDER BY id",
            TAG_COLUMNS
        ))?;
        let tags = stmt
            .query_map([], row_to_tag)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    fn update(&self, id: i64, changes: &UpdateTag) -> ForumResult<Tag> {
        let mut conn = self.db.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing = find_tag(&tx, id)?.ok_or(ForumError::NotFound("tag"))?;
        let tag = apply_update(existing, changes)?;
        tx.execute(
            "UPDATE assignment_tags SET name = ?1, color = ?2, category = ?3, updated_at = ?4
             WHERE id = ?5",
            params![tag.name, tag.color, tag.category, tag.updated_at, id],
        )?;
        tx.commit()?;
        Ok(tag)
    }

    fn delete(&self, id: i64) -> ForumResult<Tag> {
        let mut conn = self.db.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let tag = find_tag(&tx, id)?.ok_or(ForumError::NotFound("tag"))?;
        // post_tags rows go with the tag through ON DELETE CASCADE
        tx.execute("DELETE FROM assignment_tags WHERE id = ?", [id])?;
        tx.commit()?;
        Ok(tag)
    }

    fn exists(&self, id: i64) -> ForumResult<bool> {
        let conn = self.db.get()?;
        Ok(count_existing(&conn, &[id])? == 1)
    }

    fn add_to_post(&self, pid: i64, tag_id: i64) -> ForumResult<()> {
        let conn = self.db.get()?;
        if count_existing(&conn, &[tag_id])? == 0 {
            return Err(ForumError::NotFound("tag"));
        }
        conn.execute(
            "INSERT OR IGNORE INTO post_tags (post_id, tag_id, created_at) VALUES (?1, ?2, ?3)",
            params![pid, tag_id, now()],
        )?;
        Ok(())
    }

    fn remove_from_post(&self, pid: i64, tag_id: i64) -> ForumResult<()> {
        let conn = self.db.get()?;
        conn.execute(
            "DELETE FROM post_tags WHERE post_id = ? AND tag_id = ?",
            [pid, tag_id],
        )?;
        Ok(())
    }

    fn set_post_tags(&self, pid: i64, tag_ids: &[i64]) -> ForumResult<()> {
        let tag_ids = unique_ids(tag_ids);
        let mut conn = self.db.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if count_existing(&tx, &tag_ids)? != tag_ids.len() {
            return Err(ForumError::NotFound("tag"));
        }

        tx.execute("DELETE FROM post_tags WHERE post_id = ?", [pid])?;
        {
            let created_at = now();
            let mut stmt = tx.prepare(
                "INSERT INTO post_tags (post_id, tag_id, created_at) VALUES (?1, ?2, ?3)",
            )?;
            for tag_id in &tag_ids {
                stmt.execute(params![pid, tag_id, created_at])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_post_tags(&self, pid: i64) -> ForumResult<Vec<Tag>> {
        let conn = self.db.get()?;
        let mut stmt = conn.prepare(
            "SELECT t.id, t.name, t.color, t.category, t.created_at, t.updated_at
             FROM assignment_tags t
             JOIN post_tags pt ON pt.tag_id = t.id
             WHERE pt.post_id = ?
             ORDER BY t.id",
        )?;
        let tags = stmt
            .query_map([pid], row_to_tag)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    fn get_tag_posts(&self, tag_id: i64) -> ForumResult<Vec<i64>> {
        let conn = self.db.get()?;
        let mut stmt = conn.prepare(
            "SELECT post_id FROM post_tags WHERE tag_id = ? ORDER BY created_at DESC, rowid DESC",
        )?;
        let pids = stmt
            .query_map([tag_id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(pids)
    }

    fn filter_posts_by_tags(&self, pids: &[i64], tag_ids: &[i64]) -> ForumResult<Vec<i64>> {
        if pids.is_empty() || tag_ids.is_empty() {
            return Ok(pids.to_vec());
        }

        let conn = self.db.get()?;
        let sql = format!(
            "SELECT DISTINCT post_id FROM post_tags WHERE tag_id IN ({})",
            placeholders(tag_ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let tagged = stmt
            .query_map(params_from_iter(tag_ids.iter()), |row| row.get(0))?
            .collect::<Result<HashSet<i64>, _>>()?;

        Ok(pids.iter().copied().filter(|pid| tagged.contains(pid)).collect())
    }

    fn tag_usage(&self) -> ForumResult<Vec<TagWithCount>> {
        let conn = self.db.get()?;
        let mut stmt = conn.prepare(
            "SELECT t.id, t.name, t.color, t.category, t.created_at, t.updated_at,
                    COUNT(pt.post_id) AS count
             FROM assignment_tags t
             LEFT JOIN post_tags pt ON pt.tag_id = t.id
             GROUP BY t.id
             ORDER BY t.id",
        )?;
        let usage = stmt
            .query_map([], |row| {
                Ok(TagWithCount {
                    tag: row_to_tag(row)?,
                    count: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(usage)
    }
}
