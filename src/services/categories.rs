use crate::error::{ForumError, ForumResult};
use crate::Database;
use rusqlite::OptionalExtension;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub cid: i64,
    pub name: String,
}

pub fn create_category(db: &Database, name: &str) -> ForumResult<Category> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ForumError::invalid("category name cannot be empty"));
    }
    let conn = db.get()?;
    conn.execute("INSERT INTO categories (name) VALUES (?)", [name])?;
    Ok(Category {
        cid: conn.last_insert_rowid(),
        name: name.to_string(),
    })
}

pub fn get_category(db: &Database, cid: i64) -> ForumResult<Option<Category>> {
    let conn = db.get()?;
    let category = conn
        .query_row(
            "SELECT cid, name FROM categories WHERE cid = ?",
            [cid],
            |row| {
                Ok(Category {
                    cid: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(category)
}

pub fn add_moderator(db: &Database, cid: i64, uid: i64) -> ForumResult<()> {
    if get_category(db, cid)?.is_none() {
        return Err(ForumError::NotFound("category"));
    }
    let conn = db.get()?;
    conn.execute(
        "INSERT OR IGNORE INTO category_moderators (cid, uid) VALUES (?, ?)",
        [cid, uid],
    )?;
    Ok(())
}
