use crate::config::ForumConfig;
use crate::error::ForumResult;
use crate::Database;

/// Answers the membership questions the forum extensions ask of the host
/// platform's privilege system.
pub trait Privileges: Send + Sync {
    fn is_administrator(&self, uid: i64) -> ForumResult<bool>;

    fn is_moderator(&self, uid: i64, cid: i64) -> ForumResult<bool>;

    fn is_group_member(&self, uid: i64, group: &str) -> ForumResult<bool>;
}

/// Privileges backed by the `group_members` and `category_moderators` tables.
pub struct SqlPrivileges {
    db: Database,
    admin_group: String,
}

impl SqlPrivileges {
    pub fn new(db: Database, forum: &ForumConfig) -> Self {
        Self {
            db,
            admin_group: forum.admin_group.clone(),
        }
    }
}

impl Privileges for SqlPrivileges {
    fn is_administrator(&self, uid: i64) -> ForumResult<bool> {
        self.is_group_member(uid, &self.admin_group)
    }

    fn is_moderator(&self, uid: i64, cid: i64) -> ForumResult<bool> {
        if uid <= 0 {
            return Ok(false);
        }
        let conn = self.db.get()?;
        let found: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM category_moderators WHERE cid = ? AND uid = ?)",
            [cid, uid],
            |row| row.get(0),
        )?;
        Ok(found != 0)
    }

    fn is_group_member(&self, uid: i64, group: &str) -> ForumResult<bool> {
        if uid <= 0 {
            return Ok(false);
        }
        let conn = self.db.get()?;
        let found: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM group_members WHERE group_name = ?1 AND uid = ?2)",
            rusqlite::params![group, uid],
            |row| row.get(0),
        )?;
        Ok(found != 0)
    }
}
