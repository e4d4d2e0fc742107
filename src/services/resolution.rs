//! Resolved/unresolved status of topics.
//!
//! A topic moves to resolved when an administrator or a moderator of its
//! category replies to it, or when one of them resolves it explicitly. Only
//! an explicit unresolve moves it back; replies never do.

use super::privileges::Privileges;
use super::topics::get_topic;
use crate::error::{ForumError, ForumResult};
use crate::models::{Caller, ForumRole, ResolvedBy, Topic};
use crate::Database;
use rusqlite::params;
use std::sync::Arc;

#[derive(Clone)]
pub struct ResolutionTracker {
    db: Database,
    privileges: Arc<dyn Privileges>,
}

impl ResolutionTracker {
    pub fn new(db: Database, privileges: Arc<dyn Privileges>) -> Self {
        Self { db, privileges }
    }

    /// Admin takes precedence over moderator; uid <= 0 is always a guest.
    pub fn user_role_in_category(&self, uid: i64, cid: i64) -> ForumResult<ForumRole> {
        if uid <= 0 {
            return Ok(ForumRole::Guest);
        }
        if self.privileges.is_administrator(uid)? {
            return Ok(ForumRole::Admin);
        }
        if self.privileges.is_moderator(uid, cid)? {
            return Ok(ForumRole::Moderator);
        }
        Ok(ForumRole::User)
    }

    pub fn can_auto_resolve(&self, uid: i64, cid: i64) -> ForumResult<bool> {
        Ok(self.user_role_in_category(uid, cid)?.is_privileged())
    }

    /// Marks the topic resolved by `uid`. A topic that is already resolved
    /// keeps its original resolvedAt/resolvedBy.
    pub fn mark_resolved(&self, tid: i64, uid: i64) -> ForumResult<Topic> {
        let topic = get_topic(&self.db, tid)?.ok_or(ForumError::NotFound("topic"))?;
        if topic.is_resolved {
            return Ok(topic);
        }

        let resolved_by = ResolvedBy {
            uid,
            role: self.user_role_in_category(uid, topic.cid)?,
        };
        let resolved_at = chrono::Utc::now().timestamp_millis();

        let conn = self.db.get()?;
        let changed = conn.execute(
            "UPDATE topics SET is_resolved = 1, resolved_at = ?1, resolved_by = ?2
             WHERE tid = ?3 AND is_resolved = 0",
            params![resolved_at, serde_json::to_string(&resolved_by)?, tid],
        )?;
        drop(conn);

        if changed > 0 {
            tracing::info!(
                "Topic {} resolved by uid {} ({})",
                tid,
                resolved_by.uid,
                resolved_by.role
            );
        }
        get_topic(&self.db, tid)?.ok_or(ForumError::NotFound("topic"))
    }

    /// Resets the topic to unresolved regardless of its prior state.
    pub fn mark_unresolved(&self, tid: i64) -> ForumResult<Topic> {
        let conn = self.db.get()?;
        let changed = conn.execute(
            "UPDATE topics SET is_resolved = 0, resolved_at = NULL, resolved_by = NULL
             WHERE tid = ?",
            [tid],
        )?;
        drop(conn);

        if changed == 0 {
            return Err(ForumError::NotFound("topic"));
        }
        tracing::info!("Topic {} marked unresolved", tid);
        get_topic(&self.db, tid)?.ok_or(ForumError::NotFound("topic"))
    }

    /// Called after a reply is stored. Returns whether the reply resolved the
    /// topic. Unknown topics are ignored.
    pub fn auto_resolve_if_needed(&self, tid: i64, uid: i64) -> ForumResult<bool> {
        let Some(topic) = get_topic(&self.db, tid)? else {
            return Ok(false);
        };
        if topic.is_resolved || !self.can_auto_resolve(uid, topic.cid)? {
            return Ok(false);
        }
        self.mark_resolved(tid, uid)?;
        Ok(true)
    }

    /// Explicit resolve action; only admins and moderators of the topic's
    /// category may take it.
    pub fn resolve(&self, caller: &Caller, tid: i64) -> ForumResult<Topic> {
        let topic = self.authorize(caller, tid)?;
        self.mark_resolved(topic.tid, caller.uid)
    }

    pub fn unresolve(&self, caller: &Caller, tid: i64) -> ForumResult<Topic> {
        let topic = self.authorize(caller, tid)?;
        self.mark_unresolved(topic.tid)
    }

    fn authorize(&self, caller: &Caller, tid: i64) -> ForumResult<Topic> {
        if caller.is_guest() {
            return Err(ForumError::Unauthenticated);
        }
        let topic = get_topic(&self.db, tid)?.ok_or(ForumError::NotFound("topic"))?;
        if !self.can_auto_resolve(caller.uid, topic.cid)? {
            return Err(ForumError::Forbidden);
        }
        Ok(topic)
    }
}
