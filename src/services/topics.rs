use super::anonymity::{mask_anonymous_topic, modify_posts_by_privilege, TopicPrivileges};
use super::categories::get_category;
use super::privileges::Privileges;
use super::resolution::ResolutionTracker;
use super::tag_store::TagStore;
use super::users;
use crate::error::{ForumError, ForumResult};
use crate::models::{
    Caller, CreateReply, CreateTopic, Post, PostUser, PostView, ResolvedBy, Topic, TopicSummary,
    TopicWithPosts, User,
};
use crate::Database;
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

const TOPIC_COLUMNS: &str =
    "tid, cid, uid, title, main_pid, timestamp, is_resolved, resolved_at, resolved_by";
const POST_COLUMNS: &str = "pid, tid, uid, content, is_anonymous, timestamp";

const ICON_COLORS: [&str; 8] = [
    "#f44336", "#e91e63", "#9c27b0", "#673ab7", "#3f51b5", "#009688", "#ff5722", "#795548",
];

fn row_to_topic(row: &Row) -> rusqlite::Result<Topic> {
    let resolved_by: Option<String> = row.get(8)?;
    Ok(Topic {
        tid: row.get(0)?,
        cid: row.get(1)?,
        uid: row.get(2)?,
        title: row.get(3)?,
        main_pid: row.get(4)?,
        timestamp: row.get(5)?,
        is_resolved: row.get::<_, i64>(6)? != 0,
        resolved_at: row.get(7)?,
        resolved_by: resolved_by.and_then(|s| serde_json::from_str::<ResolvedBy>(&s).ok()),
    })
}

fn row_to_post(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        pid: row.get(0)?,
        tid: row.get(1)?,
        uid: row.get(2)?,
        content: row.get(3)?,
        is_anonymous: row.get::<_, i64>(4)? != 0,
        timestamp: row.get(5)?,
    })
}

pub fn get_topic(db: &Database, tid: i64) -> ForumResult<Option<Topic>> {
    let conn = db.get()?;
    let topic = conn
        .query_row(
            &format!("SELECT {} FROM topics WHERE tid = ?", TOPIC_COLUMNS),
            [tid],
            row_to_topic,
        )
        .optional()?;
    Ok(topic)
}

pub fn get_post(db: &Database, pid: i64) -> ForumResult<Option<Post>> {
    let conn = db.get()?;
    let post = conn
        .query_row(
            &format!("SELECT {} FROM posts WHERE pid = ?", POST_COLUMNS),
            [pid],
            row_to_post,
        )
        .optional()?;
    Ok(post)
}

pub fn get_topic_posts(db: &Database, tid: i64) -> ForumResult<Vec<Post>> {
    let conn = db.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM posts WHERE tid = ? ORDER BY pid",
        POST_COLUMNS
    ))?;
    let posts = stmt
        .query_map([tid], row_to_post)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

/// Stores a post. The anonymity flag only sticks for signed-in authors.
fn insert_post(db: &Database, tid: i64, uid: i64, content: &str, is_anonymous: bool) -> ForumResult<Post> {
    let is_anonymous = is_anonymous && uid > 0;
    let timestamp = chrono::Utc::now().timestamp_millis();
    let conn = db.get()?;
    conn.execute(
        "INSERT INTO posts (tid, uid, content, is_anonymous, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![tid, uid, content, is_anonymous as i64, timestamp],
    )?;
    Ok(Post {
        pid: conn.last_insert_rowid(),
        tid,
        uid,
        content: content.to_string(),
        is_anonymous,
        timestamp,
    })
}

fn required_text(value: Option<&str>, field: &str) -> ForumResult<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or_else(|| ForumError::invalid(format!("{} is required", field)))
}

fn post_user(user: &User) -> PostUser {
    let icon_text = user
        .displayname
        .chars()
        .next()
        .map(|c| c.to_uppercase().to_string())
        .unwrap_or_default();
    PostUser {
        uid: user.uid,
        username: user.username.clone(),
        displayname: user.displayname.clone(),
        userslug: user.userslug.clone(),
        picture: user.picture.clone(),
        signature: user.signature.clone(),
        icon_text,
        icon_bg_color: ICON_COLORS[(user.uid.unsigned_abs() as usize) % ICON_COLORS.len()]
            .to_string(),
        selected_groups: user.groups.clone(),
        custom_profile_info: Vec::new(),
    }
}

/// Filters accepted by category topic listings.
#[derive(Debug, Clone, Default)]
pub struct TopicFilter {
    /// OR filter over the tags of each topic's main post. Empty means no
    /// tag filtering.
    pub tag_ids: Vec<i64>,
    pub resolved: Option<bool>,
    pub page: usize,
}

impl TopicFilter {
    /// Parses a comma-separated `assignmentTags` value. Whitespace is
    /// tolerated and anything that is not a positive integer is dropped.
    pub fn parse_tag_ids(raw: &str) -> Vec<i64> {
        raw.split(',')
            .filter_map(|part| part.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .collect()
    }

    pub fn parse_flag(raw: &str) -> Option<bool> {
        match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicPage {
    pub topics: Vec<TopicSummary>,
    pub topic_count: usize,
    pub page: usize,
    pub page_count: usize,
}

/// Topic and post operations with the annotation hooks applied: anonymity
/// on create, tags on the main post, auto-resolution on reply and author
/// masking on render.
#[derive(Clone)]
pub struct TopicService {
    db: Database,
    tags: Arc<dyn TagStore>,
    privileges: Arc<dyn Privileges>,
    resolution: ResolutionTracker,
    topics_per_page: usize,
}

impl TopicService {
    pub fn new(
        db: Database,
        tags: Arc<dyn TagStore>,
        privileges: Arc<dyn Privileges>,
        topics_per_page: usize,
    ) -> Self {
        let resolution = ResolutionTracker::new(db.clone(), privileges.clone());
        Self {
            db,
            tags,
            privileges,
            resolution,
            topics_per_page: topics_per_page.max(1),
        }
    }

    pub fn resolution(&self) -> &ResolutionTracker {
        &self.resolution
    }

    pub fn create_topic(&self, caller: &Caller, cid: i64, data: &CreateTopic) -> ForumResult<TopicWithPosts> {
        if caller.is_guest() {
            return Err(ForumError::Unauthenticated);
        }
        let title = required_text(data.title.as_deref(), "title")?;
        let content = required_text(data.content.as_deref(), "content")?;
        if get_category(&self.db, cid)?.is_none() {
            return Err(ForumError::NotFound("category"));
        }
        for tag_id in &data.tags {
            if !self.tags.exists(*tag_id)? {
                return Err(ForumError::NotFound("tag"));
            }
        }

        let tid = {
            let conn = self.db.get()?;
            conn.execute(
                "INSERT INTO topics (cid, uid, title, timestamp, is_resolved) VALUES (?1, ?2, ?3, ?4, 0)",
                params![cid, caller.uid, title, chrono::Utc::now().timestamp_millis()],
            )?;
            conn.last_insert_rowid()
        };

        let post = insert_post(&self.db, tid, caller.uid, &content, data.is_anonymous)?;
        {
            let conn = self.db.get()?;
            conn.execute(
                "UPDATE topics SET main_pid = ? WHERE tid = ?",
                [post.pid, tid],
            )?;
        }
        if !data.tags.is_empty() {
            self.tags.set_post_tags(post.pid, &data.tags)?;
        }

        tracing::debug!("Created topic {} in category {}", tid, cid);
        self.topic_with_posts(caller, tid)
    }

    pub fn reply(&self, caller: &Caller, tid: i64, data: &CreateReply) -> ForumResult<PostView> {
        if caller.is_guest() {
            return Err(ForumError::Unauthenticated);
        }
        let content = required_text(data.content.as_deref(), "content")?;
        let topic = get_topic(&self.db, tid)?.ok_or(ForumError::NotFound("topic"))?;

        let post = insert_post(&self.db, tid, caller.uid, &content, data.is_anonymous)?;
        self.resolution.auto_resolve_if_needed(tid, caller.uid)?;

        let privileges = self.topic_privileges(caller, &topic)?;
        let mut views = self.render_posts(&privileges, vec![post])?;
        views.pop().ok_or(ForumError::NotFound("post"))
    }

    pub fn topic_with_posts(&self, caller: &Caller, tid: i64) -> ForumResult<TopicWithPosts> {
        let mut topic = get_topic(&self.db, tid)?.ok_or(ForumError::NotFound("topic"))?;
        let privileges = self.topic_privileges(caller, &topic)?;
        let posts = self.render_posts(&privileges, get_topic_posts(&self.db, tid)?)?;
        let main_post = posts.iter().find(|p| Some(p.pid) == topic.main_pid);
        mask_anonymous_topic(&mut topic, main_post, &privileges);
        Ok(TopicWithPosts { topic, posts })
    }

    pub fn post(&self, caller: &Caller, pid: i64) -> ForumResult<PostView> {
        let post = get_post(&self.db, pid)?.ok_or(ForumError::NotFound("post"))?;
        let topic = get_topic(&self.db, post.tid)?.ok_or(ForumError::NotFound("topic"))?;
        let privileges = self.topic_privileges(caller, &topic)?;
        let mut views = self.render_posts(&privileges, vec![post])?;
        views.pop().ok_or(ForumError::NotFound("post"))
    }

    pub fn list_category_topics(&self, caller: &Caller, cid: i64, filter: &TopicFilter) -> ForumResult<TopicPage> {
        if get_category(&self.db, cid)?.is_none() {
            return Err(ForumError::NotFound("category"));
        }

        let mut topics = {
            let conn = self.db.get()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM topics
                 WHERE cid = ?1 AND (?2 IS NULL OR is_resolved = ?2)
                 ORDER BY timestamp DESC, tid DESC",
                TOPIC_COLUMNS
            ))?;
            let resolved = filter.resolved.map(i64::from);
            let topics = stmt
                .query_map(params![cid, resolved], row_to_topic)?
                .collect::<Result<Vec<_>, _>>()?;
            topics
        };

        if !filter.tag_ids.is_empty() {
            let main_pids: Vec<i64> = topics.iter().filter_map(|t| t.main_pid).collect();
            let tagged = self.tags.filter_posts_by_tags(&main_pids, &filter.tag_ids)?;
            topics.retain(|t| t.main_pid.map_or(false, |pid| tagged.contains(&pid)));
        }

        let topic_count = topics.len();
        let page_count = topic_count.div_ceil(self.topics_per_page).max(1);
        let page = filter.page.max(1);
        let start = (page - 1).saturating_mul(self.topics_per_page);

        let mut summaries = Vec::new();
        for mut topic in topics.into_iter().skip(start).take(self.topics_per_page) {
            let privileges = self.topic_privileges(caller, &topic)?;
            let main_post = match topic.main_pid {
                Some(pid) => match get_post(&self.db, pid)? {
                    Some(post) => self.render_posts(&privileges, vec![post])?.pop(),
                    None => None,
                },
                None => None,
            };
            mask_anonymous_topic(&mut topic, main_post.as_ref(), &privileges);
            summaries.push(TopicSummary { topic, main_post });
        }

        Ok(TopicPage {
            topics: summaries,
            topic_count,
            page,
            page_count,
        })
    }

    fn topic_privileges(&self, caller: &Caller, topic: &Topic) -> ForumResult<TopicPrivileges> {
        let can_moderate = !caller.is_guest()
            && (self.privileges.is_administrator(caller.uid)?
                || self.privileges.is_moderator(caller.uid, topic.cid)?);
        Ok(TopicPrivileges {
            uid: caller.uid,
            can_moderate,
        })
    }

    fn render_posts(&self, privileges: &TopicPrivileges, posts: Vec<Post>) -> ForumResult<Vec<PostView>> {
        let mut uids: Vec<i64> = posts.iter().map(|p| p.uid).collect();
        uids.sort_unstable();
        uids.dedup();
        let authors: HashMap<i64, User> = users::get_users(&self.db, &uids)?;

        let mut views = Vec::with_capacity(posts.len());
        for post in posts {
            views.push(PostView {
                pid: post.pid,
                tid: post.tid,
                content: post.content,
                timestamp: post.timestamp,
                is_anonymous: post.is_anonymous,
                author_uid: post.uid,
                user: authors.get(&post.uid).map(post_user),
                assignment_tags: self.tags.get_post_tags(post.pid)?,
                self_post: false,
                display_edit_tools: false,
                display_delete_tools: false,
                display_moderator_tools: false,
                display_move_tools: false,
                is_anonymous_to_instructor: None,
            });
        }

        modify_posts_by_privilege(&mut views, privileges);
        Ok(views)
    }
}
