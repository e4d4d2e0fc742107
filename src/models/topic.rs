use serde::{Deserialize, Serialize};
use std::fmt;

use super::PostView;

/// Role a user holds when acting on a topic in a given category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForumRole {
    Admin,
    Moderator,
    User,
    Guest,
}

impl ForumRole {
    pub fn is_privileged(self) -> bool {
        matches!(self, Self::Admin | Self::Moderator)
    }
}

impl fmt::Display for ForumRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Moderator => write!(f, "moderator"),
            Self::User => write!(f, "user"),
            Self::Guest => write!(f, "guest"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedBy {
    pub uid: i64,
    pub role: ForumRole,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub tid: i64,
    pub cid: i64,
    pub uid: i64,
    pub title: String,
    pub main_pid: Option<i64>,
    pub timestamp: i64,
    pub is_resolved: bool,
    pub resolved_at: Option<i64>,
    pub resolved_by: Option<ResolvedBy>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicWithPosts {
    #[serde(flatten)]
    pub topic: Topic,
    pub posts: Vec<PostView>,
}

/// Entry of a category topic listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSummary {
    #[serde(flatten)]
    pub topic: Topic,
    pub main_post: Option<PostView>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTopic {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "super::deserialize_flag")]
    pub is_anonymous: bool,
    #[serde(default)]
    pub tags: Vec<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReply {
    pub content: Option<String>,
    #[serde(default, deserialize_with = "super::deserialize_flag")]
    pub is_anonymous: bool,
}
