use serde::Serialize;

use super::Tag;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub pid: i64,
    pub tid: i64,
    pub uid: i64,
    pub content: String,
    pub is_anonymous: bool,
    pub timestamp: i64,
}

/// Author block attached to a rendered post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostUser {
    pub uid: i64,
    pub username: String,
    pub displayname: String,
    pub userslug: String,
    pub picture: String,
    pub signature: String,
    #[serde(rename = "icon:text")]
    pub icon_text: String,
    #[serde(rename = "icon:bgColor")]
    pub icon_bg_color: String,
    #[serde(rename = "selectedGroups")]
    pub selected_groups: Vec<String>,
    pub custom_profile_info: Vec<String>,
}

/// A post as a particular viewer sees it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub pid: i64,
    pub tid: i64,
    pub content: String,
    pub timestamp: i64,
    pub is_anonymous: bool,
    /// Real author; never serialized so masking cannot leak it.
    #[serde(skip)]
    pub author_uid: i64,
    pub user: Option<PostUser>,
    pub assignment_tags: Vec<Tag>,
    pub self_post: bool,
    #[serde(rename = "display_edit_tools")]
    pub display_edit_tools: bool,
    #[serde(rename = "display_delete_tools")]
    pub display_delete_tools: bool,
    #[serde(rename = "display_moderator_tools")]
    pub display_moderator_tools: bool,
    #[serde(rename = "display_move_tools")]
    pub display_move_tools: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_anonymous_to_instructor: Option<bool>,
}
