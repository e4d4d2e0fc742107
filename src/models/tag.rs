use serde::{Deserialize, Serialize};

pub const DEFAULT_TAG_COLOR: &str = "#3498db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagWithCount {
    #[serde(flatten)]
    pub tag: Tag,
    pub count: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateTag {
    pub name: Option<String>,
    pub color: Option<String>,
    pub category: Option<String>,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTag {
    pub name: Option<String>,
    pub color: Option<String>,
    pub category: Option<String>,
}

impl UpdateTag {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.color.is_none() && self.category.is_none()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPostTags {
    pub tag_ids: Option<Vec<i64>>,
}
