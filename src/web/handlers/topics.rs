use super::assignment_tags::json_single;
use crate::models::{CreateReply, CreateTopic};
use crate::services::topics::TopicFilter;
use crate::web::error::AppResult;
use crate::web::extractors::{OptionalCaller, SignedIn};
use crate::web::state::AppState;
use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct TopicListParams {
    #[serde(rename = "assignmentTags")]
    pub assignment_tags: Option<String>,
    pub resolved: Option<String>,
    pub answered: Option<String>,
    pub page: Option<usize>,
}

impl TopicListParams {
    fn into_filter(self) -> TopicFilter {
        let resolved = self
            .resolved
            .as_deref()
            .and_then(TopicFilter::parse_flag)
            .or_else(|| self.answered.as_deref().and_then(TopicFilter::parse_flag));
        TopicFilter {
            tag_ids: self
                .assignment_tags
                .as_deref()
                .map(TopicFilter::parse_tag_ids)
                .unwrap_or_default(),
            resolved,
            page: self.page.unwrap_or(1),
        }
    }
}

/// GET /categories/:cid/topics
pub async fn list(
    State(state): State<Arc<AppState>>,
    OptionalCaller(caller): OptionalCaller,
    Path(cid): Path<i64>,
    Query(params): Query<TopicListParams>,
) -> AppResult<Json<serde_json::Value>> {
    let filter = params.into_filter();
    json_single(state.topics.list_category_topics(&caller, cid, &filter)?)
}

/// POST /categories/:cid/topics
pub async fn create(
    State(state): State<Arc<AppState>>,
    SignedIn(caller): SignedIn,
    Path(cid): Path<i64>,
    Json(body): Json<CreateTopic>,
) -> AppResult<Json<serde_json::Value>> {
    json_single(state.topics.create_topic(&caller, cid, &body)?)
}

/// GET /topics/:tid
pub async fn get(
    State(state): State<Arc<AppState>>,
    OptionalCaller(caller): OptionalCaller,
    Path(tid): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    json_single(state.topics.topic_with_posts(&caller, tid)?)
}

/// POST /topics/:tid
pub async fn reply(
    State(state): State<Arc<AppState>>,
    SignedIn(caller): SignedIn,
    Path(tid): Path<i64>,
    Json(body): Json<CreateReply>,
) -> AppResult<Json<serde_json::Value>> {
    json_single(state.topics.reply(&caller, tid, &body)?)
}

/// PUT /topics/:tid/resolve
pub async fn resolve(
    State(state): State<Arc<AppState>>,
    SignedIn(caller): SignedIn,
    Path(tid): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    json_single(state.topics.resolution().resolve(&caller, tid)?)
}

/// DELETE /topics/:tid/resolve
pub async fn unresolve(
    State(state): State<Arc<AppState>>,
    SignedIn(caller): SignedIn,
    Path(tid): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    json_single(state.topics.resolution().unresolve(&caller, tid)?)
}

/// GET /posts/:pid
pub async fn post(
    State(state): State<Arc<AppState>>,
    OptionalCaller(caller): OptionalCaller,
    Path(pid): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    json_single(state.topics.post(&caller, pid)?)
}
