use crate::models::{CreateTag, SetPostTags, UpdateTag};
use crate::web::error::AppResult;
use crate::web::extractors::SignedIn;
use crate::web::state::AppState;
use axum::extract::{Path, State};
use axum::response::Json;
use serde::Serialize;
use std::sync::Arc;

pub(super) fn json_single<T: Serialize>(data: T) -> AppResult<Json<serde_json::Value>> {
    Ok(Json(serde_json::json!({
        "data": serde_json::to_value(data).map_err(crate::error::ForumError::from)?,
    })))
}

/// POST /assignment-tags
pub async fn create(
    State(state): State<Arc<AppState>>,
    SignedIn(caller): SignedIn,
    Json(body): Json<CreateTag>,
) -> AppResult<Json<serde_json::Value>> {
    json_single(state.tags.create(&caller, &body)?)
}

/// GET /assignment-tags
pub async fn list(
    State(state): State<Arc<AppState>>,
    SignedIn(caller): SignedIn,
) -> AppResult<Json<serde_json::Value>> {
    json_single(state.tags.list(&caller)?)
}

/// GET /assignment-tags/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    SignedIn(caller): SignedIn,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    json_single(state.tags.get(&caller, id)?)
}

/// PUT /assignment-tags/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    SignedIn(caller): SignedIn,
    Path(id): Path<i64>,
    Json(body): Json<UpdateTag>,
) -> AppResult<Json<serde_json::Value>> {
    json_single(state.tags.update(&caller, id, &body)?)
}

/// DELETE /assignment-tags/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    SignedIn(caller): SignedIn,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    json_single(state.tags.delete(&caller, id)?)
}

/// GET /assignment-tags/:id/posts
pub async fn tag_posts(
    State(state): State<Arc<AppState>>,
    SignedIn(caller): SignedIn,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    json_single(state.tags.get_tag_posts(&caller, id)?)
}

/// GET /assignment-tags/posts/:pid
pub async fn post_tags(
    State(state): State<Arc<AppState>>,
    SignedIn(caller): SignedIn,
    Path(pid): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    json_single(state.tags.get_post_tags(&caller, pid)?)
}

/// PUT /assignment-tags/posts/:pid
pub async fn set_post_tags(
    State(state): State<Arc<AppState>>,
    SignedIn(caller): SignedIn,
    Path(pid): Path<i64>,
    Json(body): Json<SetPostTags>,
) -> AppResult<Json<serde_json::Value>> {
    json_single(state.tags.set_post_tags(&caller, pid, body.tag_ids.as_deref())?)
}

/// POST /assignment-tags/posts/:pid/:tag_id
pub async fn add_to_post(
    State(state): State<Arc<AppState>>,
    SignedIn(caller): SignedIn,
    Path((pid, tag_id)): Path<(i64, i64)>,
) -> AppResult<Json<serde_json::Value>> {
    json_single(state.tags.add_to_post(&caller, pid, tag_id)?)
}

/// DELETE /assignment-tags/posts/:pid/:tag_id
pub async fn remove_from_post(
    State(state): State<Arc<AppState>>,
    SignedIn(caller): SignedIn,
    Path((pid, tag_id)): Path<(i64, i64)>,
) -> AppResult<Json<serde_json::Value>> {
    json_single(state.tags.remove_from_post(&caller, pid, tag_id)?)
}
