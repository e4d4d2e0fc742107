use crate::error::ForumError;
use crate::models::Tag;
use crate::web::error::AppResult;
use crate::web::extractors::SignedIn;
use crate::web::state::AppState;
use axum::extract::State;
use axum::response::Html;
use serde::Serialize;
use std::sync::Arc;
use tera::Context;

#[derive(Serialize)]
struct AdminTagRow {
    tag: Tag,
    count: Option<i64>,
}

/// GET /admin/assignment-tags
///
/// Storage failures are shown on the page instead of failing the request.
pub async fn assignment_tags(
    State(state): State<Arc<AppState>>,
    SignedIn(caller): SignedIn,
) -> AppResult<Html<String>> {
    if !state.tags.is_instructor_or_admin(&caller)? {
        return Err(ForumError::Forbidden.into());
    }

    let (rows, error) = match state.tags.usage(&caller) {
        Ok(usage) => (
            usage
                .into_iter()
                .map(|u| AdminTagRow {
                    tag: u.tag,
                    count: Some(u.count),
                })
                .collect(),
            None,
        ),
        Err(ForumError::BackendUnsupported(what)) => match state.tags.list(&caller) {
            Ok(tags) => (
                tags.into_iter()
                    .map(|tag| AdminTagRow { tag, count: None })
                    .collect(),
                Some(format!(
                    "{} requires the relational storage backend; the {} backend is active",
                    what, state.config.storage.backend
                )),
            ),
            Err(e) => (Vec::new(), Some(e.to_string())),
        },
        Err(e) => {
            tracing::error!("Failed to load assignment tags for admin page: {}", e);
            (Vec::new(), Some(e.to_string()))
        }
    };

    let mut ctx = Context::new();
    ctx.insert("tags", &rows);
    ctx.insert("error", &error);
    ctx.insert("backend", &state.config.storage.backend.to_string());

    let html = state
        .templates
        .render("admin/assignment-tags.html", &ctx)
        .map_err(|e| ForumError::Internal(e.into()))?;
    Ok(Html(html))
}
