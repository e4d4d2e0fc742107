use super::handlers;
use super::state::AppState;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;

pub fn assignment_tag_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/assignment-tags/posts/:pid",
            get(handlers::assignment_tags::post_tags).put(handlers::assignment_tags::set_post_tags),
        )
        .route(
            "/assignment-tags/posts/:pid/:tag_id",
            post(handlers::assignment_tags::add_to_post)
                .delete(handlers::assignment_tags::remove_from_post),
        )
        .route(
            "/assignment-tags",
            post(handlers::assignment_tags::create).get(handlers::assignment_tags::list),
        )
        .route(
            "/assignment-tags/:id",
            get(handlers::assignment_tags::get)
                .put(handlers::assignment_tags::update)
                .delete(handlers::assignment_tags::delete),
        )
        .route(
            "/assignment-tags/:id/posts",
            get(handlers::assignment_tags::tag_posts),
        )
}

pub fn topic_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/categories/:cid/topics",
            get(handlers::topics::list).post(handlers::topics::create),
        )
        .route(
            "/topics/:tid",
            get(handlers::topics::get).post(handlers::topics::reply),
        )
        .route(
            "/topics/:tid/resolve",
            put(handlers::topics::resolve).delete(handlers::topics::unresolve),
        )
        .route("/posts/:pid", get(handlers::topics::post))
}

pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/admin/assignment-tags",
        get(handlers::admin::assignment_tags),
    )
}
