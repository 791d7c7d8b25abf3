//! Feed source administration endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{error, info};

use newslog_core::{FeedSource, FeedSourceUpdate, NewFeedSource};

use super::{error_response, store_error_response};
use crate::AppState;

/// Feed source plus its derived health flag
#[derive(Debug, Serialize)]
struct FeedView {
    #[serde(flatten)]
    feed: FeedSource,
    failing: bool,
}

impl FeedView {
    fn new(feed: FeedSource, threshold: u32) -> Self {
        let failing = feed.is_failing(threshold);
        Self { feed, failing }
    }
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    success: bool,
    items_inserted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Create feed routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/feeds", get(list_feeds).post(create_feed))
        .route("/feeds/refresh", post(refresh_feeds))
        .route(
            "/feeds/{id}",
            get(get_feed).put(update_feed).delete(delete_feed),
        )
        .route("/feeds/{id}/deactivate", post(deactivate_feed))
}

/// GET /api/feeds
async fn list_feeds(State(state): State<AppState>) -> Response {
    match state.registry.all() {
        Ok(feeds) => {
            let views: Vec<FeedView> = feeds
                .into_iter()
                .map(|f| FeedView::new(f, state.failing_feed_threshold))
                .collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(e) => store_error_response(e),
    }
}

/// POST /api/feeds
async fn create_feed(
    State(state): State<AppState>,
    Json(new_feed): Json<NewFeedSource>,
) -> Response {
    match state.registry.create(&new_feed) {
        Ok(feed) => {
            info!(feed_id = feed.id, feed = %feed.feed_url, "Feed created");
            (
                StatusCode::CREATED,
                Json(FeedView::new(feed, state.failing_feed_threshold)),
            )
                .into_response()
        }
        Err(e) => store_error_response(e),
    }
}

/// GET /api/feeds/{id}
async fn get_feed(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.registry.find(id) {
        Ok(Some(feed)) => (
            StatusCode::OK,
            Json(FeedView::new(feed, state.failing_feed_threshold)),
        )
            .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("feed {} not found", id)),
        Err(e) => store_error_response(e),
    }
}

/// PUT /api/feeds/{id}
async fn update_feed(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(changes): Json<FeedSourceUpdate>,
) -> Response {
    match state.registry.update(id, &changes) {
        Ok(feed) => (
            StatusCode::OK,
            Json(FeedView::new(feed, state.failing_feed_threshold)),
        )
            .into_response(),
        Err(e) => store_error_response(e),
    }
}

/// POST /api/feeds/{id}/deactivate
async fn deactivate_feed(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.registry.deactivate(id) {
        Ok(feed) => (
            StatusCode::OK,
            Json(FeedView::new(feed, state.failing_feed_threshold)),
        )
            .into_response(),
        Err(e) => store_error_response(e),
    }
}

/// DELETE /api/feeds/{id}
async fn delete_feed(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.registry.delete(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_error_response(e),
    }
}

/// POST /api/feeds/refresh - run one ingestion pass synchronously.
/// Per-source failures only show up in failure counts and logs.
async fn refresh_feeds(State(state): State<AppState>) -> Response {
    match state.scheduler.run().await {
        Ok(report) => (
            StatusCode::OK,
            Json(RefreshResponse {
                success: true,
                items_inserted: report.items_inserted(),
                error: None,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Manual refresh failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RefreshResponse {
                    success: false,
                    items_inserted: 0,
                    error: Some(e.to_string()),
                }),
            )
                .into_response()
        }
    }
}
