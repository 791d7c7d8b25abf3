//! Curation inbox endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use newslog_core::{Item, ItemFilter, ItemStatus, Pagination};

use super::{error_response, store_error_response};
use crate::AppState;

/// Query parameters for listing items
#[derive(Debug, Deserialize)]
pub struct ItemsQuery {
    /// `new` (default), `discarded`, `curated` or `all`
    pub status: Option<String>,
    pub feed_id: Option<i64>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

#[derive(Debug, Serialize)]
struct ItemsPage {
    items: Vec<Item>,
    page: u32,
    limit: u32,
    total: usize,
}

/// Create item routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items))
        .route("/items/{id}", get(get_item))
        .route("/items/{id}/status", post(update_status))
}

/// GET /api/items
async fn list_items(State(state): State<AppState>, Query(params): Query<ItemsQuery>) -> Response {
    let status = match params.status.as_deref().map(str::trim) {
        None | Some("") => Some(ItemStatus::New),
        Some("all") => None,
        Some(raw) => match raw.parse::<ItemStatus>() {
            Ok(status) => Some(status),
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        },
    };

    let filter = ItemFilter {
        status,
        feed_id: params.feed_id,
    };
    let page = Pagination::new(params.page, params.limit);

    let result = state
        .items
        .list(&filter, page)
        .and_then(|items| Ok((items, state.items.count(&filter)?)));

    match result {
        Ok((items, total)) => (
            StatusCode::OK,
            Json(ItemsPage {
                items,
                page: page.page,
                limit: page.limit,
                total,
            }),
        )
            .into_response(),
        Err(e) => store_error_response(e),
    }
}

/// GET /api/items/{id}
async fn get_item(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.items.find(id) {
        Ok(Some(item)) => (StatusCode::OK, Json(item)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("item {} not found", id)),
        Err(e) => store_error_response(e),
    }
}

/// POST /api/items/{id}/status
async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<StatusUpdate>,
) -> Response {
    let status = match body.status.parse::<ItemStatus>() {
        Ok(status) => status,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let result = state
        .items
        .update_status(id, status)
        .and_then(|()| state.items.find(id));

    match result {
        Ok(Some(item)) => (StatusCode::OK, Json(item)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("item {} not found", id)),
        Err(e) => store_error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use crate::routes::tests::{get, send, test_state};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_inbox_listing_and_curation() {
        let (app, state) = test_state();
        let feed = state
            .registry
            .create(&newslog_core::NewFeedSource::new(
                "Stub",
                "https://stub.example/feed",
                "",
            ))
            .unwrap();
        state.scheduler.run().await.unwrap();

        let (status, _, body) = get(app.clone(), "/api/items").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["limit"], 25);
        // Newest first
        assert_eq!(body["items"][0]["url"], "https://stub.example/second");
        let id = body["items"][0]["id"].as_i64().unwrap();

        let (status, body) = send(
            app.clone(),
            Method::POST,
            &format!("/api/items/{}/status", id),
            json!({"status": "ignored"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "discarded");

        let (_, _, body) = get(app.clone(), "/api/items?status=discarded").await;
        assert_eq!(body["total"], 1);

        let (_, _, body) = get(
            app.clone(),
            &format!("/api/items?status=all&feed_id={}&limit=1&page=2", feed.id),
        )
        .await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["items"].as_array().unwrap().len(), 1);

        let (status, _, body) = get(app.clone(), "/api/items?page=4294967295&limit=100").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["items"].as_array().unwrap().is_empty());

        let (status, _, _) = get(app.clone(), "/api/items?status=published").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            app.clone(),
            Method::POST,
            "/api/items/9999/status",
            json!({"status": "curated"}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, body) = get(app, &format!("/api/items/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id);
    }
}
