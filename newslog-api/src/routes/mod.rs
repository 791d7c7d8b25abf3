//! API route definitions

mod feeds;
mod health;
mod items;
mod metrics;

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json, Router};
use tracing::error;

use newslog_services::StoreError;

use crate::AppState;

/// Liveness/readiness probes (mounted at the root)
pub fn health_routes() -> Router<AppState> {
    health::routes()
}

/// Create all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(feeds::routes())
        .merge(items::routes())
        .merge(metrics::routes())
}

/// `{"error": message}` with the given status
fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

/// Map a store error onto an HTTP status
fn store_error_response(e: StoreError) -> Response {
    match e {
        StoreError::NotFound { .. } => error_response(StatusCode::NOT_FOUND, e.to_string()),
        StoreError::DuplicateFeed(_) => error_response(StatusCode::CONFLICT, e.to_string()),
        StoreError::Invalid(_) => error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        other => {
            error!("Store error: {}", other);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal storage error")
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{HeaderMap, Method, Request, StatusCode},
        Router,
    };
    use chrono::{TimeZone, Utc};
    use tower::ServiceExt;

    use newslog_core::FixedClock;
    use newslog_feeds::{FeedError, FeedFetcher, FetchResult, SyndicationParser};
    use newslog_services::{Database, IngestionConfig};

    use crate::bootstrap::Services;
    use crate::AppState;

    const STUB_FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Stub</title>
  <link>https://stub.example/</link>
  <description>d</description>
  <item><title>First</title><link>https://stub.example/first</link><pubDate>Mon, 01 Jan 2024 08:00:00 GMT</pubDate></item>
  <item><title>Second</title><link>https://stub.example/second</link><pubDate>Tue, 02 Jan 2024 08:00:00 GMT</pubDate></item>
</channel></rss>"#;

    /// Serves `STUB_FEED` for stub.example and refuses everything else
    struct StubFetcher;

    #[async_trait]
    impl FeedFetcher for StubFetcher {
        async fn fetch(
            &self,
            url: &str,
            _prior_etag: Option<&str>,
            _prior_last_modified: Option<&str>,
        ) -> Result<FetchResult, FeedError> {
            if url.starts_with("https://stub.example/") {
                Ok(FetchResult::modified(STUB_FEED.as_bytes().to_vec()))
            } else {
                Err(FeedError::RequestFailed("connection refused".to_string()))
            }
        }
    }

    pub(crate) fn test_state() -> (Router, AppState) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ));
        let services = Services::from_parts(
            Database::open_in_memory().unwrap(),
            clock,
            Arc::new(StubFetcher),
            Arc::new(SyndicationParser),
            IngestionConfig::default(),
        );
        let state = services.into_state(3);
        (crate::app(state.clone()), state)
    }

    pub(crate) async fn get(app: Router, uri: &str) -> (StatusCode, HeaderMap, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, headers, body)
    }

    pub(crate) async fn send(
        app: Router,
        method: Method,
        uri: &str,
        json: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }
}
