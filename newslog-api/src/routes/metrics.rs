//! Dashboard counters

use axum::{extract::State, http::StatusCode, response::IntoResponse, response::Response, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use newslog_services::StoreError;

use super::store_error_response;
use crate::AppState;

#[derive(Debug, Serialize)]
struct MetricsResponse {
    inbox_count: usize,
    last_fetch: Option<DateTime<Utc>>,
    failing_feeds: usize,
}

/// Create metrics routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/metrics", get(get_metrics))
}

fn collect(state: &AppState) -> Result<MetricsResponse, StoreError> {
    Ok(MetricsResponse {
        inbox_count: state.items.count_new(None)?,
        last_fetch: state.registry.latest_fetch_time()?,
        failing_feeds: state.registry.failing_count(state.failing_feed_threshold)?,
    })
}

/// GET /api/metrics
async fn get_metrics(State(state): State<AppState>) -> Response {
    match collect(&state) {
        Ok(metrics) => (StatusCode::OK, Json(metrics)).into_response(),
        Err(e) => store_error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use crate::routes::tests::{get, test_state};
    use axum::http::StatusCode;
    use newslog_core::NewFeedSource;

    #[tokio::test]
    async fn test_metrics_counts() {
        let (app, state) = test_state();
        let (_, _, body) = get(app.clone(), "/api/metrics").await;
        assert_eq!(body["inbox_count"], 0);
        assert!(body["last_fetch"].is_null());

        let ok = state
            .registry
            .create(&NewFeedSource::new("Stub", "https://stub.example/feed", ""))
            .unwrap();
        let broken = state
            .registry
            .create(&NewFeedSource::new("Down", "https://down.example/feed", ""))
            .unwrap();
        for _ in 0..3 {
            state.scheduler.run().await.unwrap();
        }

        let (status, _, body) = get(app, "/api/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["inbox_count"], 2);
        assert_eq!(body["failing_feeds"], 1);
        assert_eq!(body["last_fetch"], "2024-06-01T12:00:00Z");

        assert_eq!(state.registry.find(ok.id).unwrap().unwrap().fail_count, 0);
        assert_eq!(state.registry.find(broken.id).unwrap().unwrap().fail_count, 3);
    }
}
