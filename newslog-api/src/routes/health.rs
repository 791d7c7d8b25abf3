//! Health check endpoints

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::AppState;

const NO_STORE: &str = "no-store, no-cache, must-revalidate, max-age=0";

#[derive(Debug, Deserialize)]
struct HealthQuery {
    deep: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    db: Option<&'static str>,
    /// Present (possibly null) on deep checks only
    #[serde(skip_serializing_if = "Option::is_none")]
    feeds_total: Option<Option<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inbox_new: Option<Option<usize>>,
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/healthz/deep", get(deep_health_check))
}

/// GET /healthz[?deep=1]
async fn health_check(
    State(state): State<AppState>,
    Query(params): Query<HealthQuery>,
) -> Response {
    let deep = params.deep.as_deref() == Some("1");
    respond(&state, deep)
}

/// GET /healthz/deep
async fn deep_health_check(State(state): State<AppState>) -> Response {
    respond(&state, true)
}

fn respond(state: &AppState, deep: bool) -> Response {
    let mut response = HealthResponse {
        status: "ok",
        time: state.clock.now().to_rfc3339_opts(SecondsFormat::Secs, true),
        db: None,
        feeds_total: None,
        inbox_new: None,
    };

    if deep {
        response.db = Some(match state.db.ping() {
            Ok(()) => "ok",
            Err(e) => {
                warn!("Health check database ping failed: {}", e);
                "error"
            }
        });
        response.feeds_total = Some(state.registry.count_all().ok());
        response.inbox_new = Some(state.items.count_new(None).ok());

        if response.db != Some("ok")
            || response.feeds_total == Some(None)
            || response.inbox_new == Some(None)
        {
            response.status = "error";
        }
    }

    let code = if response.status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, [(header::CACHE_CONTROL, NO_STORE)], Json(response)).into_response()
}

#[cfg(test)]
mod tests {
    use crate::routes::tests::{get, test_state};
    use axum::http::{header, StatusCode};

    #[tokio::test]
    async fn test_shallow_health() {
        let (app, _) = test_state();
        let (status, headers, body) = get(app, "/healthz").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["time"], "2024-06-01T12:00:00Z");
        assert!(body.get("db").is_none());
        assert_eq!(
            headers.get(header::CACHE_CONTROL).unwrap(),
            "no-store, no-cache, must-revalidate, max-age=0"
        );
    }

    #[tokio::test]
    async fn test_deep_health_reports_counts() {
        let (app, state) = test_state();
        state
            .registry
            .create(&newslog_core::NewFeedSource::new("A", "https://a.example/feed", ""))
            .unwrap();

        for path in ["/healthz?deep=1", "/healthz/deep"] {
            let (status, _, body) = get(app.clone(), path).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["db"], "ok");
            assert_eq!(body["feeds_total"], 1);
            assert_eq!(body["inbox_new"], 0);
        }
    }
}
