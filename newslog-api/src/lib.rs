//! Newslog API
//!
//! Axum router for the curation/admin layer plus the startup plumbing shared by
//! the `newslog-*` binaries.

pub mod bootstrap;
pub mod routes;

use std::sync::Arc;

use axum::{
    http::{header, Method},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use newslog_core::Clock;
use newslog_services::{Database, FeedRegistry, IngestionScheduler, ItemStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub registry: Arc<FeedRegistry>,
    pub items: Arc<ItemStore>,
    pub scheduler: Arc<IngestionScheduler>,
    pub clock: Arc<dyn Clock>,
    /// Failure count at which a feed is reported as failing
    pub failing_feed_threshold: u32,
}

/// Build the full router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .merge(routes::health_routes())
        .nest("/api", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
