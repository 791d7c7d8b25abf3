//! Service layer for Newslog
//!
//! This crate owns the SQLite-backed feed registry and item store, and the
//! ingestion scheduler that ties fetching, parsing and deduplication together.

pub mod config;
pub mod database;
pub mod feed_registry;
pub mod ingestion;
pub mod item_store;
pub mod seed;

pub use config::{AppConfig, ConfigError};
pub use database::{Database, StoreError};
pub use feed_registry::FeedRegistry;
pub use ingestion::{
    IngestionConfig, IngestionError, IngestionReport, IngestionScheduler, SourceOutcome,
    SourceReport,
};
pub use item_store::{BackfillReport, ItemStore};
pub use seed::{load_seed_feeds, seed_feeds};
