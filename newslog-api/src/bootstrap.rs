//! Startup helpers shared by the binaries

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newslog_core::{Clock, SystemClock};
use newslog_feeds::{ConditionalClient, FeedFetcher, FeedParser, SyndicationParser};
use newslog_services::{
    AppConfig, Database, FeedRegistry, IngestionConfig, IngestionScheduler, ItemStore,
};

use crate::AppState;

/// Load `.env.local` if present
pub fn load_env() {
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }
}

/// Install the global tracing subscriber
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,newslog_services=debug")),
        )
        .init();
}

/// Environment, logging and configuration in one call
pub fn init() -> anyhow::Result<AppConfig> {
    load_env();
    init_tracing();
    AppConfig::from_env().context("Invalid configuration")
}

/// Wired-up stores and scheduler
pub struct Services {
    pub db: Database,
    pub registry: Arc<FeedRegistry>,
    pub items: Arc<ItemStore>,
    pub scheduler: Arc<IngestionScheduler>,
    pub clock: Arc<dyn Clock>,
}

impl Services {
    /// Open the configured database and build the production fetch/parse stack
    pub fn open(config: &AppConfig) -> anyhow::Result<Self> {
        let db = Database::open(&config.database_path).with_context(|| {
            format!(
                "Failed to open database at {}",
                config.database_path.display()
            )
        })?;
        let fetcher = ConditionalClient::new(config.fetch.clone())?;

        Ok(Self::from_parts(
            db,
            Arc::new(SystemClock),
            Arc::new(fetcher),
            Arc::new(SyndicationParser),
            config.ingestion.clone(),
        ))
    }

    pub fn from_parts(
        db: Database,
        clock: Arc<dyn Clock>,
        fetcher: Arc<dyn FeedFetcher>,
        parser: Arc<dyn FeedParser>,
        ingestion: IngestionConfig,
    ) -> Self {
        let registry = Arc::new(FeedRegistry::new(db.clone(), clock.clone()));
        let items = Arc::new(ItemStore::new(db.clone(), clock.clone()));
        let scheduler = Arc::new(IngestionScheduler::new(
            registry.clone(),
            items.clone(),
            fetcher,
            parser,
            ingestion,
        ));

        Self {
            db,
            registry,
            items,
            scheduler,
            clock,
        }
    }

    pub fn into_state(self, failing_feed_threshold: u32) -> AppState {
        AppState {
            db: self.db,
            registry: self.registry,
            items: self.items,
            scheduler: self.scheduler,
            clock: self.clock,
            failing_feed_threshold,
        }
    }
}
