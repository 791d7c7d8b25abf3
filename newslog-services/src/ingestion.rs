//! Ingestion Scheduler
//!
//! One pass over every active feed source: conditional fetch, parse, dedupe by
//! canonical URL hash, insert new items, then record the source's health.
//! Every source is its own error boundary. A transport error, a parse error or
//! a panic while handling one source is logged and counted against that source
//! only; the rest of the batch carries on.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{stream, FutureExt, StreamExt};
use serde::Serialize;
use tracing::{error, info, warn};

use newslog_core::{normalize, url_hash, FeedSource, ItemStatus, NewItem};
use newslog_feeds::{Entry, FeedError, FeedFetcher, FeedParser};

use crate::database::StoreError;
use crate::feed_registry::FeedRegistry;
use crate::item_store::ItemStore;

/// Configuration for the ingestion scheduler
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Sources fetched at once (1 = strictly sequential)
    pub max_concurrent_fetches: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 1,
        }
    }
}

/// What happened to a single source during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SourceOutcome {
    /// Server answered 304; nothing parsed
    NotModified,
    /// Feed parsed; `inserted` new items, `skipped` entries without link or already stored
    Fetched { inserted: usize, skipped: usize },
    /// Fetch, parse or store failed; failure count incremented
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub feed_id: i64,
    pub feed_url: String,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

/// Summary of one scheduler pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionReport {
    pub sources: Vec<SourceReport>,
}

impl IngestionReport {
    pub fn items_inserted(&self) -> usize {
        self.sources
            .iter()
            .map(|s| match s.outcome {
                SourceOutcome::Fetched { inserted, .. } => inserted,
                _ => 0,
            })
            .sum()
    }

    pub fn failed_sources(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| matches!(s.outcome, SourceOutcome::Failed { .. }))
            .count()
    }

    pub fn outcome_for(&self, feed_id: i64) -> Option<&SourceOutcome> {
        self.sources
            .iter()
            .find(|s| s.feed_id == feed_id)
            .map(|s| &s.outcome)
    }
}

/// Runs ingestion passes over the feed registry
pub struct IngestionScheduler {
    registry: Arc<FeedRegistry>,
    items: Arc<ItemStore>,
    fetcher: Arc<dyn FeedFetcher>,
    parser: Arc<dyn FeedParser>,
    config: IngestionConfig,
}

impl IngestionScheduler {
    pub fn new(
        registry: Arc<FeedRegistry>,
        items: Arc<ItemStore>,
        fetcher: Arc<dyn FeedFetcher>,
        parser: Arc<dyn FeedParser>,
        config: IngestionConfig,
    ) -> Self {
        Self {
            registry,
            items,
            fetcher,
            parser,
            config,
        }
    }

    /// Process every active source once.
    ///
    /// Only failing to read the source list is fatal. Per-source failures end
    /// up in the report and in the sources' failure counts.
    pub async fn run(&self) -> Result<IngestionReport, IngestionError> {
        let sources = self.registry.active_sources()?;
        let concurrency = self.config.max_concurrent_fetches.max(1);

        info!(
            sources = sources.len(),
            concurrency, "Starting ingestion run"
        );

        let reports: Vec<SourceReport> = stream::iter(sources)
            .map(|source| self.run_source(source))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let report = IngestionReport { sources: reports };
        info!(
            inserted = report.items_inserted(),
            failed = report.failed_sources(),
            "Ingestion run complete"
        );

        Ok(report)
    }

    /// Error boundary for a single source; health is written exactly once here
    async fn run_source(&self, source: FeedSource) -> SourceReport {
        let result = AssertUnwindSafe(self.process_source(&source))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(IngestionError::Panicked(panic_message(panic))));

        let outcome = match result {
            Ok(outcome) => {
                if let SourceOutcome::Fetched { inserted, skipped } = outcome {
                    info!(
                        feed_id = source.id,
                        feed = %source.feed_url,
                        inserted,
                        skipped,
                        "Processed feed"
                    );
                }
                outcome
            }
            Err(e) => {
                error!(
                    feed_id = source.id,
                    feed = %source.feed_url,
                    title = %source.title,
                    kind = e.kind(),
                    error = %e,
                    "Feed ingestion failed"
                );
                if let Err(mark_err) = self.registry.mark_failed(source.id) {
                    warn!(feed_id = source.id, error = %mark_err, "Could not record feed failure");
                }
                SourceOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        SourceReport {
            feed_id: source.id,
            feed_url: source.feed_url,
            outcome,
        }
    }

    async fn process_source(&self, source: &FeedSource) -> Result<SourceOutcome, IngestionError> {
        let result = self
            .fetcher
            .fetch(
                &source.feed_url,
                source.http_etag.as_deref(),
                source.last_modified.as_deref(),
            )
            .await?;

        // Validators the server omits this time are carried forward
        let etag = result.etag.as_deref().or(source.http_etag.as_deref());
        let last_modified = result
            .last_modified
            .as_deref()
            .or(source.last_modified.as_deref());

        if result.not_modified {
            info!(
                feed_id = source.id,
                feed = %source.feed_url,
                etag = etag.unwrap_or_default(),
                last_modified = last_modified.unwrap_or_default(),
                "Feed not modified"
            );
            self.registry.mark_healthy(source.id, etag, last_modified)?;
            return Ok(SourceOutcome::NotModified);
        }

        let body = result.body.as_ref().ok_or_else(|| {
            FeedError::ParseError("server returned an empty response body".to_string())
        })?;
        let parsed = self.parser.parse(body)?;
        let source_name = parsed
            .title
            .clone()
            .unwrap_or_else(|| source.title.clone());

        let mut inserted = 0;
        let mut skipped = 0;
        for entry in &parsed.entries {
            let Some(link) = entry.usable_link() else {
                skipped += 1;
                continue;
            };

            let canonical = normalize(link);
            let hash = url_hash(&canonical);
            if self.items.exists_by_hash(&hash)? {
                skipped += 1;
                continue;
            }

            let item = build_item(source, entry, link, canonical, hash, &source_name);
            if self.items.insert_if_absent(&item)? {
                inserted += 1;
            } else {
                // Lost the race to a concurrent insert of the same URL
                skipped += 1;
            }
        }

        self.registry.mark_healthy(source.id, etag, last_modified)?;
        Ok(SourceOutcome::Fetched { inserted, skipped })
    }
}

fn build_item(
    source: &FeedSource,
    entry: &Entry,
    link: &str,
    canonical: String,
    hash: String,
    source_name: &str,
) -> NewItem {
    NewItem {
        feed_id: source.id,
        title: entry.title.clone().unwrap_or_else(|| link.to_string()),
        url: canonical,
        url_hash: hash,
        summary_raw: entry.summary.clone(),
        author: entry.author.clone(),
        published_at: entry.effective_published_at(),
        source_name: source_name.to_string(),
        status: ItemStatus::New,
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Errors that can occur while processing a source
#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Panicked while processing feed: {0}")]
    Panicked(String),
}

impl IngestionError {
    /// Coarse failure class for logs; the health counter does not distinguish them
    pub fn kind(&self) -> &'static str {
        match self {
            IngestionError::Feed(e) if e.is_transport() => "transport",
            IngestionError::Feed(_) => "parse",
            IngestionError::Store(_) => "store",
            IngestionError::Panicked(_) => "panic",
        }
    }
}
