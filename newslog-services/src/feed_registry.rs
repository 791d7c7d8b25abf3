//! Feed Source Registry
//!
//! SQLite-backed registry of configured feed sources and their fetch health.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, info, instrument};

use newslog_core::{
    is_valid, normalize, Clock, CoreError, FeedSource, FeedSourceUpdate, NewFeedSource,
};

use crate::database::{from_unix, is_constraint_violation, Database, StoreError};

const FEED_COLUMNS: &str = "id, title, site_url, feed_url, active, last_checked_at, http_etag, \
                            last_modified, fail_count, created_at, updated_at";

/// Registry of feed sources
pub struct FeedRegistry {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl FeedRegistry {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// All feed sources, ordered by title
    pub fn all(&self) -> Result<Vec<FeedSource>, StoreError> {
        self.query_feeds(&format!("SELECT {} FROM feeds ORDER BY title ASC, id ASC", FEED_COLUMNS))
    }

    /// Feed sources with the active flag set, ordered by title
    pub fn active_sources(&self) -> Result<Vec<FeedSource>, StoreError> {
        self.query_feeds(&format!(
            "SELECT {} FROM feeds WHERE active = 1 ORDER BY title ASC, id ASC",
            FEED_COLUMNS
        ))
    }

    pub fn find(&self, id: i64) -> Result<Option<FeedSource>, StoreError> {
        let conn = self.db.lock()?;
        let feed = conn
            .query_row(
                &format!("SELECT {} FROM feeds WHERE id = ?1", FEED_COLUMNS),
                params![id],
                feed_from_row,
            )
            .optional()?;
        Ok(feed)
    }

    /// Look up a feed by URL (canonicalized before comparison)
    pub fn find_by_feed_url(&self, feed_url: &str) -> Result<Option<FeedSource>, StoreError> {
        let canonical = normalize(feed_url);
        let conn = self.db.lock()?;
        let feed = conn
            .query_row(
                &format!("SELECT {} FROM feeds WHERE feed_url = ?1", FEED_COLUMNS),
                params![canonical],
                feed_from_row,
            )
            .optional()?;
        Ok(feed)
    }

    /// Register a new feed source
    #[instrument(skip(self, new_feed), fields(feed = %new_feed.feed_url))]
    pub fn create(&self, new_feed: &NewFeedSource) -> Result<FeedSource, StoreError> {
        let feed_url = canonical_feed_url(&new_feed.feed_url)?;
        let site_url = canonical_site_url(&new_feed.site_url);
        let now = self.clock.now().timestamp();

        let id = {
            let conn = self.db.lock()?;
            conn.execute(
                r#"
                INSERT INTO feeds (title, site_url, feed_url, active, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                "#,
                params![new_feed.title.trim(), site_url, feed_url, new_feed.active, now],
            )
            .map_err(|e| duplicate_or(e, &feed_url))?;
            conn.last_insert_rowid()
        };

        info!(feed_id = id, "Feed source created");
        self.require(id)
    }

    /// Apply operator edits to a feed source
    #[instrument(skip(self, changes))]
    pub fn update(&self, id: i64, changes: &FeedSourceUpdate) -> Result<FeedSource, StoreError> {
        let existing = self.require(id)?;

        let title = changes
            .title
            .as_deref()
            .map(str::trim)
            .unwrap_or(&existing.title)
            .to_string();
        let site_url = changes
            .site_url
            .as_deref()
            .map(canonical_site_url)
            .unwrap_or(existing.site_url);
        let feed_url = match changes.feed_url.as_deref() {
            Some(url) => canonical_feed_url(url)?,
            None => existing.feed_url,
        };
        let active = changes.active.unwrap_or(existing.active);
        let now = self.clock.now().timestamp();

        {
            let conn = self.db.lock()?;
            conn.execute(
                r#"
                UPDATE feeds
                SET title = ?1, site_url = ?2, feed_url = ?3, active = ?4, updated_at = ?5
                WHERE id = ?6
                "#,
                params![title, site_url, feed_url, active, now, id],
            )
            .map_err(|e| duplicate_or(e, &feed_url))?;
        }

        self.require(id)
    }

    /// Stop polling a feed without deleting it
    pub fn deactivate(&self, id: i64) -> Result<FeedSource, StoreError> {
        self.update(
            id,
            &FeedSourceUpdate {
                active: Some(false),
                ..FeedSourceUpdate::default()
            },
        )
    }

    /// Delete a feed source and, through the foreign key, its items
    #[instrument(skip(self))]
    pub fn delete(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.db.lock()?;
        let deleted = conn.execute("DELETE FROM feeds WHERE id = ?1", params![id])?;

        if deleted == 0 {
            return Err(StoreError::NotFound { entity: "feed", id });
        }

        info!(feed_id = id, "Feed source deleted");
        Ok(())
    }

    /// Idempotent upsert keyed by canonical feed URL (used by seeding)
    #[instrument(skip(self, attributes), fields(feed = %attributes.feed_url))]
    pub fn ensure(&self, attributes: &NewFeedSource) -> Result<FeedSource, StoreError> {
        let feed_url = canonical_feed_url(&attributes.feed_url)?;
        let site_url = canonical_site_url(&attributes.site_url);
        let now = self.clock.now().timestamp();

        {
            let conn = self.db.lock()?;
            conn.execute(
                r#"
                INSERT INTO feeds (title, site_url, feed_url, active, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                ON CONFLICT(feed_url) DO UPDATE SET
                    title = excluded.title,
                    site_url = excluded.site_url,
                    active = excluded.active,
                    updated_at = excluded.updated_at
                "#,
                params![attributes.title.trim(), site_url, feed_url, attributes.active, now],
            )?;
        }

        self.find_by_feed_url(&feed_url)?
            .ok_or(StoreError::Database(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Record a successful fetch: reset failures, stamp checked-at, keep validators
    #[instrument(skip(self))]
    pub fn mark_healthy(
        &self,
        id: i64,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<(), StoreError> {
        let now = self.clock.now().timestamp();
        let conn = self.db.lock()?;
        let updated = conn.execute(
            r#"
            UPDATE feeds
            SET fail_count = 0, last_checked_at = ?1, http_etag = ?2, last_modified = ?3
            WHERE id = ?4
            "#,
            params![now, etag, last_modified, id],
        )?;

        if updated == 0 {
            return Err(StoreError::NotFound { entity: "feed", id });
        }

        debug!(feed_id = id, "Feed marked healthy");
        Ok(())
    }

    /// Record a failed fetch; conditional-fetch state is left untouched
    #[instrument(skip(self))]
    pub fn mark_failed(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.db.lock()?;
        let updated = conn.execute(
            "UPDATE feeds SET fail_count = fail_count + 1 WHERE id = ?1",
            params![id],
        )?;

        if updated == 0 {
            return Err(StoreError::NotFound { entity: "feed", id });
        }

        debug!(feed_id = id, "Feed failure recorded");
        Ok(())
    }

    pub fn count_all(&self) -> Result<usize, StoreError> {
        let conn = self.db.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM feeds", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Most recent checked-at across all feeds
    pub fn latest_fetch_time(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let conn = self.db.lock()?;
        let latest: Option<i64> =
            conn.query_row("SELECT MAX(last_checked_at) FROM feeds", [], |row| row.get(0))?;
        Ok(latest.map(from_unix))
    }

    /// Number of feeds whose failure streak is at or above `threshold`
    pub fn failing_count(&self, threshold: u32) -> Result<usize, StoreError> {
        let conn = self.db.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM feeds WHERE fail_count >= ?1",
            params![threshold],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn require(&self, id: i64) -> Result<FeedSource, StoreError> {
        self.find(id)?
            .ok_or(StoreError::NotFound { entity: "feed", id })
    }

    fn query_feeds(&self, sql: &str) -> Result<Vec<FeedSource>, StoreError> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let feeds = stmt
            .query_map([], feed_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(feeds)
    }
}

fn feed_from_row(row: &Row<'_>) -> rusqlite::Result<FeedSource> {
    let last_checked_at: Option<i64> = row.get(5)?;
    let fail_count: i64 = row.get(8)?;

    Ok(FeedSource {
        id: row.get(0)?,
        title: row.get(1)?,
        site_url: row.get(2)?,
        feed_url: row.get(3)?,
        active: row.get(4)?,
        last_checked_at: last_checked_at.map(from_unix),
        http_etag: row.get(6)?,
        last_modified: row.get(7)?,
        fail_count: fail_count.max(0) as u32,
        created_at: from_unix(row.get(9)?),
        updated_at: from_unix(row.get(10)?),
    })
}

fn canonical_feed_url(raw: &str) -> Result<String, CoreError> {
    if !is_valid(raw) {
        return Err(CoreError::invalid_url(raw.trim()));
    }
    Ok(normalize(raw))
}

/// Site URLs are informational; invalid ones are kept as typed
fn canonical_site_url(raw: &str) -> String {
    if is_valid(raw) {
        normalize(raw)
    } else {
        raw.trim().to_string()
    }
}

fn duplicate_or(error: rusqlite::Error, feed_url: &str) -> StoreError {
    if is_constraint_violation(&error) {
        StoreError::DuplicateFeed(feed_url.to_string())
    } else {
        StoreError::Database(error)
    }
}
