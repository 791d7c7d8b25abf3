//! Item Store
//!
//! Content-addressed store of ingested items. The `url_hash` column is UNIQUE,
//! and [`ItemStore::insert_if_absent`] relies on that constraint rather than on
//! a check-then-insert, so two runs racing on the same URL store one row.

use std::sync::Arc;

use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use newslog_core::{
    normalize, url_hash, Clock, Item, ItemFilter, ItemStatus, NewItem, Pagination,
};

use crate::database::{from_unix, Database, StoreError};

const ITEM_COLUMNS: &str = "id, feed_id, title, url, url_hash, summary_raw, author, published_at, \
                            source_name, status, created_at, updated_at";

/// Result of re-canonicalizing stored URLs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    /// Rows whose URL and hash were rewritten
    pub updated: usize,
    /// Rows left alone because the new hash belongs to another row
    pub skipped: usize,
    /// (item id, conflicting item id) pairs for manual review
    pub conflicts: Vec<(i64, i64)>,
}

/// SQLite-backed item store
pub struct ItemStore {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl ItemStore {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Check if an item with this URL hash exists
    pub fn exists_by_hash(&self, hash: &str) -> Result<bool, StoreError> {
        let conn = self.db.lock()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM items WHERE url_hash = ?1)",
            params![hash],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Insert unless the hash is already stored; returns whether a row was written
    #[instrument(skip(self, item), fields(url = %item.url))]
    pub fn insert_if_absent(&self, item: &NewItem) -> Result<bool, StoreError> {
        let now = self.clock.now().timestamp();
        let conn = self.db.lock()?;

        let inserted = conn.execute(
            r#"
            INSERT INTO items (
                feed_id, title, url, url_hash, summary_raw,
                author, published_at, source_name, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
            ON CONFLICT(url_hash) DO NOTHING
            "#,
            params![
                item.feed_id,
                item.title,
                item.url,
                item.url_hash,
                item.summary_raw,
                item.author,
                item.published_at.map(|t| t.timestamp()),
                item.source_name,
                item.status.as_str(),
                now,
            ],
        )?;

        if inserted == 0 {
            debug!("Item already stored, insert skipped");
        }

        Ok(inserted > 0)
    }

    pub fn find(&self, id: i64) -> Result<Option<Item>, StoreError> {
        let conn = self.db.lock()?;
        let item = conn
            .query_row(
                &format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS),
                params![id],
                item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    pub fn find_by_hash(&self, hash: &str) -> Result<Option<Item>, StoreError> {
        let conn = self.db.lock()?;
        let item = conn
            .query_row(
                &format!("SELECT {} FROM items WHERE url_hash = ?1", ITEM_COLUMNS),
                params![hash],
                item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    /// Items matching `filter`, newest first (undated items last)
    pub fn list(&self, filter: &ItemFilter, page: Pagination) -> Result<Vec<Item>, StoreError> {
        let (where_clause, mut values) = filter_clause(filter);
        values.push(Value::Integer(i64::from(page.limit)));
        values.push(Value::Integer(
            i64::try_from(page.offset()).unwrap_or(i64::MAX),
        ));

        let sql = format!(
            r#"
            SELECT {}
            FROM items
            {}
            ORDER BY published_at IS NULL, published_at DESC, created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
            ITEM_COLUMNS, where_clause
        );

        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(values.iter()), item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Number of items matching `filter`
    pub fn count(&self, filter: &ItemFilter) -> Result<usize, StoreError> {
        let (where_clause, values) = filter_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM items {}", where_clause);

        let conn = self.db.lock()?;
        let count: i64 = conn.query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn count_by_status(&self, status: ItemStatus) -> Result<usize, StoreError> {
        self.count(&ItemFilter {
            status: Some(status),
            feed_id: None,
        })
    }

    /// Inbox size, optionally for a single feed
    pub fn count_new(&self, feed_id: Option<i64>) -> Result<usize, StoreError> {
        self.count(&ItemFilter::inbox(feed_id))
    }

    /// Move an item between curation states
    #[instrument(skip(self))]
    pub fn update_status(&self, id: i64, status: ItemStatus) -> Result<(), StoreError> {
        let now = self.clock.now().timestamp();
        let conn = self.db.lock()?;
        let updated = conn.execute(
            "UPDATE items SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now, id],
        )?;

        if updated == 0 {
            return Err(StoreError::NotFound { entity: "item", id });
        }

        Ok(())
    }

    pub fn mark_curated(&self, id: i64) -> Result<(), StoreError> {
        self.update_status(id, ItemStatus::Curated)
    }

    pub fn delete(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.db.lock()?;
        let deleted = conn.execute("DELETE FROM items WHERE id = ?1", params![id])?;

        if deleted == 0 {
            return Err(StoreError::NotFound { entity: "item", id });
        }

        Ok(())
    }

    /// Re-canonicalize every stored URL, skipping rows that would collide
    #[instrument(skip(self))]
    pub fn renormalize_urls(&self) -> Result<BackfillReport, StoreError> {
        let now = self.clock.now().timestamp();
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        let mut report = BackfillReport::default();

        {
            let rows: Vec<(i64, String, String)> = {
                let mut stmt = tx.prepare("SELECT id, url, url_hash FROM items ORDER BY id ASC")?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            };

            let mut check =
                tx.prepare("SELECT id FROM items WHERE url_hash = ?1 AND id <> ?2 LIMIT 1")?;
            let mut update = tx.prepare(
                "UPDATE items SET url = ?1, url_hash = ?2, updated_at = ?3 WHERE id = ?4",
            )?;

            for (id, url, hash) in rows {
                let normalized = normalize(&url);
                let new_hash = url_hash(&normalized);

                if normalized == url && new_hash == hash {
                    continue;
                }

                let conflict: Option<i64> = check
                    .query_row(params![new_hash, id], |row| row.get(0))
                    .optional()?;

                if let Some(other) = conflict {
                    warn!(item_id = id, conflicts_with = other, url = %normalized, "Skipping URL backfill conflict");
                    report.skipped += 1;
                    report.conflicts.push((id, other));
                    continue;
                }

                update.execute(params![normalized, new_hash, now, id])?;
                report.updated += 1;
            }
        }

        tx.commit()?;

        info!(
            updated = report.updated,
            skipped = report.skipped,
            "URL backfill complete"
        );
        Ok(report)
    }
}

fn filter_clause(filter: &ItemFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if let Some(status) = filter.status {
        conditions.push("status = ?");
        values.push(Value::Text(status.as_str().to_string()));
    }

    if let Some(feed_id) = filter.feed_id {
        conditions.push("feed_id = ?");
        values.push(Value::Integer(feed_id));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!("WHERE {}", conditions.join(" AND ")), values)
    }
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    let published_at: Option<i64> = row.get(7)?;
    let status: String = row.get(9)?;
    let status = status
        .parse::<ItemStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e)))?;

    Ok(Item {
        id: row.get(0)?,
        feed_id: row.get(1)?,
        title: row.get(2)?,
        url: row.get(3)?,
        url_hash: row.get(4)?,
        summary_raw: row.get(5)?,
        author: row.get(6)?,
        published_at: published_at.map(from_unix),
        source_name: row.get(8)?,
        status,
        created_at: from_unix(row.get(10)?),
        updated_at: from_unix(row.get(11)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed_registry::FeedRegistry;
    use chrono::{TimeZone, Utc};
    use newslog_core::{FixedClock, NewFeedSource};

    struct Fixture {
        items: ItemStore,
        registry: FeedRegistry,
        db: Database,
        clock: Arc<FixedClock>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ));
        let db = Database::open_in_memory().unwrap();
        Fixture {
            items: ItemStore::new(db.clone(), clock.clone()),
            registry: FeedRegistry::new(db.clone(), clock.clone()),
            db,
            clock,
        }
    }

    fn new_item(feed_id: i64, url: &str, published_day: Option<u32>) -> NewItem {
        let canonical = normalize(url);
        NewItem {
            feed_id,
            title: format!("Title for {}", url),
            url_hash: url_hash(&canonical),
            url: canonical,
            summary_raw: Some("<p>summary</p>".to_string()),
            author: None,
            published_at: published_day
                .map(|day| Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap()),
            source_name: "Example".to_string(),
            status: ItemStatus::New,
        }
    }

    fn feed(f: &Fixture, url: &str) -> i64 {
        f.registry
            .create(&NewFeedSource::new("Feed", url, ""))
            .unwrap()
            .id
    }

    #[test]
    fn test_insert_if_absent_guards_duplicates() {
        let f = fixture();
        let feed_a = feed(&f, "https://a.example/feed");
        let feed_b = feed(&f, "https://b.example/feed");

        let item = new_item(feed_a, "https://news.example/story", Some(1));
        assert!(!f.items.exists_by_hash(&item.url_hash).unwrap());
        assert!(f.items.insert_if_absent(&item).unwrap());
        assert!(f.items.exists_by_hash(&item.url_hash).unwrap());

        // Same URL from another feed is a no-op, not an error
        let again = new_item(feed_b, "https://news.example/story#comments", Some(2));
        assert!(!f.items.insert_if_absent(&again).unwrap());

        let stored = f.items.find_by_hash(&item.url_hash).unwrap().unwrap();
        assert_eq!(stored.feed_id, feed_a);
        assert_eq!(stored.status, ItemStatus::New);
        assert_eq!(f.items.count(&ItemFilter::default()).unwrap(), 1);
    }

    #[test]
    fn test_list_orders_newest_first_with_undated_last() {
        let f = fixture();
        let feed_id = feed(&f, "https://a.example/feed");

        f.items.insert_if_absent(&new_item(feed_id, "https://x.example/undated", None)).unwrap();
        f.items.insert_if_absent(&new_item(feed_id, "https://x.example/old", Some(1))).unwrap();
        f.items.insert_if_absent(&new_item(feed_id, "https://x.example/new", Some(20))).unwrap();

        let listed = f.items.list(&ItemFilter::inbox(None), Pagination::default()).unwrap();
        let urls: Vec<&str> = listed.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://x.example/new",
                "https://x.example/old",
                "https://x.example/undated"
            ]
        );

        let second_page = f
            .items
            .list(&ItemFilter::inbox(None), Pagination::new(Some(2), Some(2)))
            .unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].url, "https://x.example/undated");

        let far_page = f
            .items
            .list(&ItemFilter::inbox(None), Pagination::new(Some(u32::MAX), Some(100)))
            .unwrap();
        assert!(far_page.is_empty());
    }

    #[test]
    fn test_status_filters_and_counts() {
        let f = fixture();
        let feed_a = feed(&f, "https://a.example/feed");
        let feed_b = feed(&f, "https://b.example/feed");

        f.items.insert_if_absent(&new_item(feed_a, "https://x.example/1", Some(1))).unwrap();
        f.items.insert_if_absent(&new_item(feed_a, "https://x.example/2", Some(2))).unwrap();
        f.items.insert_if_absent(&new_item(feed_b, "https://x.example/3", Some(3))).unwrap();

        let first = f.items.list(&ItemFilter::inbox(Some(feed_a)), Pagination::default()).unwrap();
        assert_eq!(first.len(), 2);

        f.clock.advance(chrono::Duration::minutes(1));
        f.items.update_status(first[0].id, ItemStatus::Discarded).unwrap();
        f.items.mark_curated(first[1].id).unwrap();

        assert_eq!(f.items.count_new(None).unwrap(), 1);
        assert_eq!(f.items.count_new(Some(feed_a)).unwrap(), 0);
        assert_eq!(f.items.count_by_status(ItemStatus::Discarded).unwrap(), 1);
        assert_eq!(f.items.count_by_status(ItemStatus::Curated).unwrap(), 1);

        let curated = f.items.find(first[1].id).unwrap().unwrap();
        assert_eq!(curated.status, ItemStatus::Curated);
        assert!(curated.updated_at > curated.created_at);

        assert!(f.items.update_status(9999, ItemStatus::New).unwrap_err().is_not_found());
    }

    #[test]
    fn test_deleting_feed_cascades_to_items() {
        let f = fixture();
        let feed_id = feed(&f, "https://a.example/feed");
        let item = new_item(feed_id, "https://x.example/1", Some(1));
        f.items.insert_if_absent(&item).unwrap();

        f.registry.delete(feed_id).unwrap();
        assert!(!f.items.exists_by_hash(&item.url_hash).unwrap());
    }

    #[test]
    fn test_renormalize_urls_rewrites_and_reports_conflicts() {
        let f = fixture();
        let feed_id = feed(&f, "https://a.example/feed");

        // Rows written before fragments were dropped from canonical URLs
        {
            let conn = f.db.lock().unwrap();
            for (url, hash) in [
                ("https://x.example/a#one", "legacy-1"),
                ("https://x.example/b#two", "legacy-2"),
                ("https://x.example/a#three", "legacy-3"),
            ] {
                conn.execute(
                    "INSERT INTO items (feed_id, title, url, url_hash, source_name, status, created_at, updated_at)
                     VALUES (?1, 't', ?2, ?3, 's', 'new', 0, 0)",
                    params![feed_id, url, hash],
                )
                .unwrap();
            }
        }

        let report = f.items.renormalize_urls().unwrap();
        assert_eq!(report.updated, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.conflicts.len(), 1);

        let canonical = normalize("https://x.example/a");
        let stored = f.items.find_by_hash(&url_hash(&canonical)).unwrap().unwrap();
        assert_eq!(stored.url, "https://x.example/a");

        // Second pass has nothing left to rewrite
        let report = f.items.renormalize_urls().unwrap();
        assert_eq!(report.updated, 0);
    }
}
