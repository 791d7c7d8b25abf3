//! One-time feed seeding from a JSON file

use std::path::Path;

use tracing::{info, warn};

use newslog_core::{FeedSource, NewFeedSource};

use crate::config::ConfigError;
use crate::database::StoreError;
use crate::feed_registry::FeedRegistry;

/// Read the seed list. A missing file is an empty list.
///
/// Entries that are not objects, or lack a non-empty `feed_url`, are skipped.
pub fn load_seed_feeds(path: &Path) -> Result<Vec<NewFeedSource>, ConfigError> {
    if !path.exists() {
        warn!("Seed file {} not found", path.display());
        return Ok(Vec::new());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;

    parse_seed_feeds(&contents).map_err(|e| ConfigError::InvalidJson {
        path: path.display().to_string(),
        error: e.to_string(),
    })
}

fn parse_seed_feeds(contents: &str) -> Result<Vec<NewFeedSource>, serde_json::Error> {
    let raw: Vec<serde_json::Value> = serde_json::from_str(contents)?;

    Ok(raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<NewFeedSource>(value) {
            Ok(seed) if !seed.feed_url.trim().is_empty() => Some(seed),
            Ok(_) => None,
            Err(e) => {
                warn!("Skipping seed entry: {}", e);
                None
            }
        })
        .collect())
}

/// Upsert every seed into the registry, returning the stored records
pub fn seed_feeds(
    registry: &FeedRegistry,
    seeds: &[NewFeedSource],
) -> Result<Vec<FeedSource>, StoreError> {
    let mut seeded = Vec::with_capacity(seeds.len());

    for seed in seeds {
        let record = registry.ensure(seed)?;
        info!(feed_id = record.id, feed = %record.feed_url, "Seeded feed");
        seeded.push(record);
    }

    Ok(seeded)
}
