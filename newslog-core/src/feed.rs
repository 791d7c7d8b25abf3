//! Feed source data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Failure count at which a feed is reported as failing on dashboards
pub const DEFAULT_FAILING_THRESHOLD: u32 = 3;

/// A configured RSS/Atom endpoint to poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub id: i64,
    /// Display title
    pub title: String,
    /// Homepage of the publication
    pub site_url: String,
    /// Canonical feed URL (unique)
    pub feed_url: String,
    pub active: bool,
    /// Last successful fetch (including "not modified")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,
    /// ETag reported by the server on the last successful fetch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_etag: Option<String>,
    /// Last-Modified reported by the server on the last successful fetch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    /// Consecutive failed fetch attempts
    pub fail_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeedSource {
    /// Whether the feed has failed at least `threshold` times in a row
    pub fn is_failing(&self, threshold: u32) -> bool {
        self.fail_count >= threshold
    }
}

/// Attributes for creating (or seeding) a feed source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFeedSource {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub site_url: String,
    pub feed_url: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl NewFeedSource {
    pub fn new(title: &str, feed_url: &str, site_url: &str) -> Self {
        Self {
            title: title.to_string(),
            site_url: site_url.to_string(),
            feed_url: feed_url.to_string(),
            active: true,
        }
    }
}

/// Partial update of a feed source's operator-editable fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSourceUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_entry_defaults_to_active() {
        let json = r#"{"title": "Example", "feed_url": "https://example.com/feed"}"#;
        let seed: NewFeedSource = serde_json::from_str(json).unwrap();

        assert!(seed.active);
        assert_eq!(seed.site_url, "");
    }
}
