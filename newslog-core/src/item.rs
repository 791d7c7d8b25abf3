//! Ingested item data structures

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Curation state of an ingested item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Waiting in the curator's inbox
    New,
    /// Rejected by the curator
    Discarded,
    /// Promoted to a curated link
    Curated,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::New => "new",
            ItemStatus::Discarded => "discarded",
            ItemStatus::Curated => "curated",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "new" => Ok(ItemStatus::New),
            // "ignored" is the curator-facing label for discarded items
            "discarded" | "ignored" => Ok(ItemStatus::Discarded),
            "curated" => Ok(ItemStatus::Curated),
            other => Err(CoreError::invalid_status(other)),
        }
    }
}

/// A single ingested feed entry, prior to any curation decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    /// Canonical URL
    pub url: String,
    /// SHA-1 of the canonical URL (unique)
    pub url_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub source_name: String,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Item ready to be inserted by the ingestion scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub url_hash: String,
    pub summary_raw: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub source_name: String,
    pub status: ItemStatus,
}

/// Filter for item listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemFilter {
    pub status: Option<ItemStatus>,
    pub feed_id: Option<i64>,
}

impl ItemFilter {
    /// The curator's inbox, optionally for a single feed
    pub fn inbox(feed_id: Option<i64>) -> Self {
        Self {
            status: Some(ItemStatus::New),
            feed_id,
        }
    }
}

/// Page/limit pair with clamped bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 25;
    pub const MAX_LIMIT: u32 = 100;

    /// Clamp limit to 1..=100 and page to at least 1
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    /// Row offset; computed in 64 bits so huge page numbers cannot overflow
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}
