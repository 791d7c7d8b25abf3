//! Types shared by the fetch client and the parser

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Outcome of a conditional GET
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResult {
    /// Server answered 304 Not Modified
    pub not_modified: bool,
    /// Response body (absent when not modified)
    pub body: Option<Bytes>,
    /// ETag header of the response
    pub etag: Option<String>,
    /// Last-Modified header of the response
    pub last_modified: Option<String>,
}

impl FetchResult {
    pub fn modified(body: impl Into<Bytes>) -> Self {
        Self {
            not_modified: false,
            body: Some(body.into()),
            etag: None,
            last_modified: None,
        }
    }

    pub fn not_modified() -> Self {
        Self {
            not_modified: true,
            ..Self::default()
        }
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn with_last_modified(mut self, last_modified: impl Into<String>) -> Self {
        self.last_modified = Some(last_modified.into());
        self
    }
}

/// Syndication format detected from the document root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Rss,
    Atom,
}

/// A parsed feed document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    /// Title declared by the document itself
    pub title: Option<String>,
    pub entries: Vec<Entry>,
}

/// A single entry of a parsed feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub title: Option<String>,
    pub link: Option<String>,
    /// Raw (HTML) summary or content
    pub summary: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Entry {
    /// Modified time when known, else published time
    pub fn effective_published_at(&self) -> Option<DateTime<Utc>> {
        self.modified_at.or(self.published_at)
    }

    /// Link if present and not blank
    pub fn usable_link(&self) -> Option<&str> {
        self.link
            .as_deref()
            .map(str::trim)
            .filter(|link| !link.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_modified_preferred_over_published() {
        let published = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let modified = Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap();

        let entry = Entry {
            published_at: Some(published),
            modified_at: Some(modified),
            ..Entry::default()
        };
        assert_eq!(entry.effective_published_at(), Some(modified));

        let entry = Entry {
            published_at: Some(published),
            ..Entry::default()
        };
        assert_eq!(entry.effective_published_at(), Some(published));
    }

    #[test]
    fn test_blank_link_is_unusable() {
        let entry = Entry {
            link: Some("   ".to_string()),
            ..Entry::default()
        };
        assert_eq!(entry.usable_link(), None);
    }
}
