//! Feed document parsing
//!
//! Detects RSS vs Atom from the document's root element and maps either into
//! the same [`ParsedFeed`] shape. Entries are returned as-is; link presence is
//! checked by the ingestion scheduler.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::FeedError;
use crate::types::{Entry, FeedFormat, ParsedFeed};

/// Seam between the ingestion scheduler and the document format
pub trait FeedParser: Send + Sync {
    fn parse(&self, body: &[u8]) -> Result<ParsedFeed, FeedError>;
}

/// RSS (0.9x/1.0/2.0) and Atom parser backed by the `rss` and `atom_syndication` crates
#[derive(Debug, Clone, Copy, Default)]
pub struct SyndicationParser;

impl FeedParser for SyndicationParser {
    fn parse(&self, body: &[u8]) -> Result<ParsedFeed, FeedError> {
        parse_feed(body)
    }
}

/// Parse a feed document of either format
pub fn parse_feed(body: &[u8]) -> Result<ParsedFeed, FeedError> {
    match detect_format(body)? {
        FeedFormat::Rss => {
            let channel = rss::Channel::read_from(body)
                .map_err(|e| FeedError::ParseError(format!("invalid RSS document: {}", e)))?;
            Ok(parse_rss_channel(&channel))
        }
        FeedFormat::Atom => {
            let feed = atom_syndication::Feed::read_from(body)
                .map_err(|e| FeedError::ParseError(format!("invalid Atom document: {}", e)))?;
            Ok(parse_atom_feed(&feed))
        }
    }
}

/// Identify the format from the first element of the document
pub fn detect_format(body: &[u8]) -> Result<FeedFormat, FeedError> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(element)) | Ok(Event::Empty(element)) => {
                let name = String::from_utf8_lossy(element.local_name().as_ref()).to_string();
                return match name.as_str() {
                    "rss" | "RDF" => Ok(FeedFormat::Rss),
                    "feed" => Ok(FeedFormat::Atom),
                    _ => Err(FeedError::UnsupportedFormat(name)),
                };
            }
            Ok(Event::Eof) => {
                return Err(FeedError::ParseError("document has no root element".to_string()));
            }
            Err(e) => {
                return Err(FeedError::ParseError(format!(
                    "malformed XML at byte {}: {}",
                    reader.error_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }
}

/// Parse RSS channel into entries
fn parse_rss_channel(channel: &rss::Channel) -> ParsedFeed {
    let entries = channel
        .items()
        .iter()
        .map(|item| {
            let dublin_core = item.dublin_core_ext();

            // Permalink GUIDs stand in for a missing <link>
            let link = non_blank(item.link()).or_else(|| {
                item.guid()
                    .filter(|guid| guid.is_permalink())
                    .and_then(|guid| non_blank(Some(guid.value())))
            });

            let author = non_blank(item.author()).or_else(|| {
                dublin_core.and_then(|dc| non_blank(dc.creators().first().map(String::as_str)))
            });

            let published_at = item.pub_date().and_then(parse_date).or_else(|| {
                dublin_core
                    .and_then(|dc| dc.dates().first())
                    .and_then(|d| parse_date(d))
            });

            Entry {
                title: non_blank(item.title()),
                link,
                summary: non_blank(item.description()).or_else(|| non_blank(item.content())),
                author,
                published_at,
                modified_at: None,
            }
        })
        .collect();

    ParsedFeed {
        title: non_blank(Some(channel.title())),
        entries,
    }
}

/// Parse Atom feed into entries
fn parse_atom_feed(feed: &atom_syndication::Feed) -> ParsedFeed {
    let entries = feed
        .entries()
        .iter()
        .map(|entry| {
            let link = entry
                .links()
                .iter()
                .find(|l| l.rel() == "alternate")
                .or_else(|| entry.links().first())
                .and_then(|l| non_blank(Some(l.href())));

            let summary = non_blank(entry.summary().map(|s| s.as_str()))
                .or_else(|| non_blank(entry.content().and_then(|c| c.value())));

            // A missing <updated> is read as the Unix epoch
            let updated = entry.updated().with_timezone(&Utc);
            let modified_at = (updated.timestamp() != 0).then_some(updated);

            Entry {
                title: non_blank(Some(entry.title().as_str())),
                link,
                summary,
                author: non_blank(entry.authors().first().map(|p| p.name())),
                published_at: entry.published().map(|d| d.with_timezone(&Utc)),
                modified_at,
            }
        })
        .collect();

    ParsedFeed {
        title: non_blank(Some(feed.title().as_str())),
        entries,
    }
}

/// RFC 2822 first (RSS), then RFC 3339 (Dublin Core, sloppy feeds)
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
