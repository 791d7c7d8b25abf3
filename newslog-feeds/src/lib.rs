//! Feed fetching and parsing for Newslog
//!
//! This crate provides:
//! - A conditional HTTP client (`If-None-Match` / `If-Modified-Since`)
//! - An RSS/Atom parser with format auto-detection

pub mod client;
pub mod error;
pub mod parser;
pub mod types;

pub use client::{ConditionalClient, FeedFetcher, FetchConfig};
pub use error::FeedError;
pub use parser::{detect_format, parse_feed, FeedParser, SyndicationParser};
pub use types::{Entry, FeedFormat, FetchResult, ParsedFeed};
