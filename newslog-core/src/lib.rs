//! Core types for the Newslog feed ingestion pipeline
//!
//! This crate defines the shared data structures used across the workspace,
//! including feed sources, ingested items and URL canonicalization.

pub mod canonical;
pub mod clock;
pub mod error;
pub mod feed;
pub mod item;

pub use canonical::{is_valid, normalize, url_hash};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::CoreError;
pub use feed::{FeedSource, FeedSourceUpdate, NewFeedSource, DEFAULT_FAILING_THRESHOLD};
pub use item::{Item, ItemFilter, ItemStatus, NewItem, Pagination};
