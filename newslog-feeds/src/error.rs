//! Error types for feed fetching and parsing

use thiserror::Error;

/// Errors that can occur while fetching or parsing a feed
#[derive(Debug, Error)]
pub enum FeedError {
    /// HTTP request failed (DNS, connection, body read)
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Request exceeded the configured timeout
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// Server answered with something other than 2xx or 304
    #[error("Unexpected HTTP status {status} from {url}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Document is not well-formed XML, or the RSS/Atom reader rejected it
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Well-formed XML that is neither RSS nor Atom
    #[error("Unsupported feed format (root element <{0}>)")]
    UnsupportedFormat(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FeedError {
    /// Whether the failure happened on the network side rather than in the document
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FeedError::RequestFailed(_) | FeedError::Timeout(_) | FeedError::HttpStatus { .. }
        )
    }
}
