//! Conditional fetch client
//!
//! Fetches feed documents with `If-None-Match` / `If-Modified-Since` so that
//! unchanged feeds cost a 304 instead of a full download.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED, USER_AGENT};
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::error::FeedError;
use crate::types::FetchResult;

/// Seam between the ingestion scheduler and the network
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// GET `url`, attaching conditional headers for whatever prior metadata exists
    async fn fetch(
        &self,
        url: &str,
        prior_etag: Option<&str>,
        prior_last_modified: Option<&str>,
    ) -> Result<FetchResult, FeedError>;
}

/// HTTP settings for feed fetching
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Per-request timeout (in seconds)
    pub timeout_secs: u64,
    /// User-Agent sent with every request
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: "Newslog/1.0 (+feed fetcher)".to_string(),
        }
    }
}

/// reqwest-backed conditional fetch client
pub struct ConditionalClient {
    client: Client,
    config: FetchConfig,
}

impl ConditionalClient {
    /// Create a new client with the given settings
    pub fn new(config: FetchConfig) -> Result<Self, FeedError> {
        if config.timeout_secs == 0 {
            return Err(FeedError::InvalidConfig(
                "fetch timeout must be at least one second".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FeedError::InvalidConfig(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn map_transport_error(&self, error: reqwest::Error) -> FeedError {
        if error.is_timeout() {
            FeedError::Timeout(self.config.timeout_secs)
        } else {
            FeedError::RequestFailed(error.to_string())
        }
    }
}

#[async_trait]
impl FeedFetcher for ConditionalClient {
    async fn fetch(
        &self,
        url: &str,
        prior_etag: Option<&str>,
        prior_last_modified: Option<&str>,
    ) -> Result<FetchResult, FeedError> {
        let mut request = self
            .client
            .get(url)
            .header(USER_AGENT, self.config.user_agent.as_str());

        if let Some(etag) = prior_etag.filter(|e| !e.trim().is_empty()) {
            request = request.header(IF_NONE_MATCH, etag);
        }

        if let Some(since) = prior_last_modified.and_then(modified_since_header) {
            request = request.header(IF_MODIFIED_SINCE, since);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let etag = header_value(response.headers(), ETAG);
        let last_modified = header_value(response.headers(), LAST_MODIFIED);

        if status == StatusCode::NOT_MODIFIED {
            debug!(feed = %url, "Feed not modified");
            return Ok(FetchResult {
                not_modified: true,
                body: None,
                etag,
                last_modified,
            });
        }

        if !status.is_success() {
            return Err(FeedError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        debug!(feed = %url, bytes = body.len(), "Fetched feed document");

        Ok(FetchResult {
            not_modified: false,
            body: Some(body),
            etag,
            last_modified,
        })
    }
}

/// First non-empty value of a response header
fn header_value(headers: &reqwest::header::HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Re-render a stored Last-Modified value as an HTTP date; unparseable values are dropped
fn modified_since_header(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let parsed = DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()?;

    Some(
        parsed
            .with_timezone(&Utc)
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

    /// Matches requests that carry no conditional headers at all
    struct Unconditional;

    impl Match for Unconditional {
        fn matches(&self, request: &Request) -> bool {
            !request.headers.contains_key("if-none-match")
                && !request.headers.contains_key("if-modified-since")
        }
    }

    fn client_with_timeout(timeout_secs: u64) -> ConditionalClient {
        ConditionalClient::new(FetchConfig {
            timeout_secs,
            ..FetchConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_modified_since_header_format() {
        assert_eq!(
            modified_since_header("Tue, 15 Nov 1994 08:12:31 GMT").as_deref(),
            Some("Tue, 15 Nov 1994 08:12:31 GMT")
        );
        assert_eq!(
            modified_since_header("1994-11-15T10:12:31+02:00").as_deref(),
            Some("Tue, 15 Nov 1994 08:12:31 GMT")
        );
        assert_eq!(modified_since_header("yesterday"), None);
        assert_eq!(modified_since_header(""), None);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(matches!(
            ConditionalClient::new(FetchConfig {
                timeout_secs: 0,
                ..FetchConfig::default()
            }),
            Err(FeedError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_returns_body_and_validators() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .and(Unconditional)
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"v1\"")
                    .insert_header("Last-Modified", "Tue, 15 Nov 1994 08:12:31 GMT")
                    .set_body_string("<rss version=\"2.0\"><channel></channel></rss>"),
            )
            .mount(&server)
            .await;

        let client = client_with_timeout(5);
        let result = client
            .fetch(&format!("{}/feed.xml", server.uri()), None, None)
            .await
            .unwrap();

        assert!(!result.not_modified);
        assert!(result.body.unwrap().starts_with(b"<rss"));
        assert_eq!(result.etag.as_deref(), Some("\"v1\""));
        assert_eq!(
            result.last_modified.as_deref(),
            Some("Tue, 15 Nov 1994 08:12:31 GMT")
        );
    }

    #[tokio::test]
    async fn test_conditional_headers_yield_not_modified() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .and(header("If-None-Match", "\"v1\""))
            .and(header("If-Modified-Since", "Tue, 15 Nov 1994 08:12:31 GMT"))
            .respond_with(ResponseTemplate::new(304).insert_header("ETag", "\"v1\""))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with_timeout(5);
        let result = client
            .fetch(
                &format!("{}/feed.xml", server.uri()),
                Some("\"v1\""),
                Some("Tue, 15 Nov 1994 08:12:31 GMT"),
            )
            .await
            .unwrap();

        assert!(result.not_modified);
        assert!(result.body.is_none());
        assert_eq!(result.etag.as_deref(), Some("\"v1\""));
    }

    #[tokio::test]
    async fn test_server_error_is_transport_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_with_timeout(5);
        let err = client
            .fetch(&format!("{}/feed.xml", server.uri()), None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, FeedError::HttpStatus { status: 503, .. }));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let client = client_with_timeout(1);
        let err = client
            .fetch(&format!("{}/feed.xml", server.uri()), None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, FeedError::Timeout(1)));
    }
}
