//! Error types for the core domain

use thiserror::Error;

/// Core domain error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid item status: {0}")]
    InvalidStatus(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl CoreError {
    pub fn invalid_status(status: impl Into<String>) -> Self {
        CoreError::InvalidStatus(status.into())
    }

    pub fn invalid_url(url: impl Into<String>) -> Self {
        CoreError::InvalidUrl(url.into())
    }
}
