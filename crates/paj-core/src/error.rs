//! Error types for the PAJ fetcher core

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while listing or downloading resources
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected index page structure: {0}")]
    PageStructure(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Target directory {} not found", .0.display())]
    TargetDirNotFound(PathBuf),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl FetchError {
    pub(crate) fn page(message: impl Into<String>) -> Self {
        FetchError::PageStructure(message.into())
    }

    /// Whether the index page did not look the way the lister expects
    pub fn is_page_structure(&self) -> bool {
        matches!(self, FetchError::PageStructure(_))
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(error: serde_json::Error) -> Self {
        FetchError::Serialization(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_message() {
        let err = FetchError::HttpStatus {
            status: 404,
            url: "https://example.com/a.xls".into(),
        };
        assert!(!err.is_page_structure());
        assert_eq!(err.to_string(), "HTTP 404 for https://example.com/a.xls");
    }

    #[test]
    fn test_page_structure_message() {
        let err = FetchError::page("list item without a link");
        assert!(err.is_page_structure());
        assert_eq!(
            err.to_string(),
            "Unexpected index page structure: list item without a link"
        );
    }
}
