//! Metadata registry trait and implementations for DOI lookups.

pub mod crossref;
pub mod mock;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

pub use crossref::CrossRef;

/// Comparable metadata extracted from a registry record.
/// Fields stay `None` when the record lacks them or could not be parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkMetadata {
    pub title: Option<String>,
    /// Four-digit publication year as a string.
    pub year: Option<String>,
    pub work_type: Option<String>,
}

/// Why a lookup did not produce a record. The `Display` text is what ends
/// up in `VerificationResult::error`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("DOI not found (404)")]
    NotFound,
    #[error("Rate limited (429), increase delay")]
    RateLimited,
    #[error("HTTP {0}")]
    Status(u16),
    #[error("Request timeout")]
    Timeout,
    #[error("Connection error")]
    Connection,
    #[error("{0}")]
    Other(String),
}

impl LookupError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => LookupError::NotFound,
            429 => LookupError::RateLimited,
            other => LookupError::Status(other),
        }
    }

    /// Classify a transport-level failure.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            LookupError::Timeout
        } else if err.is_connect() {
            LookupError::Connection
        } else {
            LookupError::Other(err.to_string())
        }
    }

    /// HTTP status behind this error, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            LookupError::NotFound => Some(404),
            LookupError::RateLimited => Some(429),
            LookupError::Status(code) => Some(*code),
            LookupError::Timeout | LookupError::Connection | LookupError::Other(_) => None,
        }
    }
}

pub type LookupFuture<'a> =
    Pin<Box<dyn Future<Output = Result<WorkMetadata, LookupError>> + Send + 'a>>;

/// A remote registry that resolves a DOI to bibliographic metadata.
pub trait MetadataRegistry: Send + Sync {
    /// The canonical name of this registry (e.g., "CrossRef").
    fn name(&self) -> &str;

    /// Look up a cleaned, well-formed DOI. Issues at most one request.
    fn lookup<'a>(&'a self, doi: &'a str) -> LookupFuture<'a>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert_eq!(LookupError::from_status(404), LookupError::NotFound);
        assert_eq!(LookupError::from_status(429), LookupError::RateLimited);
        assert_eq!(LookupError::from_status(500), LookupError::Status(500));
    }

    #[test]
    fn test_status_code_round_trip() {
        for code in [404u16, 429, 500, 301] {
            assert_eq!(LookupError::from_status(code).status_code(), Some(code));
        }
        assert_eq!(LookupError::Timeout.status_code(), None);
        assert_eq!(LookupError::Other("x".into()).status_code(), None);
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(LookupError::NotFound.to_string(), "DOI not found (404)");
        assert_eq!(LookupError::Status(502).to_string(), "HTTP 502");
        assert_eq!(LookupError::Timeout.to_string(), "Request timeout");
        assert_eq!(LookupError::Connection.to_string(), "Connection error");
        assert!(LookupError::RateLimited.to_string().contains("increase delay"));
    }
}
