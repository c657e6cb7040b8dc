// src/error.rs
//! Error taxonomy for the ingestion engine.
//!
//! `FetchError` and `FormatError` are source-scoped: they land in the source's
//! error ring and count toward `consecutive_failures`. `ValidationError` drops a
//! single item. `PersistenceError` is item-scoped, except when the store fails
//! its availability check at cycle start.

use std::time::Duration;

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("source has no resolvable locator: {0}")]
    MissingLocator(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("failed to read response body: {0}")]
    Body(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("empty payload")]
    Empty,

    #[error("unsupported payload shape: {0}")]
    Unsupported(String),

    #[error("malformed {format} payload: {reason}")]
    Malformed { format: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("item {0} has neither title nor body")]
    MissingText(String),

    #[error("source locator is empty ({0})")]
    EmptyLocator(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistenceError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("record not found: {0}")]
    NotFound(String),
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl IngestError {
    /// Short stable label used in error records and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Fetch(_) => "fetch",
            IngestError::Format(_) => "format",
            IngestError::Validation(_) => "validation",
            IngestError::Persistence(_) => "persistence",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable_labels() {
        let e: IngestError = FetchError::Transport("reset".into()).into();
        assert_eq!(e.kind(), "fetch");
        let e: IngestError = FormatError::Empty.into();
        assert_eq!(e.kind(), "format");
        let e: IngestError = PersistenceError::Unavailable("down".into()).into();
        assert_eq!(e.kind(), "persistence");
        assert_eq!(e.to_string(), "store unavailable: down");
    }

    #[test]
    fn http_error_mentions_status_and_url() {
        let e = FetchError::Http {
            status: 503,
            url: "https://example.test/feed".into(),
        };
        assert_eq!(e.to_string(), "HTTP 503 from https://example.test/feed");
    }
}
