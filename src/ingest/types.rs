// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::CacheValidators;

/// Format-independent representation of one article/post after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalItem {
    pub external_id: String,
    /// Id was hashed from the text because the payload had no GUID/id/link.
    pub id_synthesized: bool,
    pub title: String,
    pub body: String,
    pub url: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub published_at: DateTime<Utc>,
    /// Publish date was missing or unparseable and defaulted to fetch time.
    pub published_estimated: bool,
}

impl CanonicalItem {
    pub fn has_quality_warning(&self) -> bool {
        self.id_synthesized || self.published_estimated
    }
}

/// Raw provider payload plus the validators to persist on the source.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPayload {
    pub body: String,
    pub validators: CacheValidators,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fetched(FetchedPayload),
    /// Server answered 304 to our conditional request.
    NotModified,
}
