// src/ingest/normalize.rs
//! Format normalizer: payload → `CanonicalItem`s.
//!
//! Detection looks at the top-level shape only (root XML element, or JSON
//! listing/array) and yields one of a closed set of `PayloadFormat`s. Each
//! format module turns its payload into `RawEntry`s; `finish` then applies the
//! shared rules (id fallback chain, body priority, text cleaning, date
//! fallback, empty-item drop) so every format behaves the same.

use chrono::{DateTime, NaiveDateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use sha2::{Digest, Sha256};
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::error::{FormatError, ValidationError};
use crate::ingest::providers::{atom, reddit, rss, wordpress};
use crate::ingest::types::CanonicalItem;
use crate::ingest::clean_text;
use crate::model::SourceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    Rss,
    Atom,
    RedditListing,
    WordPressPosts,
}

impl PayloadFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadFormat::Rss => "rss",
            PayloadFormat::Atom => "atom",
            PayloadFormat::RedditListing => "reddit_listing",
            PayloadFormat::WordPressPosts => "wordpress_posts",
        }
    }
}

/// Output of one normalization pass.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub format: PayloadFormat,
    pub items: Vec<CanonicalItem>,
    /// Items dropped for missing both title and body.
    pub rejected: Vec<ValidationError>,
}

impl Normalized {
    pub fn synthesized_ids(&self) -> usize {
        self.items.iter().filter(|i| i.id_synthesized).count()
    }

    pub fn estimated_dates(&self) -> usize {
        self.items.iter().filter(|i| i.published_estimated).count()
    }
}

/// Provider-neutral entry as extracted from a payload, before cleaning.
#[derive(Debug, Clone, Default)]
pub(crate) struct RawEntry {
    pub explicit_id: Option<String>,
    pub link: Option<String>,
    pub title: Option<String>,
    /// Body candidates, best first (full content, summary, description).
    pub bodies: Vec<Option<String>>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub published: Option<DateTime<Utc>>,
}

/// Detect the payload shape. `hint` is the provider the payload came from;
/// it only shows up in error messages, since Reddit and WordPress can also
/// serve feeds.
pub fn detect_format(raw: &str, hint: SourceType) -> Result<PayloadFormat, FormatError> {
    let s = raw.trim_start_matches('\u{feff}').trim_start();
    match s.chars().next() {
        None => Err(FormatError::Empty),
        Some('<') => detect_xml_root(s),
        Some('{') | Some('[') => detect_json_shape(s),
        Some(_) => Err(FormatError::Unsupported(format!(
            "{hint} payload is neither XML nor JSON"
        ))),
    }
}

fn detect_xml_root(s: &str) -> Result<PayloadFormat, FormatError> {
    let mut reader = Reader::from_str(s);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let local = e.local_name();
                let name = String::from_utf8_lossy(local.as_ref()).to_ascii_lowercase();
                return match name.as_str() {
                    "rss" => Ok(PayloadFormat::Rss),
                    "feed" => Ok(PayloadFormat::Atom),
                    other => Err(FormatError::Unsupported(format!("<{other}> root element"))),
                };
            }
            Ok(Event::Eof) => {
                return Err(FormatError::Malformed {
                    format: "xml",
                    reason: "no root element".into(),
                })
            }
            Ok(_) => continue,
            Err(e) => {
                return Err(FormatError::Malformed {
                    format: "xml",
                    reason: e.to_string(),
                })
            }
        }
    }
}

fn detect_json_shape(s: &str) -> Result<PayloadFormat, FormatError> {
    let v: serde_json::Value = serde_json::from_str(s).map_err(|e| FormatError::Malformed {
        format: "json",
        reason: e.to_string(),
    })?;
    if v.is_array() {
        return Ok(PayloadFormat::WordPressPosts);
    }
    let has_children = v
        .get("data")
        .and_then(|d| d.get("children"))
        .is_some_and(|c| c.is_array());
    if has_children {
        Ok(PayloadFormat::RedditListing)
    } else {
        Err(FormatError::Unsupported(
            "JSON object without listing children".into(),
        ))
    }
}

/// Normalize a payload into canonical items. Pure apart from metrics.
pub fn normalize(raw: &str, hint: SourceType) -> Result<Normalized, FormatError> {
    normalize_at(raw, hint, Utc::now())
}

/// Same as `normalize` with an explicit "now" used for the date fallback.
pub fn normalize_at(
    raw: &str,
    hint: SourceType,
    now: DateTime<Utc>,
) -> Result<Normalized, FormatError> {
    let t0 = std::time::Instant::now();
    let format = detect_format(raw, hint)?;
    let entries = match format {
        PayloadFormat::Rss => rss::parse(raw)?,
        PayloadFormat::Atom => atom::parse(raw)?,
        PayloadFormat::RedditListing => reddit::parse(raw)?,
        PayloadFormat::WordPressPosts => wordpress::parse(raw)?,
    };

    let mut items = Vec::with_capacity(entries.len());
    let mut rejected = Vec::new();
    for entry in entries {
        match finish(entry, now) {
            Ok(item) => items.push(item),
            Err(e) => rejected.push(e),
        }
    }

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms", "format" => format.as_str()).record(ms);
    counter!("ingest_events_total", "format" => format.as_str()).increment(items.len() as u64);

    Ok(Normalized {
        format,
        items,
        rejected,
    })
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Apply the shared per-item rules to a raw entry.
pub(crate) fn finish(entry: RawEntry, now: DateTime<Utc>) -> Result<CanonicalItem, ValidationError> {
    let title = entry.title.as_deref().map(clean_text).unwrap_or_default();
    let body = entry
        .bodies
        .iter()
        .flatten()
        .map(|b| clean_text(b))
        .find(|b| !b.is_empty())
        .unwrap_or_default();

    let explicit_id = non_empty(entry.explicit_id);
    let link = non_empty(entry.link);

    if title.is_empty() && body.is_empty() {
        let label = explicit_id
            .or(link)
            .unwrap_or_else(|| "<unidentified>".to_string());
        return Err(ValidationError::MissingText(label));
    }

    let (external_id, id_synthesized) = match explicit_id.or_else(|| link.clone()) {
        Some(id) => (id, false),
        None => {
            let id = synthesize_id(&title, &body);
            tracing::warn!(
                target: "ingest",
                %id,
                title = %truncate_chars(&title, 80),
                "item has no guid/id/link; synthesized id will not dedupe reliably"
            );
            (id, true)
        }
    };

    let (published_at, published_estimated) = match entry.published {
        Some(dt) => (dt, false),
        None => (now, true),
    };

    let mut tags: Vec<String> = Vec::new();
    for t in entry.tags {
        let t = clean_text(&t);
        if !t.is_empty() && !tags.iter().any(|x| x.eq_ignore_ascii_case(&t)) {
            tags.push(t);
        }
    }

    Ok(CanonicalItem {
        external_id,
        id_synthesized,
        title,
        body,
        url: link,
        author: entry.author.as_deref().map(clean_text).filter(|a| !a.is_empty()),
        tags,
        published_at,
        published_estimated,
    })
}

/// Content hash used when a payload gives us nothing stable to key on.
pub(crate) fn synthesize_id(title: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update([0u8]);
    hasher.update(body.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(26);
    out.push_str("synthetic:");
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Parse the date formats seen across feeds and REST APIs: RFC 2822 (RSS),
/// RFC 3339 (Atom, Reddit-style ISO) and offset-less ISO (WordPress `date_gmt`).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        return from_offset(dt);
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return from_offset(dt);
    }
    // chrono is more lenient with obsolete zone names ("EST", "UT")
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

fn from_offset(dt: OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond())
}
