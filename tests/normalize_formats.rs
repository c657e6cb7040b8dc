// tests/normalize_formats.rs
//
// Format detection and per-item rules over fixture payloads for every
// supported provider shape.

use chrono::{TimeZone, Utc};
use sentiment_ingest::error::{FormatError, ValidationError};
use sentiment_ingest::ingest::normalize::{normalize_at, PayloadFormat};
use sentiment_ingest::model::SourceType;

const RSS: &str = include_str!("fixtures/coin_news_rss.xml");
const ATOM: &str = include_str!("fixtures/chain_dev_atom.xml");
const REDDIT: &str = include_str!("fixtures/reddit_listing.json");
const WORDPRESS: &str = include_str!("fixtures/wordpress_posts.json");

#[test]
fn rss_and_atom_three_each_make_six_items() {
    let now = Utc.with_ymd_and_hms(2024, 3, 12, 13, 0, 0).unwrap();
    let rss = normalize_at(RSS, SourceType::Rss, now).expect("rss");
    let atom = normalize_at(ATOM, SourceType::Rss, now).expect("atom");

    assert_eq!(rss.format, PayloadFormat::Rss);
    assert_eq!(atom.format, PayloadFormat::Atom);
    assert_eq!(rss.items.len() + atom.items.len(), 6);

    let mut ids: Vec<&str> = rss
        .items
        .iter()
        .chain(atom.items.iter())
        .map(|i| i.external_id.as_str())
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 6, "external ids are distinct");
}

#[test]
fn rss_item_fields_are_cleaned() {
    let now = Utc::now();
    let out = normalize_at(RSS, SourceType::Rss, now).unwrap();
    let first = &out.items[0];
    assert_eq!(first.external_id, "coinnews-1001");
    assert_eq!(first.author.as_deref(), Some("Dana Miles"));
    assert_eq!(first.tags, vec!["Markets".to_string(), "Bitcoin".to_string()]);
    assert!(!first.body.contains('<'), "tags stripped: {}", first.body);
    assert_eq!(
        first.published_at,
        Utc.with_ymd_and_hms(2024, 3, 12, 9, 30, 0).unwrap()
    );
    assert!(!first.published_estimated);

    // no guid: the link is the stable id
    let third = &out.items[2];
    assert_eq!(
        third.external_id,
        "https://coinnews.example.test/2024/03/wallet-exploit"
    );
    assert!(!third.id_synthesized);
    // unparseable date falls back to "now" and is flagged
    assert!(third.published_estimated);
    assert_eq!(third.published_at, now);
    assert_eq!(out.estimated_dates(), 1);
}

#[test]
fn atom_prefers_published_and_strips_markup() {
    let out = normalize_at(ATOM, SourceType::Rss, Utc::now()).unwrap();
    let second = &out.items[1];
    assert_eq!(second.title, "Layer 2 fees drop");
    assert_eq!(
        second.body,
        "Rollup fees fell sharply after the rollup compression change."
    );
    assert_eq!(
        second.url.as_deref(),
        Some("https://chaindev.example.test/posts/l2-fees")
    );
    assert_eq!(
        second.published_at,
        Utc.with_ymd_and_hms(2024, 3, 11, 15, 20, 0).unwrap()
    );
}

#[test]
fn reddit_listing_items() {
    let out = normalize_at(REDDIT, SourceType::Reddit, Utc::now()).unwrap();
    assert_eq!(out.format, PayloadFormat::RedditListing);
    assert_eq!(out.items.len(), 2);
    assert_eq!(out.items[0].external_id, "t3_1b2c3a");
    assert_eq!(out.items[0].tags, vec!["Discussion".to_string()]);
    // deleted authors are dropped, title-only posts are kept
    assert_eq!(out.items[1].author, None);
    assert_eq!(out.items[1].body, "");
    assert_eq!(out.items[1].title, "Chart of the day");
}

#[test]
fn wordpress_posts_drop_empty_entries() {
    let out = normalize_at(WORDPRESS, SourceType::WordPress, Utc::now()).unwrap();
    assert_eq!(out.format, PayloadFormat::WordPressPosts);
    assert_eq!(out.items.len(), 1);
    assert_eq!(out.rejected.len(), 1);
    assert!(matches!(out.rejected[0], ValidationError::MissingText(_)));

    let post = &out.items[0];
    assert_eq!(post.external_id, "https://blog.example.test/?p=4412");
    assert_eq!(post.title, "DeFi lending recap \u{2013} week 10");
    assert_eq!(post.author.as_deref(), Some("Priya Nair"));
    assert_eq!(post.tags, vec!["DeFi".to_string(), "lending".to_string()]);
}

#[test]
fn unknown_shapes_are_format_errors() {
    assert_eq!(
        normalize_at("", SourceType::Rss, Utc::now()).unwrap_err(),
        FormatError::Empty
    );
    assert!(matches!(
        normalize_at("<html><body>nope</body></html>", SourceType::Rss, Utc::now()),
        Err(FormatError::Unsupported(_))
    ));
    assert!(matches!(
        normalize_at(r#"{"ok":true}"#, SourceType::Reddit, Utc::now()),
        Err(FormatError::Unsupported(_))
    ));
    assert!(normalize_at("<rss><channel><item>", SourceType::Rss, Utc::now()).is_err());
}
