// src/ingest/mod.rs
pub mod config;
pub mod dedup;
pub mod discover;
pub mod fetch;
pub mod normalize;
pub mod providers;
pub mod scheduler;
pub mod types;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use regex::Regex;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Items parsed from provider payloads.");
        describe_counter!(
            "ingest_items_created_total",
            "Content items created by the deduplicating ingestor."
        );
        describe_counter!(
            "ingest_items_skipped_total",
            "Items skipped because their external id was already stored."
        );
        describe_counter!(
            "ingest_items_dropped_total",
            "Items dropped during normalization (no title and no body)."
        );
        describe_counter!("ingest_item_errors_total", "Per-item persistence errors.");
        describe_counter!(
            "ingest_data_quality_warnings_total",
            "Items with a synthesized id or an estimated publish date."
        );
        describe_counter!("ingest_fetch_errors_total", "Provider fetch failures.");
        describe_counter!("ingest_format_errors_total", "Unparseable provider payloads.");
        describe_counter!("ingest_not_modified_total", "Conditional fetches answered with 304.");
        describe_counter!("keyword_links_total", "Keyword/content links written.");
        describe_counter!("crawl_cycles_total", "Completed crawl cycles.");
        describe_histogram!("ingest_parse_ms", "Payload parse time in milliseconds.");
        describe_histogram!("ingest_fetch_ms", "Fetch time in milliseconds.");
        describe_gauge!("crawl_cycle_last_run_ts", "Unix ts when the last crawl cycle finished.");
        describe_gauge!("crawl_sources_due", "Sources due in the last crawl cycle.");
    });
}

static RE_BLOCKS: OnceCell<Regex> = OnceCell::new();
static RE_TAGS: OnceCell<Regex> = OnceCell::new();
static RE_WS: OnceCell<Regex> = OnceCell::new();

fn compiled(cell: &'static OnceCell<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid static regex"))
}

/// Clean a text field before storage: strip tags (dropping script/style
/// bodies), then decode HTML entities, fold typographic quotes and collapse
/// whitespace. Escaped `&lt;`/`&gt;` survive as literal text.
pub fn clean_text(s: &str) -> String {
    // 1) Drop <script>/<style> blocks, then strip remaining tags
    let re_blocks = compiled(&RE_BLOCKS, r"(?is)<script[^>]*>.*?</script>|<style[^>]*>.*?</style>");
    let out = re_blocks.replace_all(s, " ");
    let re_tags = compiled(&RE_TAGS, r"(?is)</?[^>]+>");
    let out = re_tags.replace_all(&out, " ");

    // 2) HTML entity decode, only after markup is gone
    let out = html_escape::decode_html_entities(&out);

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    let out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (includes NBSP)
    let re_ws = compiled(&RE_WS, r"\s+");
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Whitespace-delimited word count.
pub fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_strips_tags_and_entities() {
        let s = "<p>Hello&nbsp;<b>world</b> &ldquo;ok&rdquo;</p>";
        assert_eq!(clean_text(s), r#"Hello world "ok""#);
    }

    #[test]
    fn escaped_angle_brackets_stay_text() {
        assert_eq!(
            clean_text("BTC &lt; 70k and ETH &gt; 3k today"),
            "BTC < 70k and ETH > 3k today"
        );
        assert_eq!(clean_text("<p>a &lt;b&gt; c</p>"), "a <b> c");
    }

    #[test]
    fn clean_text_drops_script_bodies() {
        let s = "<div>before<script>var x = 1;</script>after</div>";
        assert_eq!(clean_text(s), "before after");
    }

    #[test]
    fn clean_text_folds_whitespace() {
        assert_eq!(clean_text("A\u{00A0}\n\tB   C"), "A B C");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn word_count_splits_on_whitespace() {
        assert_eq!(word_count("one two  three\nfour"), 4);
        assert_eq!(word_count("   "), 0);
    }
}
