// src/ingest/mod.rs
pub mod dates;
pub mod error;
pub mod orchestrator;
pub mod providers;
pub mod store;
pub mod syndication;
pub mod types;

pub use error::{FetchError, StoreError};
pub use orchestrator::{Orchestrator, RunReport, DEFAULT_CONCURRENCY};
pub use store::{CandidateStore, MemoryStore};
pub use types::{CandidateRecord, FetchOutcome, RawEntry, SkipReason, SourceHandler, SourceReport};

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

const MAX_TEXT_CHARS: usize = 20_000;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ingest_entries_fetched_total",
            "Entries returned by source handlers after date and keyword checks."
        );
        describe_counter!(
            "ingest_candidates_emitted_total",
            "Candidate records committed to the store."
        );
        describe_counter!(
            "ingest_entries_skipped_total",
            "Entries skipped, labelled by reason."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Source fetch/parse failures."
        );
        describe_histogram!("ingest_fetch_ms", "Per-source fetch time in milliseconds.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!(
            "ingest_last_run_ts",
            "Unix ts when the ingestion run last finished."
        );
    });
}

/// Normalize feed text: decode entities, drop tags, fold curly quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags (a space keeps adjacent blocks apart)
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }

    out
}
