// tests/feed_source.rs
//
// FeedSource over real HTTP (wiremock) and over fixture bodies.
//
// Covered:
// - RSS: cutoff, keyword filter, content:encoded merge, dc:creator author
// - Atom: rel=alternate link, author/name, category@term, undated entries skipped
// - HTTP 404 and slow upstream surface as errors
// - malformed XML

use chrono::{TimeZone, Utc};
use insight_tracker::config::{SourceConfig, SourceType};
use insight_tracker::ingest::providers::{FeedSource, HandlerContext, BOT_USER_AGENT};
use insight_tracker::ingest::{FetchError, SkipReason, SourceHandler};
use insight_tracker::keywords::KeywordFilter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BLOG_RSS: &str = include_str!("fixtures/blog_rss.xml");
const RELEASE_ATOM: &str = include_str!("fixtures/release_atom.xml");

fn feed(name: &str, endpoint: &str, keywords: &[&str]) -> FeedSource {
    FeedSource::new(HandlerContext {
        config: SourceConfig::new(name, SourceType::Feed, endpoint),
        filter: Arc::new(KeywordFilter::new(keywords.iter().copied(), HashMap::new())),
        client: reqwest::Client::new(),
    })
}

fn cutoff() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 15, 0, 0, 0).unwrap()
}

#[tokio::test]
async fn rss_over_http_keeps_recent_relevant_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .and(header("user-agent", BOT_USER_AGENT))
        .and(header_exists("accept"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string(BLOG_RSS),
        )
        .expect(1)
        .mount(&server)
        .await;

    let src = feed(
        "Example Blog",
        &format!("{}/feed.xml", server.uri()),
        &["ai", "coding"],
    );
    let out = src.fetch(cutoff()).await.expect("fetch ok");

    assert_eq!(out.items_seen, 3);
    assert_eq!(out.entries.len(), 2);
    assert_eq!(out.skipped[&SkipReason::TooOld], 1);

    let first = &out.entries[0];
    assert_eq!(first.link, "https://blog.example/posts/ai-pair");
    assert_eq!(first.matched_keywords, vec!["ai"]);
    assert_eq!(first.author, "Dana Lee");
    assert_eq!(first.tags, vec!["Engineering"]);
    assert_eq!(
        first.summary,
        "We rebuilt our editor integration around an agent."
    );
    assert!(first.content.contains("It now plans multi-file edits."));
    assert!(!first.content.contains("<p>"));
    assert_eq!(
        first.published,
        Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap()
    );

    assert_eq!(out.entries[1].matched_keywords, vec!["coding"]);
}

#[tokio::test]
async fn irrelevant_items_are_counted_not_returned() {
    let src = feed("Example Blog", "https://blog.example/feed", &["kubernetes"]);
    let out = src.parse_entries(BLOG_RSS, cutoff()).expect("parse ok");
    assert!(out.entries.is_empty());
    assert_eq!(out.skipped[&SkipReason::NoKeywordMatch], 2);
    assert_eq!(out.skipped[&SkipReason::TooOld], 1);
}

#[tokio::test]
async fn atom_entries_use_alternate_links_and_nested_authors() {
    let src = feed("Releases", "https://releases.example/atom", &["agent", "cursor"]);
    let out = src.parse_entries(RELEASE_ATOM, cutoff()).expect("parse ok");

    assert_eq!(out.items_seen, 3);
    assert_eq!(out.entries.len(), 1);
    assert_eq!(out.skipped[&SkipReason::NoKeywordMatch], 1);
    assert_eq!(out.skipped[&SkipReason::NoDate], 1);

    let e = &out.entries[0];
    assert_eq!(e.link, "https://releases.example/cursor-0-35");
    assert_eq!(e.author, "Release Bot");
    assert_eq!(e.tags, vec!["cursor"]);
    assert_eq!(e.summary, "Agents now run in the background.");
    assert_eq!(e.matched_keywords, vec!["cursor"]);
}

#[tokio::test]
async fn not_found_is_a_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let src = feed("Gone", &format!("{}/gone.xml", server.uri()), &["ai"]);
    match src.fetch(cutoff()).await {
        Err(FetchError::Status { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(BLOG_RSS)
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let src = feed("Slow", &format!("{}/feed.xml", server.uri()), &["ai"])
        .with_timeout(Duration::from_millis(50));
    let err = src.fetch(cutoff()).await.expect_err("should time out");
    assert!(matches!(err, FetchError::Timeout { .. }), "{err:?}");
    assert_eq!(err.kind(), "timeout");
}

#[tokio::test]
async fn empty_endpoint_is_rejected_without_a_request() {
    let src = feed("Nowhere", "  ", &["ai"]);
    assert!(matches!(
        src.fetch(cutoff()).await,
        Err(FetchError::InvalidEndpoint(_))
    ));
}

#[test]
fn non_feed_document_is_a_parse_error() {
    let src = feed("Html", "https://html.example/", &["ai"]);
    let err = src
        .parse_entries("<html><body>not a feed</body></html>", cutoff())
        .expect_err("html is not a feed");
    assert!(matches!(err, FetchError::Parse { .. }));
}
