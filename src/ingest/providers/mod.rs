// src/ingest/providers/mod.rs
//! Source handlers and the type → constructor registry.

pub mod feed;
pub mod query_api;

use crate::config::{SourceConfig, SourceType};
use crate::ingest::error::FetchError;
use crate::ingest::syndication::FeedItem;
use crate::ingest::types::{RawEntry, SourceHandler};
use crate::keywords::KeywordFilter;
use reqwest::header::{ACCEPT, USER_AGENT};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub use feed::FeedSource;
pub use query_api::QueryApiSource;

pub const BOT_USER_AGENT: &str = concat!(
    "insight-tracker/",
    env!("CARGO_PKG_VERSION"),
    " (feed ingestion bot)"
);
pub const FEED_ACCEPT: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.9, */*;q=0.8";

/// Shared HTTP client. Falls back to reqwest defaults if the builder is rejected.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(BOT_USER_AGENT)
        .gzip(true)
        .deflate(true)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "http client builder failed, using defaults");
            reqwest::Client::new()
        })
}

/// GET `url` and return the body. Any non-2xx status is an error.
pub(crate) async fn get_text(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<String, FetchError> {
    let resp = client
        .get(url)
        .header(USER_AGENT, BOT_USER_AGENT)
        .header(ACCEPT, FEED_ACCEPT)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    resp.text()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))
}

/// Link for an item: element text, then an `href` (alternate/canonical first),
/// then a URL-shaped `guid` or `id`.
pub(crate) fn resolve_link(item: &FeedItem, field: &str) -> Option<String> {
    if let Some(t) = item.text(field) {
        return Some(t.to_string());
    }
    let mut hrefs = item
        .all(field)
        .filter(|e| e.attr("href").is_some_and(|h| !h.trim().is_empty()));
    let preferred = item.all(field).find(|e| {
        matches!(e.attr("rel"), None | Some("alternate") | Some("canonical"))
            && e.attr("href").is_some_and(|h| !h.trim().is_empty())
    });
    if let Some(href) = preferred.or_else(|| hrefs.next()).and_then(|e| e.attr("href")) {
        return Some(href.trim().to_string());
    }
    ["guid", "id"]
        .into_iter()
        .filter_map(|f| item.text(f))
        .find(|t| t.starts_with("http://") || t.starts_with("https://"))
        .map(str::to_string)
}

/// First non-empty text across `fields`, in order.
pub(crate) fn first_text<'a>(item: &'a FeedItem, fields: &[&str]) -> Option<&'a str> {
    fields.iter().find_map(|f| item.text(f))
}

/// Run the keyword filter over an entry and attach the hits. `false` means drop it.
pub(crate) fn attach_keywords(
    filter: &KeywordFilter,
    config: &SourceConfig,
    entry: &mut RawEntry,
) -> bool {
    let mut matched = filter.match_keywords(&config.name, &entry.filter_text());
    if config.link_relevance {
        for kw in filter.match_domain(&config.name, &entry.link) {
            if !matched.contains(&kw) {
                matched.push(kw);
            }
        }
        matched.sort();
    }
    entry.matched_keywords = matched;
    !entry.matched_keywords.is_empty()
}

/// Everything a constructor needs to build a handler.
#[derive(Clone)]
pub struct HandlerContext {
    pub config: SourceConfig,
    pub filter: Arc<KeywordFilter>,
    pub client: reqwest::Client,
}

pub type HandlerCtor = fn(HandlerContext) -> Arc<dyn SourceHandler>;

fn feed_ctor(ctx: HandlerContext) -> Arc<dyn SourceHandler> {
    Arc::new(FeedSource::new(ctx))
}

fn query_api_ctor(ctx: HandlerContext) -> Arc<dyn SourceHandler> {
    Arc::new(QueryApiSource::new(ctx))
}

/// Maps a configured source type onto a handler constructor.
pub struct HandlerRegistry {
    ctors: HashMap<SourceType, HandlerCtor>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl HandlerRegistry {
    pub fn empty() -> Self {
        Self {
            ctors: HashMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut r = Self::empty();
        r.register(SourceType::Feed, feed_ctor);
        r.register(SourceType::QueryApi, query_api_ctor);
        r
    }

    pub fn register(&mut self, source_type: SourceType, ctor: HandlerCtor) {
        self.ctors.insert(source_type, ctor);
    }

    pub fn supports(&self, source_type: SourceType) -> bool {
        self.ctors.contains_key(&source_type)
    }

    /// Handler for one config, or `None` (with a warning) for unsupported types.
    pub fn build(
        &self,
        config: &SourceConfig,
        filter: &Arc<KeywordFilter>,
        client: &reqwest::Client,
    ) -> Option<Arc<dyn SourceHandler>> {
        let Some(ctor) = self.ctors.get(&config.source_type) else {
            tracing::warn!(
                source = %config.name,
                source_type = config.source_type.as_str(),
                "unsupported source type, skipping"
            );
            return None;
        };
        Some(ctor(HandlerContext {
            config: config.clone(),
            filter: Arc::clone(filter),
            client: client.clone(),
        }))
    }

    /// Handlers for every enabled config with a known type.
    pub fn build_enabled<'a, I>(
        &self,
        configs: I,
        filter: &Arc<KeywordFilter>,
        client: &reqwest::Client,
    ) -> Vec<Arc<dyn SourceHandler>>
    where
        I: IntoIterator<Item = &'a SourceConfig>,
    {
        configs
            .into_iter()
            .filter(|c| c.enabled)
            .filter_map(|c| self.build(c, filter, client))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::syndication::parse_feed;

    #[test]
    fn link_fallback_chain() {
        let xml = r#"<feed>
            <entry><link rel="related" href="https://x/pdf"/><link rel="alternate" href="https://x/abs"/></entry>
            <entry><link rel="self" href="https://x/self"/></entry>
            <entry><guid>https://x/guid</guid></entry>
            <entry><guid>tag:x,2024:1</guid></entry>
        </feed>"#;
        let feed = parse_feed(xml).unwrap();
        let links: Vec<Option<String>> =
            feed.items.iter().map(|i| resolve_link(i, "link")).collect();
        assert_eq!(
            links,
            vec![
                Some("https://x/abs".to_string()),
                Some("https://x/self".to_string()),
                Some("https://x/guid".to_string()),
                None
            ]
        );
    }

    #[test]
    fn registry_skips_unsupported_and_disabled() {
        let filter = Arc::new(KeywordFilter::empty());
        let client = reqwest::Client::new();
        let mut off = SourceConfig::new("off", SourceType::Feed, "https://a");
        off.enabled = false;
        let configs = vec![
            SourceConfig::new("blog", SourceType::Feed, "https://a"),
            SourceConfig::new("papers", SourceType::QueryApi, ""),
            SourceConfig::new("pod", SourceType::Unsupported, "https://b"),
            off,
        ];
        let handlers = HandlerRegistry::builtin().build_enabled(&configs, &filter, &client);
        let names: Vec<&str> = handlers.iter().map(|h| h.name()).collect();
        assert_eq!(names, vec!["blog", "papers"]);
        assert_eq!(handlers[1].source_type(), SourceType::QueryApi);
        assert!(!HandlerRegistry::empty().supports(SourceType::Feed));
    }
}
