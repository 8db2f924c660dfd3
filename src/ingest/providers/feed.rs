// src/ingest/providers/feed.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::histogram;
use std::time::{Duration, Instant};

use crate::config::{FieldMapping, SourceConfig, SourceType};
use crate::ingest::dates::resolve_published;
use crate::ingest::error::FetchError;
use crate::ingest::normalize_text;
use crate::ingest::providers::{attach_keywords, first_text, get_text, resolve_link, HandlerContext};
use crate::ingest::syndication::{parse_feed, FeedItem};
use crate::ingest::types::{FetchOutcome, RawEntry, SkipReason, SourceHandler, SourceMetadata};
use crate::keywords::KeywordFilter;
use std::sync::Arc;

pub const FEED_TIMEOUT: Duration = Duration::from_secs(30);

const AUTHOR_FALLBACKS: &[&str] = &["dc:creator", "author/name", "author"];

/// RSS / Atom source driven by a [`FieldMapping`].
pub struct FeedSource {
    config: SourceConfig,
    filter: Arc<KeywordFilter>,
    client: reqwest::Client,
    timeout: Duration,
}

impl FeedSource {
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            config: ctx.config,
            filter: ctx.filter,
            client: ctx.client,
            timeout: FEED_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Parse a response body into entries newer than `cutoff`.
    pub fn parse_entries(
        &self,
        body: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<FetchOutcome, FetchError> {
        let t0 = Instant::now();
        let parsed = parse_feed(body).map_err(|reason| FetchError::Parse {
            url: self.config.endpoint.clone(),
            reason,
        })?;

        let mut out = FetchOutcome {
            items_seen: parsed.items.len(),
            ..FetchOutcome::default()
        };
        if let Some(w) = parsed.warning {
            tracing::warn!(source = %self.config.name, warning = %w, "feed parsed with errors");
            out.warnings.push(w);
        }
        if parsed.items.is_empty() {
            tracing::warn!(source = %self.config.name, "feed has no entries");
            return Ok(out);
        }

        let mapping = &self.config.parser_config;
        for item in &parsed.items {
            match build_entry(item, mapping, cutoff) {
                Ok(mut entry) => {
                    if attach_keywords(&self.filter, &self.config, &mut entry) {
                        out.entries.push(entry);
                    } else {
                        out.skip(SkipReason::NoKeywordMatch);
                    }
                }
                Err(reason) => out.skip(reason),
            }
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        tracing::debug!(
            source = %self.config.name,
            seen = out.items_seen,
            kept = out.entries.len(),
            "feed parsed"
        );
        Ok(out)
    }
}

fn build_entry(
    item: &FeedItem,
    mapping: &FieldMapping,
    cutoff: DateTime<Utc>,
) -> Result<RawEntry, SkipReason> {
    let published = resolve_published(item, &mapping.date_fields).ok_or(SkipReason::NoDate)?;
    if published <= cutoff {
        return Err(SkipReason::TooOld);
    }
    let link = resolve_link(item, &mapping.link_field).ok_or(SkipReason::MissingLink)?;

    let mut parts: Vec<String> = Vec::new();
    for field in &mapping.content_fields {
        for text in item.texts(field) {
            let t = normalize_text(text);
            if !t.is_empty() && !parts.contains(&t) {
                parts.push(t);
            }
        }
    }
    let summary = parts.first().cloned().unwrap_or_default();
    let content = parts.join(" ");

    let author = item
        .text(&mapping.author_field)
        .or_else(|| first_text(item, AUTHOR_FALLBACKS))
        .map(normalize_text)
        .unwrap_or_default();

    let mut tags: Vec<String> = Vec::new();
    for el in item.all(&mapping.tags_field) {
        let raw = if el.text.trim().is_empty() {
            el.attr("term").or_else(|| el.attr("label")).unwrap_or_default()
        } else {
            el.text.as_str()
        };
        let tag = raw.trim();
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }

    Ok(RawEntry {
        title: item
            .text(&mapping.title_field)
            .map(normalize_text)
            .unwrap_or_default(),
        summary,
        content,
        link,
        published,
        author,
        tags,
        source_metadata: SourceMetadata::default(),
        matched_keywords: Vec::new(),
    })
}

#[async_trait]
impl SourceHandler for FeedSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn source_type(&self) -> SourceType {
        SourceType::Feed
    }

    async fn fetch(&self, cutoff: DateTime<Utc>) -> Result<FetchOutcome, FetchError> {
        if self.config.endpoint.trim().is_empty() {
            return Err(FetchError::InvalidEndpoint(self.config.endpoint.clone()));
        }
        let body = get_text(&self.client, &self.config.endpoint, self.timeout).await?;
        self.parse_entries(&body, cutoff)
    }
}
