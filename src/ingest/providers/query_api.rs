// src/ingest/providers/query_api.rs
//! arXiv-style query API source: one GET with a boolean `search_query`, Atom back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::histogram;
use reqwest::Url;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::sources::DEFAULT_QUERY_ENDPOINT;
use crate::config::{QueryParams, SourceConfig, SourceType};
use crate::ingest::dates::resolve_published;
use crate::ingest::error::FetchError;
use crate::ingest::normalize_text;
use crate::ingest::providers::{attach_keywords, get_text, resolve_link, HandlerContext};
use crate::ingest::syndication::{parse_feed, FeedItem};
use crate::ingest::types::{FetchOutcome, RawEntry, SkipReason, SourceHandler, SourceMetadata};
use crate::keywords::KeywordFilter;

pub const QUERY_TIMEOUT: Duration = Duration::from_secs(45);

const ABS_MARKER: &str = "arxiv.org/abs/";

/// `(cat:A OR cat:B) AND (ti:"t" OR abs:"t" ...)`. Categories alone when no terms are set.
pub fn build_search_query(params: &QueryParams) -> String {
    let categories: Vec<String> = if params.categories.is_empty() {
        QueryParams::default().categories
    } else {
        params.categories.clone()
    };
    let cat_clause = format!(
        "({})",
        categories
            .iter()
            .map(|c| format!("cat:{}", c.trim()))
            .collect::<Vec<_>>()
            .join(" OR ")
    );

    let term_parts: Vec<String> = params
        .search_terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .flat_map(|t| [format!("ti:\"{t}\""), format!("abs:\"{t}\"")])
        .collect();

    if term_parts.is_empty() {
        cat_clause
    } else {
        format!("{cat_clause} AND ({})", term_parts.join(" OR "))
    }
}

/// Full request URL for `endpoint` (default arXiv export API when empty).
pub fn build_query_url(endpoint: &str, params: &QueryParams) -> Result<Url, FetchError> {
    let base = if endpoint.trim().is_empty() {
        DEFAULT_QUERY_ENDPOINT
    } else {
        endpoint.trim()
    };
    let mut url = Url::parse(base).map_err(|_| FetchError::InvalidEndpoint(base.to_string()))?;
    url.query_pairs_mut()
        .append_pair("search_query", &build_search_query(params))
        .append_pair("start", "0")
        .append_pair("max_results", &params.max_results.to_string())
        .append_pair("sortBy", &params.sort_by)
        .append_pair("sortOrder", &params.sort_order);
    Ok(url)
}

pub struct QueryApiSource {
    config: SourceConfig,
    filter: Arc<KeywordFilter>,
    client: reqwest::Client,
    timeout: Duration,
}

impl QueryApiSource {
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            config: ctx.config,
            filter: ctx.filter,
            client: ctx.client,
            timeout: QUERY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

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
            tracing::warn!(source = %self.config.name, warning = %w, "query response parsed with errors");
            out.warnings.push(w);
        }

        for item in &parsed.items {
            match self.build_entry(item, cutoff) {
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

        histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(out)
    }

    fn build_entry(&self, item: &FeedItem, cutoff: DateTime<Utc>) -> Result<RawEntry, SkipReason> {
        let published = resolve_published(item, &self.config.parser_config.date_fields)
            .ok_or(SkipReason::NoDate)?;
        if published <= cutoff {
            return Err(SkipReason::TooOld);
        }
        let link = resolve_link(item, &self.config.parser_config.link_field)
            .ok_or(SkipReason::MissingLink)?;

        let summary = item.text("summary").map(normalize_text).unwrap_or_default();
        let authors: Vec<String> = item
            .texts("author/name")
            .into_iter()
            .map(normalize_text)
            .filter(|a| !a.is_empty())
            .collect();
        let categories: Vec<String> = item
            .all("category")
            .filter_map(|c| c.attr("term"))
            .map(str::to_string)
            .collect();

        let external_id = link
            .split_once(ABS_MARKER)
            .or_else(|| item.text("id").and_then(|id| id.split_once(ABS_MARKER)))
            .map(|(_, id)| id.trim_end_matches('/').to_string())
            .filter(|id| !id.is_empty());

        Ok(RawEntry {
            title: item.text("title").map(normalize_text).unwrap_or_default(),
            content: summary.clone(),
            summary,
            link,
            published,
            author: authors.join(", "),
            tags: categories.clone(),
            source_metadata: SourceMetadata {
                external_id,
                doi: item.text("arxiv:doi").map(str::to_string),
                authors,
                categories,
                kind: Some("research_paper".to_string()),
            },
            matched_keywords: Vec::new(),
        })
    }
}

#[async_trait]
impl SourceHandler for QueryApiSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn source_type(&self) -> SourceType {
        SourceType::QueryApi
    }

    async fn fetch(&self, cutoff: DateTime<Utc>) -> Result<FetchOutcome, FetchError> {
        let url = build_query_url(&self.config.endpoint, &self.config.query)?;
        tracing::debug!(source = %self.config.name, url = %url, "querying");
        let body = get_text(&self.client, url.as_str(), self.timeout).await?;
        self.parse_entries(&body, cutoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_with_and_without_terms() {
        let mut p = QueryParams {
            categories: vec!["cs.SE".into(), "cs.AI".into()],
            ..QueryParams::default()
        };
        assert_eq!(build_search_query(&p), "(cat:cs.SE OR cat:cs.AI)");

        p.search_terms = vec!["coding agent".into(), " ".into()];
        assert_eq!(
            build_search_query(&p),
            r#"(cat:cs.SE OR cat:cs.AI) AND (ti:"coding agent" OR abs:"coding agent")"#
        );
    }

    #[test]
    fn empty_categories_use_defaults() {
        let p = QueryParams {
            categories: Vec::new(),
            ..QueryParams::default()
        };
        assert_eq!(
            build_search_query(&p),
            "(cat:cs.AI OR cat:cs.SE OR cat:cs.LG OR cat:stat.ML)"
        );
    }

    #[test]
    fn url_carries_paging_and_sort() {
        let url = build_query_url("", &QueryParams::default()).unwrap();
        assert!(url.as_str().starts_with(DEFAULT_QUERY_ENDPOINT));
        let pairs: std::collections::HashMap<String, String> =
            url.query_pairs().into_owned().collect();
        assert_eq!(pairs["start"], "0");
        assert_eq!(pairs["max_results"], "100");
        assert_eq!(pairs["sortBy"], "submittedDate");
        assert_eq!(pairs["sortOrder"], "descending");
        assert!(pairs["search_query"].starts_with("(cat:cs.AI"));
        assert!(build_query_url("not a url", &QueryParams::default()).is_err());
    }
}
