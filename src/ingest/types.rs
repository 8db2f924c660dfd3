// src/ingest/types.rs
use crate::config::SourceType;
use crate::ingest::error::FetchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source-specific extras. Every field is optional so feed and query sources share one shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceMetadata {
    /// Identifier assigned by the upstream (e.g. an arXiv id).
    pub external_id: Option<String>,
    pub doi: Option<String>,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    /// Free-form kind, e.g. "research_paper".
    pub kind: Option<String>,
}

/// One fetched item that survived date, cutoff and keyword checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub link: String,
    pub published: DateTime<Utc>,
    pub author: String,
    pub tags: Vec<String>,
    pub source_metadata: SourceMetadata,
    pub matched_keywords: Vec<String>,
}

impl RawEntry {
    /// Text the keyword filter looks at.
    pub fn filter_text(&self) -> String {
        let mut parts: Vec<&str> = vec![
            self.title.as_str(),
            self.summary.as_str(),
            self.content.as_str(),
        ];
        parts.extend(self.tags.iter().map(String::as_str));
        parts.push(self.author.as_str());
        parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What the orchestrator hands to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub id: String,
    pub source_name: String,
    pub source_type: SourceType,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub link: String,
    pub published: DateTime<Utc>,
    pub author: String,
    pub tags: Vec<String>,
    pub source_metadata: SourceMetadata,
    pub matched_keywords: Vec<String>,
    pub mentioned_tools: Vec<String>,
    pub mentioned_concepts: Vec<String>,
    pub snippet: String,
}

/// Stable short id for a `(source_name, link)` pair.
pub fn record_id(source_name: &str, link: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(source_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(link.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Why a single entry was not emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoDate,
    TooOld,
    MissingLink,
    NoKeywordMatch,
    AlreadyStored,
    StoreFailed,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::NoDate => "no_date",
            SkipReason::TooOld => "too_old",
            SkipReason::MissingLink => "missing_link",
            SkipReason::NoKeywordMatch => "no_keyword_match",
            SkipReason::AlreadyStored => "already_stored",
            SkipReason::StoreFailed => "store_failed",
        }
    }
}

/// Handler result: surviving entries plus per-entry bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    pub entries: Vec<RawEntry>,
    /// Items seen in the response before any filtering.
    pub items_seen: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
    pub warnings: Vec<String>,
}

impl FetchOutcome {
    pub fn skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_default() += 1;
    }
}

/// Per-source summary of one orchestrator run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source_name: String,
    pub items_seen: usize,
    pub fetched: usize,
    pub emitted: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl SourceReport {
    pub fn new(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            ..Self::default()
        }
    }

    pub fn skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_default() += 1;
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}

/// A fetch-and-normalize unit for one configured source.
#[async_trait::async_trait]
pub trait SourceHandler: Send + Sync {
    fn name(&self) -> &str;
    fn source_type(&self) -> SourceType;
    /// Entries published strictly after `cutoff` that match at least one keyword.
    async fn fetch(&self, cutoff: DateTime<Utc>) -> Result<FetchOutcome, FetchError>;
}
