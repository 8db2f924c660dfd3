// src/keywords.rs
//! Keyword relevance filter.
//!
//! A [`KeywordFilter`] holds a global keyword set plus per-source overrides and answers
//! "which configured keywords does this text mention?". Keywords are stored lowercase and
//! matched on whole-word boundaries, with two carve-outs:
//!
//! - short acronyms (`ai`, `llm`, ...) only match in all-lower or all-upper form,
//!   so "Ai" inside a name or "Ide" in a title do not count;
//! - `amp` is gated: it needs an approved capitalized spelling plus a coding/AI
//!   context term somewhere in the same text.
//!
//! The filter is built once and shared read-only (`Arc<KeywordFilter>`).

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;

/// Acronyms that collide with ordinary words when matched case-insensitively.
pub const SHORT_KEYWORDS: &[&str] = &[
    "ai", "ml", "llm", "ide", "mcp", "api", "sdk", "cli", "gpt", "rag",
];

/// Keywords that need an approved spelling plus coding/AI context.
pub const GATED_KEYWORDS: &[(&str, &[&str])] = &[("amp", &["Amp", "AmpCode", "Ampcode"])];

/// Coding/AI vocabulary. Shared with the snippet scorer.
pub const CONTEXT_TERMS: &[&str] = &[
    "ai",
    "artificial intelligence",
    "code",
    "coding",
    "programming",
    "developer",
    "development",
    "agent",
    "agentic",
    "llm",
    "language model",
    "tool",
    "assistant",
    "copilot",
    "framework",
    "library",
    "ide",
    "editor",
    "automation",
    "machine learning",
    "neural",
    "model",
    "chatgpt",
    "openai",
    "github",
    "cursor",
    "vscode",
    "replit",
    "claude",
    "anthropic",
];

/// Vendor names looked up in link/domain text by [`KeywordFilter::match_domain`].
pub const DOMAIN_KEYWORDS: &[&str] = &[
    "ampcode",
    "anthropic",
    "codeium",
    "cursor",
    "deepmind",
    "github",
    "huggingface",
    "jetbrains",
    "openai",
    "replit",
    "sourcegraph",
    "tabnine",
];

static CONTEXT_RE: Lazy<Regex> = Lazy::new(|| {
    let alts: Vec<String> = CONTEXT_TERMS.iter().map(|t| phrase_body(t)).collect();
    Regex::new(&format!(r"(?i)\b(?:{})s?\b", alts.join("|"))).expect("context regex")
});

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub(crate) fn phrase_body(term: &str) -> String {
    term.split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+")
}

/// Whole-word pattern for `term`. Word boundaries are only asserted on edges that are
/// word characters, so `c++` or `.net` still match. Inner spaces accept any whitespace run.
pub(crate) fn word_pattern(term: &str) -> String {
    let term = term.trim();
    let lead = if term.chars().next().is_some_and(is_word_char) {
        r"\b"
    } else {
        ""
    };
    let tail = if term.chars().last().is_some_and(is_word_char) {
        r"\b"
    } else {
        ""
    };
    format!("{lead}{}{tail}", phrase_body(term))
}

/// True when any coding/AI context term appears in `text`.
pub fn has_coding_context(text: &str) -> bool {
    CONTEXT_RE.is_match(text)
}

/// On-disk keyword configuration (`keywords.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordConfig {
    #[serde(default)]
    pub global_keywords: Vec<String>,
    #[serde(default)]
    pub per_source_keywords: HashMap<String, Vec<String>>,
}

impl KeywordConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("parsing keyword config json")
    }

    /// Load from a JSON file. Falls back to an empty config on error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let parsed = fs::read_to_string(path)
            .with_context(|| format!("reading keyword config from {}", path.display()))
            .and_then(|s| Self::from_json_str(&s));
        match parsed {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "keyword config unavailable, no keywords loaded");
                Self::default()
            }
        }
    }

    pub fn extend_global<I, S>(&mut self, keywords: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.global_keywords
            .extend(keywords.into_iter().map(Into::into));
    }

    pub fn extend_source<I, S>(&mut self, source: &str, keywords: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.per_source_keywords
            .entry(source.to_string())
            .or_default()
            .extend(keywords.into_iter().map(Into::into));
    }
}

#[derive(Debug)]
enum Matcher {
    /// Case-insensitive whole word, run on lowercased text.
    Word(Regex),
    /// Whole word in lower or upper form, run on the original text.
    Acronym(Regex),
    /// Approved spellings, case-sensitive, plus coding context.
    Gated(Regex),
}

impl Matcher {
    fn compile(keyword: &str) -> Option<Self> {
        let built = if let Some((_, spellings)) =
            GATED_KEYWORDS.iter().find(|(k, _)| *k == keyword)
        {
            let alts: Vec<String> = spellings.iter().map(|s| word_pattern(s)).collect();
            Regex::new(&format!("(?:{})", alts.join("|"))).map(Matcher::Gated)
        } else if SHORT_KEYWORDS.contains(&keyword) {
            let upper = keyword.to_uppercase();
            Regex::new(&format!(
                "(?:{}|{})",
                word_pattern(keyword),
                word_pattern(&upper)
            ))
            .map(Matcher::Acronym)
        } else {
            Regex::new(&word_pattern(keyword)).map(Matcher::Word)
        };

        match built {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!(keyword, error = %e, "keyword pattern rejected");
                None
            }
        }
    }

    fn is_match(&self, lowered: &str, original: &str) -> bool {
        match self {
            Matcher::Word(re) => re.is_match(lowered),
            Matcher::Acronym(re) => re.is_match(original),
            Matcher::Gated(re) => re.is_match(original) && has_coding_context(original),
        }
    }
}

/// Per-source keyword counts, for status endpoints.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FilterSummary {
    pub global_keywords: usize,
    pub per_source_keywords: BTreeMap<String, usize>,
    pub total_unique_keywords: usize,
}

/// Immutable keyword filter.
#[derive(Debug, Default)]
pub struct KeywordFilter {
    global: BTreeSet<String>,
    overrides: HashMap<String, BTreeSet<String>>,
    matchers: HashMap<String, Matcher>,
}

fn clean_set<I, S>(items: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl KeywordFilter {
    pub fn new<I, S>(global: I, overrides: HashMap<String, Vec<String>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let global = clean_set(global);
        let overrides: HashMap<String, BTreeSet<String>> = overrides
            .into_iter()
            .map(|(source, kws)| (source, clean_set(kws)))
            .filter(|(_, kws)| !kws.is_empty())
            .collect();

        let mut matchers = HashMap::new();
        for kw in global.iter().chain(overrides.values().flatten()) {
            if matchers.contains_key(kw) {
                continue;
            }
            if let Some(m) = Matcher::compile(kw) {
                matchers.insert(kw.clone(), m);
            }
        }

        tracing::info!(
            global = global.len(),
            sources_with_overrides = overrides.len(),
            "keyword filter ready"
        );

        Self {
            global,
            overrides,
            matchers,
        }
    }

    pub fn from_config(cfg: &KeywordConfig) -> Self {
        Self::new(&cfg.global_keywords, cfg.per_source_keywords.clone())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    fn effective(&self, source_name: &str) -> impl Iterator<Item = &String> {
        self.global
            .iter()
            .chain(self.overrides.get(source_name).into_iter().flatten())
    }

    /// Keywords (lowercase, sorted, unique) from the source's effective set found in `text`.
    pub fn match_keywords(&self, source_name: &str, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let lowered = text.to_lowercase();
        let mut hits = BTreeSet::new();
        for kw in self.effective(source_name) {
            if hits.contains(kw) {
                continue;
            }
            if let Some(m) = self.matchers.get(kw) {
                if m.is_match(&lowered, text) {
                    hits.insert(kw.clone());
                }
            }
        }
        hits.into_iter().collect()
    }

    /// Vendor names found in URL/domain text. Sources without any keywords get nothing.
    pub fn match_domain(&self, source_name: &str, domain_text: &str) -> Vec<String> {
        if domain_text.trim().is_empty() || self.effective(source_name).next().is_none() {
            return Vec::new();
        }
        static DOMAIN_RES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
            DOMAIN_KEYWORDS
                .iter()
                .filter_map(|kw| Regex::new(&word_pattern(kw)).ok().map(|re| (*kw, re)))
                .collect()
        });
        let lowered = domain_text.to_lowercase();
        DOMAIN_RES
            .iter()
            .filter(|(_, re)| re.is_match(&lowered))
            .map(|(kw, _)| kw.to_string())
            .collect()
    }

    pub fn is_relevant(&self, source_name: &str, text: &str) -> bool {
        !self.match_keywords(source_name, text).is_empty()
    }

    /// Effective keyword set for a source (global ∪ override).
    pub fn keywords_for_source(&self, source_name: &str) -> BTreeSet<String> {
        self.effective(source_name).cloned().collect()
    }

    /// Every keyword the filter knows, across global and all overrides.
    pub fn all_keywords(&self) -> BTreeSet<String> {
        self.global
            .iter()
            .chain(self.overrides.values().flatten())
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> FilterSummary {
        FilterSummary {
            global_keywords: self.global.len(),
            per_source_keywords: self
                .overrides
                .iter()
                .map(|(k, v)| (k.clone(), v.len()))
                .collect(),
            total_unique_keywords: self.all_keywords().len(),
        }
    }
}
