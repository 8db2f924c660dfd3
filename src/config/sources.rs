// src/config/sources.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_SOURCES_PATH: &str = "INSIGHT_SOURCES_PATH";
pub const DEFAULT_SOURCES_JSON: &str = "config/sources.json";
pub const DEFAULT_SOURCES_TOML: &str = "config/sources.toml";

pub const DEFAULT_QUERY_ENDPOINT: &str = "http://export.arxiv.org/api/query";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    #[serde(alias = "rss", alias = "atom")]
    Feed,
    #[serde(alias = "arxiv")]
    QueryApi,
    /// Anything else in config. Has no handler; skipped with a warning.
    #[serde(other)]
    Unsupported,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Feed => "feed",
            SourceType::QueryApi => "query_api",
            SourceType::Unsupported => "unsupported",
        }
    }
}

/// Which feed elements hold which entry fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    pub title_field: String,
    pub content_fields: Vec<String>,
    pub link_field: String,
    pub author_field: String,
    pub tags_field: String,
    pub date_fields: Vec<String>,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            title_field: "title".into(),
            content_fields: vec![
                "summary".into(),
                "description".into(),
                "content:encoded".into(),
                "content".into(),
            ],
            link_field: "link".into(),
            author_field: "author".into(),
            tags_field: "category".into(),
            date_fields: vec![
                "published".into(),
                "pubDate".into(),
                "updated".into(),
                "dc:date".into(),
            ],
        }
    }
}

/// Parameters only the query-API sources read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    pub search_terms: Vec<String>,
    pub categories: Vec<String>,
    pub max_results: u32,
    pub sort_by: String,
    pub sort_order: String,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            search_terms: Vec::new(),
            categories: ["cs.AI", "cs.SE", "cs.LG", "stat.ML"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_results: 100,
            sort_by: "submittedDate".into(),
            sort_order: "descending".into(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    #[serde(default, alias = "url")]
    pub endpoint: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, alias = "field_mapping")]
    pub parser_config: FieldMapping,
    /// Extra keywords for this source only, on top of the global set.
    #[serde(default)]
    pub relevance_keywords: Vec<String>,
    /// Also count vendor names found in the entry link as matches.
    #[serde(default)]
    pub link_relevance: bool,
    #[serde(flatten)]
    pub query: QueryParams,
}

impl SourceConfig {
    /// Minimal enabled config with default mapping, mostly for tests and demos.
    pub fn new(name: &str, source_type: SourceType, endpoint: &str) -> Self {
        Self {
            name: name.to_string(),
            source_type,
            endpoint: endpoint.to_string(),
            enabled: true,
            parser_config: FieldMapping::default(),
            relevance_keywords: Vec::new(),
            link_relevance: false,
            query: QueryParams::default(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSources {
    List(Vec<SourceConfig>),
    Doc {
        sources: Vec<SourceConfig>,
        #[serde(default)]
        global_keywords: Vec<String>,
    },
}

/// Parsed source list plus any global keywords declared next to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcesFile {
    pub sources: Vec<SourceConfig>,
    pub global_keywords: Vec<String>,
}

impl SourcesFile {
    /// Parse JSON or TOML. `hint_ext` picks the first attempt.
    pub fn parse(s: &str, hint_ext: &str) -> Result<Self> {
        let raw: RawSources = if hint_ext == "toml" {
            toml::from_str(s).context("parsing sources toml")?
        } else {
            match serde_json::from_str(s) {
                Ok(v) => v,
                Err(json_err) => toml::from_str(s)
                    .map_err(|_| anyhow!(json_err))
                    .context("parsing sources json")?,
            }
        };
        let (sources, global_keywords) = match raw {
            RawSources::List(sources) => (sources, Vec::new()),
            RawSources::Doc {
                sources,
                global_keywords,
            } => (sources, global_keywords),
        };
        Ok(Self {
            sources: unique_by_name(sources),
            global_keywords,
        })
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading sources from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        Self::parse(&content, &ext)
    }

    /// Load using env var + fallbacks:
    /// 1) $INSIGHT_SOURCES_PATH
    /// 2) config/sources.json
    /// 3) config/sources.toml
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_SOURCES_PATH} points to non-existent path"));
        }
        for candidate in [DEFAULT_SOURCES_JSON, DEFAULT_SOURCES_TOML] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Ok(Self::default())
    }

    /// Like [`Self::load_default`] but never fails: errors give an empty source list.
    pub fn load_or_empty() -> Self {
        Self::load_default().unwrap_or_else(|e| {
            tracing::error!(error = %format!("{e:#}"), "source config unavailable, no sources loaded");
            Self::default()
        })
    }

    pub fn enabled(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

fn unique_by_name(items: Vec<SourceConfig>) -> Vec<SourceConfig> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for mut it in items {
        it.name = it.name.trim().to_string();
        if it.name.is_empty() {
            tracing::warn!(endpoint = %it.endpoint, "source without a name dropped");
            continue;
        }
        if !seen.insert(it.name.clone()) {
            tracing::warn!(source = %it.name, "duplicate source name, keeping the first");
            continue;
        }
        out.push(it);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn json_list_and_document_forms() {
        let list = r#"[{"name":"blog","type":"rss","endpoint":"https://x/feed"}]"#;
        let v = SourcesFile::parse(list, "json").unwrap();
        assert_eq!(v.sources.len(), 1);
        assert_eq!(v.sources[0].source_type, SourceType::Feed);
        assert!(v.sources[0].enabled);
        assert_eq!(v.sources[0].parser_config, FieldMapping::default());

        let doc = r#"{
            "global_keywords": ["agent"],
            "sources": [
              {"name":"papers","type":"arxiv","search_terms":["coding agent"],"max_results":5},
              {"name":"papers","type":"feed","endpoint":"https://dup"},
              {"name":"x","type":"podcast","enabled":false}
            ]
        }"#;
        let v = SourcesFile::parse(doc, "json").unwrap();
        assert_eq!(v.global_keywords, vec!["agent".to_string()]);
        assert_eq!(v.sources.len(), 2);
        assert_eq!(v.sources[0].source_type, SourceType::QueryApi);
        assert_eq!(v.sources[0].query.max_results, 5);
        assert_eq!(v.sources[0].query.sort_by, "submittedDate");
        assert_eq!(v.sources[1].source_type, SourceType::Unsupported);
        assert_eq!(v.enabled().count(), 1);
    }

    #[test]
    fn toml_form_with_field_mapping() {
        let toml = r#"
global_keywords = ["cursor"]

[[sources]]
name = "changelog"
type = "feed"
endpoint = "https://example.com/atom.xml"

[sources.field_mapping]
title_field = "headline"
"#;
        let v = SourcesFile::parse(toml, "toml").unwrap();
        let m = &v.sources[0].parser_config;
        assert_eq!(m.title_field, "headline");
        assert_eq!(m.link_field, "link");
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(SourcesFile::parse("{not json", "json").is_err());
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_SOURCES_PATH);

        assert!(SourcesFile::load_default().unwrap().sources.is_empty());

        let p = tmp.path().join("mine.json");
        fs::write(&p, r#"[{"name":"a","type":"feed","endpoint":"https://a"}]"#).unwrap();
        env::set_var(ENV_SOURCES_PATH, p.display().to_string());
        assert_eq!(SourcesFile::load_default().unwrap().sources.len(), 1);

        env::set_var(ENV_SOURCES_PATH, tmp.path().join("missing.json").display().to_string());
        assert!(SourcesFile::load_default().is_err());
        assert!(SourcesFile::load_or_empty().sources.is_empty());
        env::remove_var(ENV_SOURCES_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
