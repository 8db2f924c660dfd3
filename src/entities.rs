// src/entities.rs
//! Canonical tool / concept detection.
//!
//! Maps matched keywords onto canonical names using alias tables loaded from
//! `tool_aliases.json`:
//!
//! ```json
//! { "tool_aliases": { "Cursor": ["cursor", "cursor ide"] },
//!   "concept_keywords": { "Agents": ["agent", "agentic"] } }
//! ```
//!
//! Missing or malformed config yields empty tables (no detections), never an error.

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::{fs, path::Path};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AliasConfig {
    #[serde(default)]
    pub tool_aliases: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub concept_keywords: BTreeMap<String, Vec<String>>,
}

impl AliasConfig {
    /// Load from a JSON file. Falls back to empty tables on error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                tracing::error!(path = %path.display(), error = %e, "alias config malformed");
                Self::default()
            }),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "alias config unreadable");
                Self::default()
            }
        }
    }
}

type AliasTable = Vec<(String, Vec<String>)>;

fn lower_table(src: BTreeMap<String, Vec<String>>) -> AliasTable {
    src.into_iter()
        .filter(|(canon, _)| !canon.trim().is_empty())
        .map(|(canon, aliases)| {
            let aliases = aliases
                .into_iter()
                .map(|a| a.trim().to_lowercase())
                .filter(|a| !a.is_empty())
                .collect();
            (canon, aliases)
        })
        .collect()
}

fn detect(table: &AliasTable, matched: &[String]) -> Vec<String> {
    if matched.is_empty() {
        return Vec::new();
    }
    let matched: HashSet<String> = matched.iter().map(|m| m.to_lowercase()).collect();
    table
        .iter()
        .filter(|(_, aliases)| aliases.iter().any(|a| matched.contains(a)))
        .map(|(canon, _)| canon.clone())
        .collect()
}

/// Immutable alias-table lookup.
#[derive(Debug, Clone, Default)]
pub struct EntityDetector {
    tools: AliasTable,
    concepts: AliasTable,
}

impl EntityDetector {
    pub fn new(cfg: AliasConfig) -> Self {
        Self {
            tools: lower_table(cfg.tool_aliases),
            concepts: lower_table(cfg.concept_keywords),
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        Self::new(AliasConfig::load_from_file(path))
    }

    /// Canonical tool names whose aliases appear among `matched`. Each name at most once.
    pub fn detect_tools(&self, matched: &[String]) -> Vec<String> {
        detect(&self.tools, matched)
    }

    pub fn detect_concepts(&self, matched: &[String]) -> Vec<String> {
        detect(&self.concepts, matched)
    }

    pub fn canonical_tools(&self) -> Vec<String> {
        self.tools.iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn canonical_concepts(&self) -> Vec<String> {
        self.concepts.iter().map(|(c, _)| c.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> EntityDetector {
        let cfg: AliasConfig = serde_json::from_str(
            r#"{
                "tool_aliases": {
                    "Cursor": ["cursor", "Cursor IDE"],
                    "GitHub Copilot": ["copilot", "github copilot"]
                },
                "concept_keywords": { "Agents": ["agent", "agentic"] }
            }"#,
        )
        .unwrap();
        EntityDetector::new(cfg)
    }

    #[test]
    fn canonical_names_once_and_case_insensitive() {
        let d = detector();
        let matched = vec![
            "COPILOT".to_string(),
            "github copilot".to_string(),
            "cursor ide".to_string(),
        ];
        assert_eq!(d.detect_tools(&matched), vec!["Cursor", "GitHub Copilot"]);
        assert!(d.detect_concepts(&matched).is_empty());
        assert_eq!(d.detect_concepts(&["agentic".into()]), vec!["Agents"]);
    }

    #[test]
    fn empty_inputs_and_missing_file() {
        let d = detector();
        assert!(d.detect_tools(&[]).is_empty());
        let empty = EntityDetector::load_from_file("nope/tool_aliases.json");
        assert!(empty.detect_tools(&["cursor".into()]).is_empty());
        assert!(empty.canonical_tools().is_empty());
    }

    #[test]
    fn listing_helpers() {
        let d = detector();
        assert_eq!(d.canonical_concepts(), vec!["Agents"]);
        assert_eq!(d.canonical_tools(), vec!["Cursor", "GitHub Copilot"]);
    }
}
