// src/service.rs
//! Trigger / status boundary around the orchestrator.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, RwLock};

use crate::config::{clamp_hours_back, Settings, SourcesFile};
use crate::entities::EntityDetector;
use crate::ingest::providers::{http_client, HandlerRegistry};
use crate::ingest::{CandidateStore, Orchestrator, RunReport};
use crate::keywords::{FilterSummary, KeywordConfig, KeywordFilter};

const HISTORY_CAP: usize = 50;

/// Compact record of a finished run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub hours_back: i64,
    pub counts: BTreeMap<String, usize>,
    pub failed: Vec<String>,
}

impl From<(&RunReport, i64)> for RunSummary {
    fn from((r, hours_back): (&RunReport, i64)) -> Self {
        Self {
            started_at: r.started_at,
            finished_at: r.finished_at,
            hours_back,
            counts: r.counts(),
            failed: r.failed_sources().into_iter().map(String::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IngestStatus {
    pub last_run: Option<RunSummary>,
    /// Emitted per source over runs that finished in the last 24 h.
    pub counts_24h: BTreeMap<String, usize>,
    pub total_24h: usize,
    pub runs_retained: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourcesInfo {
    pub sources: Vec<String>,
    pub keywords: FilterSummary,
    pub canonical_tools: Vec<String>,
    pub canonical_concepts: Vec<String>,
}

pub struct IngestService {
    orchestrator: Orchestrator,
    store: Arc<dyn CandidateStore>,
    filter: Arc<KeywordFilter>,
    detector: Arc<EntityDetector>,
    settings: Settings,
    history: RwLock<VecDeque<RunSummary>>,
}

impl IngestService {
    pub fn new(
        orchestrator: Orchestrator,
        store: Arc<dyn CandidateStore>,
        filter: Arc<KeywordFilter>,
        detector: Arc<EntityDetector>,
        settings: Settings,
    ) -> Self {
        Self {
            orchestrator,
            store,
            filter,
            detector,
            settings,
            history: RwLock::new(VecDeque::with_capacity(HISTORY_CAP)),
        }
    }

    /// Wire everything from config files. Bad config degrades to empty tables, never an error.
    pub fn from_config(
        settings: Settings,
        sources: SourcesFile,
        store: Arc<dyn CandidateStore>,
    ) -> Self {
        let mut kw = KeywordConfig::load_from_file(&settings.keywords_path);
        kw.extend_global(sources.global_keywords.iter().cloned());
        for s in &sources.sources {
            if !s.relevance_keywords.is_empty() {
                kw.extend_source(&s.name, s.relevance_keywords.iter().cloned());
            }
        }
        let filter = Arc::new(KeywordFilter::from_config(&kw));
        let detector = Arc::new(EntityDetector::load_from_file(&settings.aliases_path));

        let handlers =
            HandlerRegistry::builtin().build_enabled(&sources.sources, &filter, &http_client());
        let orchestrator = Orchestrator::new(handlers, Arc::clone(&detector))
            .with_snippet_max_length(settings.snippet_max_length);

        Self::new(orchestrator, store, filter, detector, settings)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn source_names(&self) -> Vec<String> {
        self.orchestrator.source_names()
    }

    pub fn sources_info(&self) -> SourcesInfo {
        SourcesInfo {
            sources: self.source_names(),
            keywords: self.filter.summary(),
            canonical_tools: self.detector.canonical_tools(),
            canonical_concepts: self.detector.canonical_concepts(),
        }
    }

    /// Run every enabled source (or `subset`) for entries newer than `cutoff_hours` ago.
    /// The window is clamped to `1..=MAX_HOURS_BACK` hours.
    pub async fn run_ingestion(
        &self,
        cutoff_hours: i64,
        subset: Option<Vec<String>>,
    ) -> BTreeMap<String, usize> {
        self.run_with_report(cutoff_hours, subset).await.counts()
    }

    pub async fn run_with_report(&self, cutoff_hours: i64, subset: Option<Vec<String>>) -> RunReport {
        let hours = clamp_hours_back(cutoff_hours);
        let cutoff = Utc::now() - Duration::hours(hours);
        let report = self
            .orchestrator
            .run_with_report(
                Arc::clone(&self.store),
                cutoff,
                self.settings.concurrency_limit,
                subset.as_deref(),
            )
            .await;
        self.remember(RunSummary::from((&report, hours)));
        report
    }

    fn remember(&self, summary: RunSummary) {
        match self.history.write() {
            Ok(mut h) => {
                if h.len() == HISTORY_CAP {
                    h.pop_front();
                }
                h.push_back(summary);
            }
            Err(_) => tracing::error!("run history lock poisoned, summary dropped"),
        }
    }

    pub fn status(&self) -> IngestStatus {
        let since = Utc::now() - Duration::hours(24);
        let Ok(h) = self.history.read() else {
            return IngestStatus {
                last_run: None,
                counts_24h: BTreeMap::new(),
                total_24h: 0,
                runs_retained: 0,
            };
        };
        let mut counts_24h: BTreeMap<String, usize> = BTreeMap::new();
        for run in h.iter().filter(|r| r.finished_at >= since) {
            for (source, n) in &run.counts {
                *counts_24h.entry(source.clone()).or_default() += n;
            }
        }
        IngestStatus {
            last_run: h.back().cloned(),
            total_24h: counts_24h.values().sum(),
            counts_24h,
            runs_retained: h.len(),
        }
    }
}
