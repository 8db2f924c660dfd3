// src/ingest/orchestrator.rs
//! Fan-out over enabled sources under a concurrency cap, then dedup, enrich and store.
//!
//! Every source runs in its own task. A failing or panicking source reports 0 and is logged;
//! the others carry on. Fetches overlap up to the limit; the insert-then-commit section is
//! serialized so each commit only ever covers one source's rows.

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, Semaphore};

use crate::config::SourceType;
use crate::entities::EntityDetector;
use crate::ingest::ensure_metrics_described;
use crate::ingest::error::StoreError;
use crate::ingest::store::CandidateStore;
use crate::ingest::types::{
    record_id, CandidateRecord, RawEntry, SkipReason, SourceHandler, SourceReport,
};
use crate::snippet::extract_snippet;

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_SNIPPET_MAX_LENGTH: usize = 200;
pub const MAX_TITLE_CHARS: usize = 200;

/// Outcome of one run across all selected sources.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cutoff: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
}

impl RunReport {
    /// Emitted records per source name.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.sources
            .iter()
            .map(|r| (r.source_name.clone(), r.emitted))
            .collect()
    }

    pub fn total(&self) -> usize {
        self.sources.iter().map(|r| r.emitted).sum()
    }

    pub fn failed_sources(&self) -> Vec<&str> {
        self.sources
            .iter()
            .filter(|r| r.error.is_some())
            .map(|r| r.source_name.as_str())
            .collect()
    }
}

pub struct Orchestrator {
    handlers: Vec<Arc<dyn SourceHandler>>,
    detector: Arc<EntityDetector>,
    snippet_max_length: usize,
}

impl Orchestrator {
    pub fn new(handlers: Vec<Arc<dyn SourceHandler>>, detector: Arc<EntityDetector>) -> Self {
        Self {
            handlers,
            detector,
            snippet_max_length: DEFAULT_SNIPPET_MAX_LENGTH,
        }
    }

    pub fn with_snippet_max_length(mut self, max: usize) -> Self {
        self.snippet_max_length = max;
        self
    }

    pub fn source_names(&self) -> Vec<String> {
        self.handlers.iter().map(|h| h.name().to_string()).collect()
    }

    /// Emitted record count per source.
    pub async fn run(
        &self,
        store: Arc<dyn CandidateStore>,
        cutoff: DateTime<Utc>,
        concurrency_limit: usize,
        subset: Option<&[String]>,
    ) -> BTreeMap<String, usize> {
        self.run_with_report(store, cutoff, concurrency_limit, subset)
            .await
            .counts()
    }

    pub async fn run_with_report(
        &self,
        store: Arc<dyn CandidateStore>,
        cutoff: DateTime<Utc>,
        concurrency_limit: usize,
        subset: Option<&[String]>,
    ) -> RunReport {
        ensure_metrics_described();
        let started_at = Utc::now();

        let selected: Vec<Arc<dyn SourceHandler>> = self
            .handlers
            .iter()
            .filter(|h| subset.map_or(true, |names| names.iter().any(|n| n == h.name())))
            .cloned()
            .collect();
        if let Some(names) = subset {
            for n in names.iter().filter(|n| !selected.iter().any(|h| h.name() == n.as_str())) {
                tracing::warn!(source = %n, "requested source is not configured or not enabled");
            }
        }

        let sem = Arc::new(Semaphore::new(concurrency_limit.max(1)));
        let store_gate = Arc::new(Mutex::new(()));
        tracing::info!(
            sources = selected.len(),
            limit = concurrency_limit.max(1),
            cutoff = %cutoff,
            "ingestion run starting"
        );

        let mut tasks = Vec::with_capacity(selected.len());
        for handler in selected {
            let name = handler.name().to_string();
            let job = SourceJob {
                handler,
                sem: Arc::clone(&sem),
                store_gate: Arc::clone(&store_gate),
                store: Arc::clone(&store),
                detector: Arc::clone(&self.detector),
                cutoff,
                snippet_max_length: self.snippet_max_length,
            };
            tasks.push((name, tokio::spawn(job.run())));
        }

        let mut sources = Vec::with_capacity(tasks.len());
        for (name, handle) in tasks {
            match handle.await {
                Ok(report) => sources.push(report),
                Err(e) => {
                    tracing::error!(source = %name, error = %e, "source task aborted");
                    counter!("ingest_source_errors_total", "source" => name.clone(), "kind" => "task")
                        .increment(1);
                    let mut report = SourceReport::new(&name);
                    report.error = Some(format!("task aborted: {e}"));
                    sources.push(report);
                }
            }
        }

        let finished_at = Utc::now();
        gauge!("ingest_last_run_ts").set(finished_at.timestamp() as f64);
        let report = RunReport {
            started_at,
            finished_at,
            cutoff,
            sources,
        };
        tracing::info!(
            total = report.total(),
            failed = report.failed_sources().len(),
            "ingestion run finished"
        );
        report
    }
}

struct SourceJob {
    handler: Arc<dyn SourceHandler>,
    sem: Arc<Semaphore>,
    store_gate: Arc<Mutex<()>>,
    store: Arc<dyn CandidateStore>,
    detector: Arc<EntityDetector>,
    cutoff: DateTime<Utc>,
    snippet_max_length: usize,
}

impl SourceJob {
    async fn run(self) -> SourceReport {
        let name = self.handler.name().to_string();
        let mut report = SourceReport::new(&name);

        let fetched = {
            let Ok(_permit) = self.sem.acquire().await else {
                report.error = Some("concurrency gate closed".into());
                return report;
            };
            let t0 = Instant::now();
            let res = self.handler.fetch(self.cutoff).await;
            histogram!("ingest_fetch_ms", "source" => name.clone())
                .record(t0.elapsed().as_secs_f64() * 1_000.0);
            res
        };

        let outcome = match fetched {
            Ok(o) => o,
            Err(e) => {
                tracing::error!(source = %name, error = %e, "source fetch failed");
                counter!("ingest_source_errors_total", "source" => name.clone(), "kind" => e.kind())
                    .increment(1);
                report.error = Some(e.to_string());
                return report;
            }
        };

        report.items_seen = outcome.items_seen;
        report.fetched = outcome.entries.len();
        report.skipped = outcome.skipped;
        report.warnings = outcome.warnings;
        counter!("ingest_entries_fetched_total", "source" => name.clone())
            .increment(report.fetched as u64);

        report.emitted = {
            let _gate = self.store_gate.lock().await;
            self.store_entries(outcome.entries, &mut report).await
        };

        for (reason, n) in &report.skipped {
            counter!("ingest_entries_skipped_total", "reason" => reason.as_str())
                .increment(*n as u64);
        }
        counter!("ingest_candidates_emitted_total", "source" => name.clone())
            .increment(report.emitted as u64);
        tracing::info!(
            source = %name,
            fetched = report.fetched,
            emitted = report.emitted,
            skipped = report.skipped_total(),
            "source processed"
        );
        report
    }

    async fn store_entries(&self, entries: Vec<RawEntry>, report: &mut SourceReport) -> usize {
        let name = self.handler.name();
        let source_type = self.handler.source_type();
        let mut staged = 0usize;

        for entry in entries {
            match self.store.exists(name, &entry.link).await {
                Ok(true) => {
                    report.skip(SkipReason::AlreadyStored);
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(source = %name, link = %entry.link, error = %e, "existence check failed");
                    report.skip(SkipReason::StoreFailed);
                    continue;
                }
            }

            let record = to_record(
                name,
                source_type,
                entry,
                &self.detector,
                self.snippet_max_length,
            );
            match self.store.insert(record).await {
                Ok(()) => staged += 1,
                Err(StoreError::Duplicate { .. }) => report.skip(SkipReason::AlreadyStored),
                Err(e) => {
                    tracing::warn!(source = %name, error = %e, "insert failed");
                    report.skip(SkipReason::StoreFailed);
                }
            }
        }

        if staged == 0 {
            return 0;
        }
        match self.store.commit().await {
            Ok(()) => staged,
            Err(e) => {
                tracing::error!(source = %name, error = %e, "commit failed");
                if let Err(re) = self.store.rollback().await {
                    tracing::error!(source = %name, error = %re, "rollback failed");
                }
                report.error = Some(format!("commit failed: {e}"));
                0
            }
        }
    }
}

fn to_record(
    source_name: &str,
    source_type: SourceType,
    entry: RawEntry,
    detector: &EntityDetector,
    snippet_max_length: usize,
) -> CandidateRecord {
    let mentioned_tools = detector.detect_tools(&entry.matched_keywords);
    let mentioned_concepts = detector.detect_concepts(&entry.matched_keywords);
    let snippet_source = if entry.content.is_empty() {
        &entry.summary
    } else {
        &entry.content
    };
    let snippet = extract_snippet(snippet_source, None, snippet_max_length, false);
    let title: String = entry.title.chars().take(MAX_TITLE_CHARS).collect();

    CandidateRecord {
        id: record_id(source_name, &entry.link),
        source_name: source_name.to_string(),
        source_type,
        title,
        summary: entry.summary,
        content: entry.content,
        link: entry.link,
        published: entry.published,
        author: entry.author,
        tags: entry.tags,
        source_metadata: entry.source_metadata,
        matched_keywords: entry.matched_keywords,
        mentioned_tools,
        mentioned_concepts,
        snippet,
    }
}
