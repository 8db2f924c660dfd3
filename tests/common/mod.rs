// tests/common/mod.rs
// Shared fakes for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use insight_tracker::config::SourceType;
use insight_tracker::ingest::{FetchError, FetchOutcome, RawEntry, SourceHandler};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn entry(link: &str, title: &str, keywords: &[&str]) -> RawEntry {
    RawEntry {
        title: title.to_string(),
        summary: format!("{title}. A short summary about coding tools."),
        content: format!("{title}. The longer body text talks about AI coding agents in editors."),
        link: link.to_string(),
        published: Utc::now() - Duration::minutes(5),
        author: "Test Author".into(),
        tags: vec!["ai".into()],
        source_metadata: Default::default(),
        matched_keywords: keywords.iter().map(|k| k.to_string()).collect(),
    }
}

/// Tracks how many fetches are running at once and the peak.
#[derive(Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

pub enum Behavior {
    Entries(Vec<RawEntry>),
    Fail,
    Panic,
}

pub struct MockHandler {
    pub name: String,
    pub behavior: Behavior,
    pub delay: Option<std::time::Duration>,
    pub in_flight: Option<Arc<InFlight>>,
    pub calls: AtomicUsize,
}

impl MockHandler {
    pub fn new(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            delay: None,
            in_flight: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn entries(name: &str, entries: Vec<RawEntry>) -> Arc<dyn SourceHandler> {
        Arc::new(Self::new(name, Behavior::Entries(entries)))
    }

    pub fn failing(name: &str) -> Arc<dyn SourceHandler> {
        Arc::new(Self::new(name, Behavior::Fail))
    }

    pub fn panicking(name: &str) -> Arc<dyn SourceHandler> {
        Arc::new(Self::new(name, Behavior::Panic))
    }

    pub fn slow(
        name: &str,
        delay: std::time::Duration,
        in_flight: Arc<InFlight>,
    ) -> Arc<dyn SourceHandler> {
        let mut h = Self::new(name, Behavior::Entries(Vec::new()));
        h.delay = Some(delay);
        h.in_flight = Some(in_flight);
        Arc::new(h)
    }
}

#[async_trait]
impl SourceHandler for MockHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> SourceType {
        SourceType::Feed
    }

    async fn fetch(&self, cutoff: DateTime<Utc>) -> Result<FetchOutcome, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(f) = &self.in_flight {
            f.enter();
        }
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if let Some(f) = &self.in_flight {
            f.leave();
        }
        match &self.behavior {
            Behavior::Entries(v) => Ok(FetchOutcome {
                items_seen: v.len(),
                entries: v.iter().filter(|e| e.published > cutoff).cloned().collect(),
                ..FetchOutcome::default()
            }),
            Behavior::Fail => Err(FetchError::Status {
                status: 503,
                url: format!("https://{}.invalid/feed", self.name),
            }),
            Behavior::Panic => panic!("handler {} blew up", self.name),
        }
    }
}
