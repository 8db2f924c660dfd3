// src/ingest/store.rs
//! Persistence boundary. The real relational store lives elsewhere; [`MemoryStore`]
//! backs the binary and the tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::ingest::error::StoreError;
use crate::ingest::types::CandidateRecord;

#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// True when `(source_name, link)` is already stored or staged.
    async fn exists(&self, source_name: &str, link: &str) -> Result<bool, StoreError>;
    /// Stage a record. Uniqueness violations come back as [`StoreError::Duplicate`].
    async fn insert(&self, record: CandidateRecord) -> Result<(), StoreError>;
    /// Make staged records durable.
    async fn commit(&self) -> Result<(), StoreError>;
    /// Drop staged records after a failed commit. Backends that roll back on their own
    /// can keep the default.
    async fn rollback(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

type Key = (String, String);

#[derive(Default)]
struct Inner {
    committed: HashMap<Key, CandidateRecord>,
    staged: Vec<CandidateRecord>,
}

impl Inner {
    fn contains(&self, source_name: &str, link: &str) -> bool {
        self.committed
            .contains_key(&(source_name.to_string(), link.to_string()))
            || self
                .staged
                .iter()
                .any(|r| r.source_name == source_name && r.link == link)
    }
}

/// In-process store with staged inserts and a `(source_name, link)` unique key.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }

    /// Number of committed records.
    pub fn len(&self) -> usize {
        self.lock().map(|g| g.committed.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Committed records for one source, newest first.
    pub fn records_for(&self, source_name: &str) -> Vec<CandidateRecord> {
        let Ok(g) = self.lock() else {
            return Vec::new();
        };
        let mut out: Vec<CandidateRecord> = g
            .committed
            .values()
            .filter(|r| r.source_name == source_name)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.published.cmp(&a.published));
        out
    }
}

#[async_trait]
impl CandidateStore for MemoryStore {
    async fn exists(&self, source_name: &str, link: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.contains(source_name, link))
    }

    async fn insert(&self, record: CandidateRecord) -> Result<(), StoreError> {
        let mut g = self.lock()?;
        if g.contains(&record.source_name, &record.link) {
            return Err(StoreError::Duplicate {
                source_name: record.source_name,
                link: record.link,
            });
        }
        g.staged.push(record);
        Ok(())
    }

    async fn commit(&self) -> Result<(), StoreError> {
        let mut g = self.lock()?;
        let staged = std::mem::take(&mut g.staged);
        for r in staged {
            g.committed
                .insert((r.source_name.clone(), r.link.clone()), r);
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        self.lock()?.staged.clear();
        Ok(())
    }
}
