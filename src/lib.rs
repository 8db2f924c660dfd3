// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod entities;
pub mod ingest;
pub mod keywords;
pub mod metrics;
pub mod service;
pub mod snippet;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::entities::EntityDetector;
pub use crate::keywords::KeywordFilter;
pub use crate::service::IngestService;
pub use crate::snippet::extract_snippet;
