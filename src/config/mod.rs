// src/config/mod.rs
pub mod settings;
pub mod sources;

pub use settings::{clamp_hours_back, Settings};
pub use sources::{FieldMapping, QueryParams, SourceConfig, SourceType, SourcesFile};
