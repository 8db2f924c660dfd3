// src/api.rs
//! Thin HTTP surface: trigger a run, read status, list sources.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::config::clamp_hours_back;
use crate::service::{IngestService, IngestStatus, SourcesInfo};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<IngestService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/scrape-feeds", post(scrape_feeds))
        .route("/api/scrape-feeds/status", get(scrape_status))
        .route("/api/insights/sources", get(list_sources))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Default, serde::Deserialize)]
struct ScrapeParams {
    hours_back: Option<i64>,
    /// Comma-separated source names.
    sources: Option<String>,
}

#[derive(Debug, serde::Serialize)]
struct ScrapeResp {
    hours_back: i64,
    counts: BTreeMap<String, usize>,
    total: usize,
}

fn parse_subset(raw: Option<&str>) -> Option<Vec<String>> {
    let names: Vec<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    (!names.is_empty()).then_some(names)
}

async fn scrape_feeds(
    State(state): State<AppState>,
    Query(params): Query<ScrapeParams>,
) -> Json<ScrapeResp> {
    let hours_back = params
        .hours_back
        .map(clamp_hours_back)
        .unwrap_or(state.service.settings().default_hours_back);
    let subset = parse_subset(params.sources.as_deref());
    let counts = state.service.run_ingestion(hours_back, subset).await;
    Json(ScrapeResp {
        hours_back,
        total: counts.values().sum(),
        counts,
    })
}

async fn scrape_status(State(state): State<AppState>) -> Json<IngestStatus> {
    Json(state.service.status())
}

async fn list_sources(State(state): State<AppState>) -> Json<SourcesInfo> {
    Json(state.service.sources_info())
}
