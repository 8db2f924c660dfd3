//! Insight Tracker: binary entrypoint.
//! Loads source/keyword/alias config, wires the ingestion service, and serves the HTTP surface.

use std::sync::Arc;

use insight_tracker::api::{self, AppState};
use insight_tracker::config::{Settings, SourcesFile};
use insight_tracker::ingest::MemoryStore;
use insight_tracker::metrics::Metrics;
use insight_tracker::IngestService;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default, JSON when INSIGHT_LOG_JSON=1.
/// `try_init` so a subscriber installed by the runtime wins.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("insight_tracker=info,warn"));

    let json = std::env::var("INSIGHT_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = Settings::from_env();
    let sources = SourcesFile::load_or_empty();
    tracing::info!(
        sources = sources.sources.len(),
        enabled = sources.enabled().count(),
        concurrency = settings.concurrency_limit,
        "configuration loaded"
    );

    let store = Arc::new(MemoryStore::new());
    let service = IngestService::from_config(settings.clone(), sources, store);
    let mut router = api::router(AppState {
        service: Arc::new(service),
    });

    match Metrics::init(settings.concurrency_limit) {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = %format!("{e:#}"), "metrics disabled"),
    }

    Ok(router.into())
}
