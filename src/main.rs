//! ATS Autofill Engine — Binary Entrypoint
//! Boots the page session, the change watcher, and the Axum control surface.
//!
//! See `README.md` for quickstart.

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ats_autofill_engine::bridge::{self, HttpAnswerService};
use ats_autofill_engine::metrics::Metrics;
use ats_autofill_engine::patterns::{
    start_hot_reload_thread, PatternHandle, PatternTable, DEFAULT_PATTERNS_CONFIG_PATH,
    ENV_PATTERNS_CONFIG_PATH,
};
use ats_autofill_engine::watcher::{self, WatcherCfg};
use ats_autofill_engine::{create_router, EngineState, Page, SignalWeights};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR AUTOFILL_ENV in {local, development, dev})
///   - AUTOFILL_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("AUTOFILL_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("AUTOFILL_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("autofill=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments. This enables
    // PATTERNS_CONFIG_PATH / AUTOFILL_SERVICE_URL from .env.
    let _ = dotenvy::dotenv();
    enable_dev_tracing();

    // --- Pattern table (with dev hot reload) ---
    let table = PatternTable::from_toml()?;
    let patterns = PatternHandle::new(table);
    let path = std::env::var(ENV_PATTERNS_CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_PATTERNS_CONFIG_PATH));
    start_hot_reload_thread(patterns.clone(), path);

    let weights = SignalWeights::load_from_file("signal_weights.json");

    // --- Page session ---
    // AUTOFILL_PAGE_PATH points at an HTML file to load as the initial page;
    // without it the session starts empty and waits for injected markup.
    let page = match std::env::var("AUTOFILL_PAGE_PATH") {
        Ok(p) => {
            let html = std::fs::read_to_string(&p)?;
            tracing::info!(path = %p, "loaded initial page");
            Arc::new(Page::from_html(&html))
        }
        Err(_) => Arc::new(Page::empty()),
    };

    let engine = Arc::new(EngineState::new(page, patterns, weights));

    // --- Answer map from the data service ---
    if let Ok(url) = std::env::var("AUTOFILL_SERVICE_URL") {
        let service = HttpAnswerService::new(url);
        if let Some(map) = bridge::load_answers(&service).await {
            engine.set_answers(map);
        }
    } else {
        tracing::info!("AUTOFILL_SERVICE_URL not set; running without answers");
    }

    // --- Change watcher ---
    watcher::spawn(Arc::clone(&engine), WatcherCfg::default());

    // --- HTTP control surface + metrics ---
    let metrics = Metrics::init();
    let router = create_router(engine).merge(metrics.router());

    let bind = std::env::var("AUTOFILL_BIND").unwrap_or_else(|_| "127.0.0.1:8787".to_string());
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "control surface listening");
    axum::serve(listener, router).await?;
    Ok(())
}
