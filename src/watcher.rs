//! Debounced reaction to page mutations.
//!
//! SPA application forms render in stages, so the watcher coalesces bursts
//! of DOM mutations: a pass runs only after the page has been quiet for the
//! debounce window. A fixed startup delay covers the initial render before
//! the first pass.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::engine::EngineState;

#[derive(Debug, Clone, Copy)]
pub struct WatcherCfg {
    /// Wait before the very first pass, covering initial page render.
    pub initial_delay: Duration,
    /// Quiet window required after the last mutation before a re-scan.
    pub debounce: Duration,
}

impl Default for WatcherCfg {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            debounce: Duration::from_millis(300),
        }
    }
}

/// Spawn the watch loop for a page session. The task ends when the page's
/// mutation channel closes (page dropped).
pub fn spawn(engine: Arc<EngineState>, cfg: WatcherCfg) -> JoinHandle<()> {
    let mut rx = engine.page.subscribe();
    tokio::spawn(async move {
        tokio::time::sleep(cfg.initial_delay).await;
        let report = engine.run_pass().await;
        tracing::info!(filled = report.filled(), "initial pass");

        loop {
            match rx.recv().await {
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return,
            }
            // Drain further mutations until the page goes quiet.
            loop {
                match tokio::time::timeout(cfg.debounce, rx.recv()).await {
                    Ok(Ok(_)) | Ok(Err(RecvError::Lagged(_))) => continue,
                    Ok(Err(RecvError::Closed)) => return,
                    Err(_) => break,
                }
            }
            let report = engine.run_pass().await;
            tracing::debug!(filled = report.filled(), "re-scan after mutation burst");
        }
    })
}
