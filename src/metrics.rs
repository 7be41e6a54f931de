use axum::{routing::get, Router};
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder and describe the engine counters.
    pub fn init() -> Self {
        // Use default buckets to avoid API differences across crate versions.
        let builder = PrometheusBuilder::new();

        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");

        describe_counter!("autofill_scan_passes_total", "Completed scan passes");
        describe_counter!("autofill_matches_total", "Controls matched to a semantic key");
        describe_counter!("autofill_filled_total", "Values written into controls");
        describe_counter!("autofill_flagged_total", "Medium-confidence fills flagged for review");
        describe_counter!("autofill_suggested_total", "Low-confidence suggestions (not written)");
        describe_counter!("autofill_skipped_total", "Matches skipped (no answer or no option)");
        describe_counter!("autofill_bridge_errors_total", "Context/answer-fetch failures");
        describe_counter!("autofill_upload_assists_total", "Upload-assistant activations");

        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
