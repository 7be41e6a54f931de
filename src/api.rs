use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::engine::EngineState;
use crate::patterns::{anon_hash, PatternTable};
use crate::scanner::FieldMatch;

#[derive(Clone)]
pub struct AppState {
    engine: Arc<EngineState>,
}

/// Control surface for the popup/devtools side. Engine state is shared;
/// the router holds only an `Arc` to it.
pub fn create_router(engine: Arc<EngineState>) -> Router {
    let state = AppState { engine };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/trigger", post(trigger))
        .route("/debug/matches", get(debug_matches))
        .route("/debug/answers", get(debug_answers))
        .route("/debug/annotations", get(debug_annotations))
        .route("/debug/signal-weight", get(debug_signal_weight))
        .route("/admin/reload-patterns", get(admin_reload_patterns))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct TriggerResp {
    success: bool,
    message: String,
    matches: usize,
    filled: usize,
}

/// Manual fill, the popup's "Autofill now" button.
async fn trigger(State(state): State<AppState>) -> Json<TriggerResp> {
    let report = state.engine.run_pass().await;
    let matches = state.engine.last_matches().len();
    if matches == 0 {
        return Json(TriggerResp {
            success: false,
            message: "No forms detected".to_string(),
            matches: 0,
            filled: 0,
        });
    }
    Json(TriggerResp {
        success: true,
        message: format!("Filled {} of {} detected fields", report.filled(), matches),
        matches,
        filled: report.filled(),
    })
}

async fn debug_matches(State(state): State<AppState>) -> Json<Vec<FieldMatch>> {
    Json(state.engine.last_matches())
}

#[derive(serde::Serialize)]
struct AnswerRow {
    key: String,
    // Values never leave the process in the clear.
    value_hash: String,
}

async fn debug_answers(State(state): State<AppState>) -> Json<Vec<AnswerRow>> {
    let Some(map) = state.engine.answers() else {
        return Json(Vec::new());
    };
    let mut rows = map
        .keys()
        .filter_map(|k| {
            map.value_for(k).map(|v| AnswerRow {
                key: k.as_str().to_string(),
                value_hash: anon_hash(&v.render()),
            })
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| a.key.cmp(&b.key));
    Json(rows)
}

async fn debug_annotations(
    State(state): State<AppState>,
) -> Json<Vec<crate::page::Annotation>> {
    Json(state.engine.page.annotations())
}

async fn debug_signal_weight(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> String {
    let s = q.get("source").cloned().unwrap_or_default();
    match crate::signals::SignalSource::parse(&s) {
        Some(source) => {
            let w = state.engine.weights.weight_for(source);
            format!("source='{}' -> weight={:.2}", s, w)
        }
        None => format!("source='{}' -> unknown", s),
    }
}

async fn admin_reload_patterns(State(state): State<AppState>) -> String {
    match PatternTable::from_toml() {
        Ok(fresh) => {
            state.engine.patterns.replace(fresh);
            "reloaded".to_string()
        }
        Err(e) => format!("failed: {e}"),
    }
}
