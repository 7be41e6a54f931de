//! Pipeline state and the scan→fill pass.
//!
//! One `EngineState` per page session. Each pass is a pure scan over a
//! fresh snapshot followed by a fill against the current answer map, so
//! repeated passes over an unchanged page are idempotent.

use metrics::counter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::answers::AnswerMap;
use crate::executor::{self, FillReport};
use crate::page::Page;
use crate::patterns::PatternHandle;
use crate::scanner::{self, FieldMatch};
use crate::scorer::TierTable;
use crate::signals::SignalWeights;
use crate::uploads;

pub struct EngineState {
    pub page: Arc<Page>,
    pub patterns: PatternHandle,
    pub weights: SignalWeights,
    pub tiers: TierTable,
    answers: RwLock<Option<AnswerMap>>,
    last_matches: RwLock<Vec<FieldMatch>>,
    passes: AtomicU64,
}

impl EngineState {
    pub fn new(page: Arc<Page>, patterns: PatternHandle, weights: SignalWeights) -> Self {
        Self {
            page,
            patterns,
            weights,
            tiers: TierTable::default(),
            answers: RwLock::new(None),
            last_matches: RwLock::new(Vec::new()),
            passes: AtomicU64::new(0),
        }
    }

    pub fn set_answers(&self, map: AnswerMap) {
        *self.answers.write().expect("answers lock poisoned") = Some(map);
    }

    pub fn answers(&self) -> Option<AnswerMap> {
        self.answers.read().expect("answers lock poisoned").clone()
    }

    pub fn last_matches(&self) -> Vec<FieldMatch> {
        self.last_matches
            .read()
            .expect("matches lock poisoned")
            .clone()
    }

    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Scan the current page and remember the result. Does not fill.
    pub fn scan_now(&self) -> Vec<FieldMatch> {
        let snapshot = self.page.snapshot();
        let matches = scanner::scan(&snapshot, &self.patterns, &self.weights, &self.tiers);
        self.passes.fetch_add(1, Ordering::Relaxed);
        counter!("autofill_scan_passes_total").increment(1);
        counter!("autofill_matches_total").increment(matches.len() as u64);
        tracing::debug!(
            controls = snapshot.controls().len(),
            matches = matches.len(),
            "scan pass"
        );
        *self.last_matches.write().expect("matches lock poisoned") = matches.clone();
        matches
    }

    /// Full pass: scan, then fill with whatever answers are loaded. With no
    /// answer map loaded the fill runs against an empty map, which still
    /// surfaces file controls to the upload assistant.
    pub async fn run_pass(self: &Arc<Self>) -> FillReport {
        let matches = self.scan_now();
        let answers = self.answers().unwrap_or_default();
        let report = executor::fill(&self.page, &matches, &answers);

        counter!("autofill_filled_total").increment(report.filled() as u64);
        for entry in &report.entries {
            match entry.outcome {
                executor::FillOutcome::Flagged => {
                    counter!("autofill_flagged_total").increment(1)
                }
                executor::FillOutcome::Suggested => {
                    counter!("autofill_suggested_total").increment(1)
                }
                executor::FillOutcome::SkippedNoValue
                | executor::FillOutcome::SkippedNoOption => {
                    counter!("autofill_skipped_total").increment(1)
                }
                _ => {}
            }
        }

        for field in report.assists() {
            counter!("autofill_upload_assists_total").increment(1);
            let page = Arc::clone(&self.page);
            let (control, key) = (field.control, field.key);
            tokio::spawn(async move {
                uploads::assist(page, control, key).await;
            });
        }

        report
    }
}
