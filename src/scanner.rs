//! # Page Scanner
//! Pure, testable pass that maps a page snapshot to field matches.
//! No I/O; re-running it on an unchanged snapshot returns an identical
//! result set, so overlapping mutation-triggered scans are safe.

use serde::Serialize;

use crate::answers::SemanticKey;
use crate::page::{ControlId, ControlKind, PageSnapshot};
use crate::patterns::PatternHandle;
use crate::scorer::{self, ConfidenceTier, TierTable};
use crate::signals::{extract_signals, SignalWeights};

/// One control resolved to a semantic meaning with a confidence tier.
/// Transient: rebuilt on every scan pass, never persisted across scans.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMatch {
    pub control: ControlId,
    pub kind: ControlKind,
    pub key: SemanticKey,
    pub score: f32,
    pub tier: ConfidenceTier,
    pub rule: String,
}

/// Enumerate eligible controls, extract their signals, and resolve each to
/// at most one field match. Candidates accumulate in extraction order so
/// the scorer's first-seen tie-break is deterministic.
pub fn scan(
    snapshot: &PageSnapshot,
    patterns: &PatternHandle,
    weights: &SignalWeights,
    tiers: &TierTable,
) -> Vec<FieldMatch> {
    let mut out = Vec::new();
    for control in snapshot.eligible() {
        let mut candidates = Vec::new();
        for signal in extract_signals(control, weights) {
            candidates.extend(patterns.candidates_for(&signal));
        }
        if let Some(r) = scorer::resolve(&candidates, tiers) {
            out.push(FieldMatch {
                control: control.id,
                kind: control.kind,
                key: r.key,
                score: r.score,
                tier: r.tier,
                rule: r.rule,
            });
        }
    }
    out
}
