//! Field scoring: reduce all candidates for one control to a single
//! (semantic key, confidence tier) decision.
//!
//! The tier boundaries live in one named table so a threshold change is a
//! one-line edit with matching property tests, instead of comparisons
//! scattered through the pipeline.

use serde::{Deserialize, Serialize};

use crate::answers::SemanticKey;
use crate::patterns::Candidate;

/// Governs whether a field is filled silently, filled-and-flagged, or
/// only surfaced as a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

/// Central tier table. Boundaries are exclusive lower bounds:
/// `score > high_above` is High, and a score at or below `floor`
/// produces no match at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierTable {
    pub high_above: f32,
    pub medium_above: f32,
    pub floor: f32,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            high_above: 0.80,
            medium_above: 0.65,
            floor: 0.50,
        }
    }
}

impl TierTable {
    /// Deterministic, pure mapping from score to tier. `None` means the
    /// control produces no field match.
    pub fn tier_for(&self, score: f32) -> Option<ConfidenceTier> {
        if score > self.high_above {
            Some(ConfidenceTier::High)
        } else if score > self.medium_above {
            Some(ConfidenceTier::Medium)
        } else if score > self.floor {
            Some(ConfidenceTier::Low)
        } else {
            None
        }
    }
}

/// The winning decision for one control.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub key: SemanticKey,
    pub score: f32,
    pub tier: ConfidenceTier,
    /// Rule id behind the winner, for explainability.
    pub rule: String,
}

/// Pick the best candidate. Ties resolve to the first-seen candidate in
/// extraction order; the strict `>` comparison below is that tie-break,
/// not an accident of iteration.
pub fn resolve(candidates: &[Candidate], tiers: &TierTable) -> Option<Resolution> {
    let mut best: Option<&Candidate> = None;
    for c in candidates {
        match best {
            Some(b) if c.score > b.score => best = Some(c),
            None => best = Some(c),
            _ => {}
        }
    }
    let winner = best?;
    let tier = tiers.tier_for(winner.score)?;
    Some(Resolution {
        key: winner.key,
        score: winner.score,
        tier,
        rule: winner.rule.clone(),
    })
}
