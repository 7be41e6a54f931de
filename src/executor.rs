//! # Autofill Executor
//! Writes resolved values into matched controls and dispatches the events
//! reactive host-page frameworks listen for. Per-field failures are local:
//! one unmatched or unfillable field never prevents filling the rest.
//!
//! Confidence policy: High fills silently; Medium fills and flags the
//! control for user review; Low is NOT filled — it is surfaced as a
//! suggestion only. File controls are handed to the upload assistant.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::answers::{AnswerMap, AnswerValue};
use crate::page::{Annotation, ControlKind, DomEvent, Page, SelectOption};
use crate::scanner::FieldMatch;
use crate::scorer::ConfidenceTier;

/// What happened to one matched control during a fill pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillOutcome {
    /// Value written silently (high confidence).
    Filled,
    /// Value written, control flagged for review (medium confidence).
    Flagged,
    /// Low confidence: not written, surfaced as a suggestion.
    Suggested,
    /// No resolved value for this key; nothing to write.
    SkippedNoValue,
    /// Select control with no option containing the value; left untouched.
    SkippedNoOption,
    /// File control routed to the upload assistant.
    Assisted,
}

#[derive(Debug, Clone, Serialize)]
pub struct FillEntry {
    #[serde(flatten)]
    pub field: FieldMatch,
    pub outcome: FillOutcome,
}

/// Result of one scan→fill pass.
#[derive(Debug, Clone, Serialize)]
pub struct FillReport {
    pub ts: DateTime<Utc>,
    pub entries: Vec<FillEntry>,
}

impl FillReport {
    pub fn count(&self, outcome: FillOutcome) -> usize {
        self.entries.iter().filter(|e| e.outcome == outcome).count()
    }

    pub fn filled(&self) -> usize {
        self.count(FillOutcome::Filled) + self.count(FillOutcome::Flagged)
    }

    /// File-control matches the caller should run the upload assistant on.
    pub fn assists(&self) -> impl Iterator<Item = &FieldMatch> {
        self.entries
            .iter()
            .filter(|e| e.outcome == FillOutcome::Assisted)
            .map(|e| &e.field)
    }
}

/// Execute one fill pass over the given matches.
pub fn fill(page: &Page, matches: &[FieldMatch], answers: &AnswerMap) -> FillReport {
    let mut entries = Vec::with_capacity(matches.len());
    for m in matches {
        let outcome = fill_one(page, m, answers);
        entries.push(FillEntry {
            field: m.clone(),
            outcome,
        });
    }
    FillReport {
        ts: Utc::now(),
        entries,
    }
}

fn fill_one(page: &Page, m: &FieldMatch, answers: &AnswerMap) -> FillOutcome {
    // Values cannot be injected into file inputs; the assistant takes over.
    if m.kind == ControlKind::File {
        return FillOutcome::Assisted;
    }

    if m.tier == ConfidenceTier::Low {
        tracing::debug!(key = m.key.as_str(), score = m.score, "low confidence, suggesting only");
        return FillOutcome::Suggested;
    }

    let value = match answers.value_for(m.key) {
        Some(v) => v,
        None => return FillOutcome::SkippedNoValue,
    };

    let outcome = match m.kind {
        ControlKind::Select => fill_select(page, m, value),
        ControlKind::Checkbox | ControlKind::Radio => {
            page.set_checked(m.control, truthy(value));
            page.dispatch(m.control, DomEvent::Change);
            FillOutcome::Filled
        }
        _ => {
            // Reactive frameworks watch these events rather than polling
            // the DOM, so the write is only visible with both dispatched.
            page.write_value(m.control, &value.render());
            page.dispatch(m.control, DomEvent::Input);
            page.dispatch(m.control, DomEvent::Change);
            FillOutcome::Filled
        }
    };

    if outcome == FillOutcome::Filled && m.tier == ConfidenceTier::Medium {
        page.annotate(Annotation::Highlight {
            control: m.control,
            pulse: false,
        });
        page.annotate(Annotation::ReviewBadge { control: m.control });
        return FillOutcome::Flagged;
    }
    outcome
}

/// Find the option whose value or visible text contains the resolved value
/// as a case-insensitive substring. Among several hits the closest by
/// Jaro-Winkler similarity wins. No hit leaves the control untouched.
fn fill_select(page: &Page, m: &FieldMatch, value: &AnswerValue) -> FillOutcome {
    let needle = value.render().to_lowercase();
    let control = match page.control(m.control) {
        Some(c) => c,
        None => return FillOutcome::SkippedNoOption,
    };

    let index = best_option(&control.options, &needle);
    match index {
        Some(i) => {
            page.select_option(m.control, i);
            page.dispatch(m.control, DomEvent::Change);
            FillOutcome::Filled
        }
        None => {
            tracing::debug!(key = m.key.as_str(), "no option contains the resolved value");
            FillOutcome::SkippedNoOption
        }
    }
}

fn best_option(options: &[SelectOption], needle: &str) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, opt) in options.iter().enumerate() {
        let value = opt.value.to_lowercase();
        let label = opt.label.to_lowercase();
        if !value.contains(needle) && !label.contains(needle) {
            continue;
        }
        let sim = strsim::jaro_winkler(&label, needle).max(strsim::jaro_winkler(&value, needle));
        match best {
            Some((_, s)) if s >= sim => {}
            _ => best = Some((i, sim)),
        }
    }
    best.map(|(i, _)| i)
}

fn truthy(value: &AnswerValue) -> bool {
    match value {
        AnswerValue::Flag(b) => *b,
        AnswerValue::Text(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "yes" | "true" | "y" | "1"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::SemanticKey;
    use crate::page::{ControlId, Page};
    use crate::patterns::{PatternHandle, PatternTable};
    use crate::scanner::scan;
    use crate::scorer::TierTable;
    use crate::signals::SignalWeights;

    fn scan_page(page: &Page) -> Vec<FieldMatch> {
        scan(
            &page.snapshot(),
            &PatternHandle::new(PatternTable::builtin()),
            &SignalWeights::default(),
            &TierTable::default(),
        )
    }

    fn answers() -> AnswerMap {
        let mut a = AnswerMap::default();
        a.set(SemanticKey::Email, AnswerValue::Text("ada@example.com".into()));
        a.set(SemanticKey::LegalName, AnswerValue::Text("Ada Lovelace".into()));
        a.set(SemanticKey::WorkAuth, AnswerValue::Text("US Citizen".into()));
        a.set(SemanticKey::Remote, AnswerValue::Flag(true));
        a
    }

    #[test]
    fn high_confidence_fills_silently_with_both_events() {
        let page = Page::from_html(r#"<label for="em">Email Address</label><input id="em">"#);
        let report = fill(&page, &scan_page(&page), &answers());
        assert_eq!(report.entries[0].outcome, FillOutcome::Filled);
        let c = page.control(ControlId(0)).unwrap();
        assert_eq!(c.value, "ada@example.com");
        assert_eq!(c.events, vec![DomEvent::Input, DomEvent::Change]);
        assert!(page.annotations().is_empty());
    }

    #[test]
    fn medium_confidence_fills_and_flags_for_review() {
        // name weight 0.8 -> medium tier
        let page = Page::from_html(r#"<input name="email">"#);
        let report = fill(&page, &scan_page(&page), &answers());
        assert_eq!(report.entries[0].outcome, FillOutcome::Flagged);
        assert_eq!(page.control(ControlId(0)).unwrap().value, "ada@example.com");
        assert!(page
            .annotations()
            .contains(&Annotation::ReviewBadge { control: ControlId(0) }));
    }

    #[test]
    fn low_confidence_is_suggested_not_written() {
        // split name at name weight: 0.8 * 0.8 = 0.64 -> low tier
        let page = Page::from_html(r#"<input name="first_name">"#);
        let report = fill(&page, &scan_page(&page), &answers());
        assert_eq!(report.entries[0].outcome, FillOutcome::Suggested);
        assert_eq!(page.control(ControlId(0)).unwrap().value, "");
        assert!(page.events_for(ControlId(0)).is_empty());
    }

    #[test]
    fn select_picks_containing_option_and_fires_change_once() {
        let page = Page::from_html(
            r#"<select name="work_authorization">
                 <option value="">Choose...</option>
                 <option value="citizen">US Citizen</option>
                 <option value="sponsor">Needs Sponsorship</option>
               </select>"#,
        );
        let report = fill(&page, &scan_page(&page), &answers());
        assert_eq!(report.entries[0].outcome, FillOutcome::Flagged);
        let c = page.control(ControlId(0)).unwrap();
        assert_eq!(c.selected, Some(1));
        assert_eq!(c.value, "citizen");
        assert_eq!(c.events, vec![DomEvent::Change]);
    }

    #[test]
    fn select_with_no_matching_option_is_left_untouched() {
        let page = Page::from_html(
            r#"<select name="work_authorization">
                 <option>Alpha</option><option>Beta</option>
               </select>"#,
        );
        let report = fill(&page, &scan_page(&page), &answers());
        assert_eq!(report.entries[0].outcome, FillOutcome::SkippedNoOption);
        let c = page.control(ControlId(0)).unwrap();
        assert_eq!(c.selected, None);
        assert!(c.events.is_empty());
    }

    #[test]
    fn missing_answer_skips_only_that_field() {
        let page = Page::from_html(r#"<input name="salary"><input name="email">"#);
        let report = fill(&page, &scan_page(&page), &answers());
        assert_eq!(report.entries[0].outcome, FillOutcome::SkippedNoValue);
        assert_eq!(report.entries[1].outcome, FillOutcome::Flagged);
        assert_eq!(report.filled(), 1);
    }

    #[test]
    fn file_controls_are_routed_to_the_assistant() {
        let page = Page::from_html(r#"<input type="file" name="resume">"#);
        let report = fill(&page, &scan_page(&page), &answers());
        assert_eq!(report.entries[0].outcome, FillOutcome::Assisted);
        assert_eq!(report.assists().count(), 1);
    }

    #[test]
    fn checkbox_is_set_from_flag_answer() {
        let page = Page::from_html(r#"<input type="checkbox" name="remote_ok">"#);
        let report = fill(&page, &scan_page(&page), &answers());
        assert_eq!(report.entries[0].outcome, FillOutcome::Flagged);
        let c = page.control(ControlId(0)).unwrap();
        assert!(c.checked);
        assert_eq!(c.events, vec![DomEvent::Change]);
    }
}
