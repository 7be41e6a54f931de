// tests/e2e_fill.rs
//
// End-to-end passes over realistic application-form markup: scan, fill,
// annotations, and the confidence policy at each tier.

use std::sync::Arc;
use std::time::Duration;

use ats_autofill_engine::answers::AnswerMap;
use ats_autofill_engine::page::{Annotation, DomEvent};
use ats_autofill_engine::watcher::{self, WatcherCfg};
use ats_autofill_engine::{
    AnswerValue, ConfidenceTier, EngineState, FillOutcome, Page, PatternHandle, PatternTable,
    SemanticKey, SignalWeights,
};

fn engine_for(html: &str) -> Arc<EngineState> {
    let page = Arc::new(Page::from_html(html));
    Arc::new(EngineState::new(
        page,
        PatternHandle::new(PatternTable::builtin()),
        SignalWeights::default(),
    ))
}

fn answers() -> AnswerMap {
    let mut map = AnswerMap::default();
    map.set(SemanticKey::LegalName, AnswerValue::Text("Ada Lovelace".into()));
    map.set(SemanticKey::Email, AnswerValue::Text("ada@example.com".into()));
    map.set(SemanticKey::Phone, AnswerValue::Text("+1 555 0100".into()));
    map.set(SemanticKey::WorkAuth, AnswerValue::Text("US Citizen".into()));
    map
}

#[tokio::test]
async fn split_name_field_is_suggested_not_written() {
    // `first_name` matches the split-name rule: 0.8 (name prior) × 0.8
    // (split discount) = 0.64, which is Low tier — suggest, never write.
    let engine = engine_for(r#"<input name="first_name" id="first_name">"#);
    engine.set_answers(answers());

    let report = engine.run_pass().await;
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].outcome, FillOutcome::Suggested);
    assert_eq!(report.entries[0].field.tier, ConfidenceTier::Low);
    assert!((report.entries[0].field.score - 0.64).abs() < 1e-6);

    let snap = engine.page.snapshot();
    assert_eq!(snap.controls()[0].value, "", "low confidence must not write");
    assert!(engine.page.annotations().is_empty());
}

#[tokio::test]
async fn labeled_email_fills_silently_with_both_events() {
    let engine = engine_for(
        r#"<label for="em">Email address</label>
           <input id="em" type="email">"#,
    );
    engine.set_answers(answers());

    let report = engine.run_pass().await;
    assert_eq!(report.entries[0].outcome, FillOutcome::Filled);
    assert_eq!(report.entries[0].field.tier, ConfidenceTier::High);
    assert!((report.entries[0].field.score - 0.9).abs() < 1e-6);

    let control = report.entries[0].field.control;
    let snap = engine.page.snapshot();
    assert_eq!(snap.controls()[0].value, "ada@example.com");
    assert_eq!(
        engine.page.events_for(control),
        vec![DomEvent::Input, DomEvent::Change]
    );
    // High confidence: no review badge, no highlight.
    assert!(engine.page.annotations().is_empty());
}

#[tokio::test]
async fn medium_confidence_fill_is_flagged_for_review() {
    // aria-label only: 0.7 prior → Medium tier.
    let engine = engine_for(r#"<input aria-label="phone">"#);
    engine.set_answers(answers());

    let report = engine.run_pass().await;
    assert_eq!(report.entries[0].outcome, FillOutcome::Flagged);
    assert_eq!(report.entries[0].field.tier, ConfidenceTier::Medium);

    let snap = engine.page.snapshot();
    assert_eq!(snap.controls()[0].value, "+1 555 0100", "medium still fills");
    let ann = engine.page.annotations();
    assert!(ann
        .iter()
        .any(|a| matches!(a, Annotation::Highlight { pulse: false, .. })));
    assert!(ann.iter().any(|a| matches!(a, Annotation::ReviewBadge { .. })));
}

#[tokio::test]
async fn work_auth_select_picks_option_with_one_change_event() {
    let engine = engine_for(
        r#"<label for="wa">Are you legally authorized to work?</label>
           <select id="wa" name="work_authorization">
             <option value="">Select...</option>
             <option value="citizen">US Citizen / Permanent Resident</option>
             <option value="visa">Require visa sponsorship</option>
           </select>"#,
    );
    engine.set_answers(answers());

    let report = engine.run_pass().await;
    assert_eq!(report.entries[0].field.key, SemanticKey::WorkAuth);
    assert_eq!(report.entries[0].outcome, FillOutcome::Filled);

    let control = report.entries[0].field.control;
    let snap = engine.page.snapshot();
    assert_eq!(snap.controls()[0].selected, Some(1));
    assert_eq!(snap.controls()[0].value, "citizen");
    assert_eq!(engine.page.events_for(control), vec![DomEvent::Change]);
}

#[tokio::test]
async fn resume_input_goes_to_the_upload_assistant() {
    let engine = engine_for(r#"<input type="file" name="resume" id="resume_upload">"#);
    engine.set_answers(answers());

    let report = engine.run_pass().await;
    assert_eq!(report.entries[0].outcome, FillOutcome::Assisted);
    assert_eq!(report.entries[0].field.key, SemanticKey::Resume);

    // Give the spawned assistant a moment to annotate.
    tokio::time::sleep(Duration::from_millis(600)).await;
    let ann = engine.page.annotations();
    assert!(ann
        .iter()
        .any(|a| matches!(a, Annotation::ScrolledIntoView { .. })));
    assert!(ann.iter().any(|a| matches!(a, Annotation::PickerOpened { .. })));

    let snap = engine.page.snapshot();
    assert_eq!(snap.controls()[0].value, "", "file inputs are never written");
}

#[tokio::test(start_paused = true)]
async fn staged_render_triggers_one_debounced_rescan() {
    let engine = engine_for("");
    engine.set_answers(answers());
    let handle = watcher::spawn(Arc::clone(&engine), WatcherCfg::default());

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(engine.passes(), 1, "initial pass after startup delay");

    // An SPA mounting a form in several chunks.
    for name in ["full_name", "email", "phone", "linkedin_url", "github_url"] {
        engine
            .page
            .inject_html(&format!(r#"<input name="{name}">"#));
        tokio::time::sleep(Duration::from_millis(40)).await;
    }
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(engine.passes(), 2, "one re-scan for the whole burst");

    let snap = engine.page.snapshot();
    let email = snap
        .controls()
        .iter()
        .find(|c| c.attrs.name.as_deref() == Some("email"))
        .expect("email control present");
    assert_eq!(email.value, "ada@example.com");
    handle.abort();
}
