//! In-process model of the host page's form controls.
//!
//! The engine never owns the page: it reads standard attributes, writes
//! values, and dispatches standard DOM events (`input`, `change`). This
//! module is that boundary. Controls are parsed out of real HTML; the
//! mutation channel plays the role of a `MutationObserver` subscription,
//! and annotations record the visual side effects (badges, highlights,
//! notifications) the executor and upload assistant apply.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;

use crate::signals::normalize_text;

/// Stable handle to one control within a page instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ControlId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Text,
    Email,
    Tel,
    Url,
    Number,
    Date,
    Password,
    TextArea,
    Select,
    Checkbox,
    Radio,
    File,
    Submit,
    Button,
    Hidden,
}

impl ControlKind {
    fn from_input_type(t: &str) -> Self {
        match t.trim().to_ascii_lowercase().as_str() {
            "email" => ControlKind::Email,
            "tel" => ControlKind::Tel,
            "url" => ControlKind::Url,
            "number" => ControlKind::Number,
            "date" => ControlKind::Date,
            "password" => ControlKind::Password,
            "checkbox" => ControlKind::Checkbox,
            "radio" => ControlKind::Radio,
            "file" => ControlKind::File,
            "submit" => ControlKind::Submit,
            "button" => ControlKind::Button,
            "hidden" => ControlKind::Hidden,
            _ => ControlKind::Text,
        }
    }

    /// Submit/button/hidden controls are excluded before signal extraction.
    pub fn eligible(self) -> bool {
        !matches!(
            self,
            ControlKind::Submit | ControlKind::Button | ControlKind::Hidden
        )
    }

    /// Controls filled by writing the value property + `input`/`change`.
    pub fn text_like(self) -> bool {
        matches!(
            self,
            ControlKind::Text
                | ControlKind::Email
                | ControlKind::Tel
                | ControlKind::Url
                | ControlKind::Number
                | ControlKind::Date
                | ControlKind::Password
                | ControlKind::TextArea
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

/// Standard DOM events the engine dispatches so reactive front-ends on the
/// host page observe the write. Framework-compat shim; nothing
/// framework-specific beyond these two events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DomEvent {
    Input,
    Change,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ControlAttrs {
    pub name: Option<String>,
    pub id: Option<String>,
    pub placeholder: Option<String>,
    pub autocomplete: Option<String>,
    pub aria_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormControl {
    pub id: ControlId,
    pub kind: ControlKind,
    pub attrs: ControlAttrs,
    /// Associated `<label>` text: `for`-attribute match first, else the
    /// nearest ancestor label, else none. Resolved at parse time.
    pub label: Option<String>,
    pub options: Vec<SelectOption>,
    pub value: String,
    pub selected: Option<usize>,
    pub checked: bool,
    /// Events dispatched on this control, in order.
    pub events: Vec<DomEvent>,
}

/// Immutable view of the page for one scan pass.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    controls: Vec<FormControl>,
}

impl PageSnapshot {
    pub fn controls(&self) -> &[FormControl] {
        &self.controls
    }

    pub fn eligible(&self) -> impl Iterator<Item = &FormControl> {
        self.controls.iter().filter(|c| c.kind.eligible())
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }
}

/// Visual side effects applied to the page, recorded for inspection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Annotation {
    ReviewBadge { control: ControlId },
    Highlight { control: ControlId, pulse: bool },
    ScrolledIntoView { control: ControlId },
    PickerOpened { control: ControlId },
    Notification { message: String },
}

/// Subtree mutation notification, the re-scan trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    ChildList { added: usize },
    Subtree,
}

static CONTROL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("input, textarea, select").expect("control selector"));
static LABEL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("label").expect("label selector"));
static OPTION_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("option").expect("option selector"));

/// The page handle shared between the engine, the watcher, and the
/// control surface. One instance per tab lifetime.
pub struct Page {
    controls: RwLock<Vec<FormControl>>,
    annotations: RwLock<Vec<Annotation>>,
    mutations: broadcast::Sender<Mutation>,
}

impl Page {
    pub fn empty() -> Self {
        let (tx, _rx) = broadcast::channel(64);
        Self {
            controls: RwLock::new(Vec::new()),
            annotations: RwLock::new(Vec::new()),
            mutations: tx,
        }
    }

    pub fn from_html(html: &str) -> Self {
        let page = Self::empty();
        let parsed = parse_controls(&Html::parse_document(html), 0);
        *page.controls.write().expect("page lock poisoned") = parsed;
        page
    }

    /// SPA hydration / multi-step reveal: append the controls found in the
    /// fragment and emit a child-list mutation.
    pub fn inject_html(&self, html: &str) -> usize {
        let added = {
            let mut guard = self.controls.write().expect("page lock poisoned");
            // ids must stay unique even after removals
            let base = guard.last().map(|c| c.id.0 + 1).unwrap_or(0);
            let fresh = parse_controls(&Html::parse_fragment(html), base);
            let n = fresh.len();
            guard.extend(fresh);
            n
        };
        // No receivers yet is fine; the send result is informational only.
        let _ = self.mutations.send(Mutation::ChildList { added });
        added
    }

    pub fn remove_control(&self, id: ControlId) -> bool {
        let removed = {
            let mut guard = self.controls.write().expect("page lock poisoned");
            let before = guard.len();
            guard.retain(|c| c.id != id);
            guard.len() != before
        };
        if removed {
            let _ = self.mutations.send(Mutation::Subtree);
        }
        removed
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Mutation> {
        self.mutations.subscribe()
    }

    pub fn snapshot(&self) -> PageSnapshot {
        PageSnapshot {
            controls: self.controls.read().expect("page lock poisoned").clone(),
        }
    }

    pub fn control(&self, id: ControlId) -> Option<FormControl> {
        self.controls
            .read()
            .expect("page lock poisoned")
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    /// Set the value property. Dispatching events is a separate, explicit
    /// step; value writes alone do not count as subtree mutations.
    pub fn write_value(&self, id: ControlId, value: &str) -> bool {
        self.with_control_mut(id, |c| c.value = value.to_string())
    }

    pub fn dispatch(&self, id: ControlId, event: DomEvent) -> bool {
        self.with_control_mut(id, |c| c.events.push(event))
    }

    /// Set the selection of a select control to the given option index.
    pub fn select_option(&self, id: ControlId, index: usize) -> bool {
        self.with_control_mut(id, |c| {
            if let Some(opt) = c.options.get(index) {
                c.value = opt.value.clone();
                c.selected = Some(index);
            }
        })
    }

    pub fn set_checked(&self, id: ControlId, checked: bool) -> bool {
        self.with_control_mut(id, |c| c.checked = checked)
    }

    pub fn annotate(&self, annotation: Annotation) {
        self.annotations
            .write()
            .expect("page lock poisoned")
            .push(annotation);
    }

    pub fn annotations(&self) -> Vec<Annotation> {
        self.annotations
            .read()
            .expect("page lock poisoned")
            .clone()
    }

    pub fn events_for(&self, id: ControlId) -> Vec<DomEvent> {
        self.control(id).map(|c| c.events).unwrap_or_default()
    }

    fn with_control_mut(&self, id: ControlId, f: impl FnOnce(&mut FormControl)) -> bool {
        let mut guard = self.controls.write().expect("page lock poisoned");
        match guard.iter_mut().find(|c| c.id == id) {
            Some(c) => {
                f(c);
                true
            }
            None => false,
        }
    }
}

fn attr_of(el: &ElementRef, name: &str) -> Option<String> {
    el.value()
        .attr(name)
        .map(normalize_text)
        .filter(|s| !s.is_empty())
}

fn element_text(el: &ElementRef) -> String {
    normalize_text(&el.text().collect::<String>())
}

/// Walk every input/textarea/select in document order and build the
/// engine's view of it. Label association is resolved here so scans stay
/// pure over the snapshot.
fn parse_controls(doc: &Html, base: usize) -> Vec<FormControl> {
    // label[for] -> label text
    let mut for_labels: HashMap<String, String> = HashMap::new();
    for label in doc.select(&LABEL_SELECTOR) {
        if let Some(target) = label.value().attr("for") {
            let text = element_text(&label);
            if !text.is_empty() {
                for_labels.entry(target.to_string()).or_insert(text);
            }
        }
    }

    let mut out = Vec::new();
    for (i, el) in doc.select(&CONTROL_SELECTOR).enumerate() {
        let kind = match el.value().name() {
            "textarea" => ControlKind::TextArea,
            "select" => ControlKind::Select,
            _ => ControlKind::from_input_type(el.value().attr("type").unwrap_or("text")),
        };

        let attrs = ControlAttrs {
            name: attr_of(&el, "name"),
            id: attr_of(&el, "id"),
            placeholder: attr_of(&el, "placeholder"),
            autocomplete: attr_of(&el, "autocomplete"),
            aria_label: attr_of(&el, "aria-label"),
        };

        let label = attrs
            .id
            .as_ref()
            .and_then(|id| for_labels.get(id).cloned())
            .or_else(|| ancestor_label_text(&el));

        let (options, selected) = if kind == ControlKind::Select {
            let mut opts = Vec::new();
            let mut sel = None;
            for (idx, opt) in el.select(&OPTION_SELECTOR).enumerate() {
                let label = element_text(&opt);
                let value = opt
                    .value()
                    .attr("value")
                    .map(normalize_text)
                    .unwrap_or_else(|| label.clone());
                if opt.value().attr("selected").is_some() {
                    sel = Some(idx);
                }
                opts.push(SelectOption { value, label });
            }
            (opts, sel)
        } else {
            (Vec::new(), None)
        };

        let value = match kind {
            ControlKind::TextArea => element_text(&el),
            ControlKind::Select => selected
                .and_then(|i| options.get(i))
                .map(|o| o.value.clone())
                .unwrap_or_default(),
            _ => attr_of(&el, "value").unwrap_or_default(),
        };

        out.push(FormControl {
            id: ControlId(base + i),
            kind,
            attrs,
            label,
            options,
            value,
            selected,
            checked: el.value().attr("checked").is_some(),
            events: Vec::new(),
        });
    }
    out
}

fn ancestor_label_text(el: &ElementRef) -> Option<String> {
    for node in el.ancestors() {
        if let Some(parent) = ElementRef::wrap(node) {
            if parent.value().name() == "label" {
                let text = element_text(&parent);
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_controls_in_document_order() {
        let page = Page::from_html(
            r#"<form>
                <input name="first_name">
                <textarea name="summary">draft</textarea>
                <select name="country"><option value="us">United States</option></select>
                <input type="submit" value="Apply">
            </form>"#,
        );
        let snap = page.snapshot();
        assert_eq!(snap.len(), 4);
        assert_eq!(snap.controls()[0].kind, ControlKind::Text);
        assert_eq!(snap.controls()[1].kind, ControlKind::TextArea);
        assert_eq!(snap.controls()[1].value, "draft");
        assert_eq!(snap.controls()[2].kind, ControlKind::Select);
        assert!(!snap.controls()[3].kind.eligible());
        assert_eq!(snap.eligible().count(), 3);
    }

    #[test]
    fn label_for_beats_ancestor_label() {
        let page = Page::from_html(
            r#"<label for="em">Email Address</label>
               <label>Wrapper <input id="em" name="contact"></label>"#,
        );
        let snap = page.snapshot();
        let c = &snap.controls()[0];
        assert_eq!(c.label.as_deref(), Some("Email Address"));
    }

    #[test]
    fn ancestor_label_is_fallback() {
        let page = Page::from_html(r#"<label>Phone number <input name="p"></label>"#);
        let snap = page.snapshot();
        let c = &snap.controls()[0];
        assert_eq!(c.label.as_deref(), Some("Phone number"));
    }

    #[test]
    fn inject_broadcasts_child_list_mutation() {
        let page = Page::from_html("<input name='a'>");
        let mut rx = page.subscribe();
        let added = page.inject_html("<input name='b'><input name='c'>");
        assert_eq!(added, 2);
        assert_eq!(
            rx.try_recv().expect("mutation delivered"),
            Mutation::ChildList { added: 2 }
        );
        // ids continue past the existing controls
        assert_eq!(page.snapshot().controls()[2].id, ControlId(2));
    }

    #[test]
    fn value_writes_do_not_emit_mutations() {
        let page = Page::from_html("<input name='a'>");
        let mut rx = page.subscribe();
        assert!(page.write_value(ControlId(0), "hello"));
        assert!(page.dispatch(ControlId(0), DomEvent::Input));
        assert!(rx.try_recv().is_err());
        assert_eq!(page.events_for(ControlId(0)), vec![DomEvent::Input]);
    }
}
