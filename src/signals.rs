//! # Signal Extraction
//!
//! Pulls the raw textual evidence off one form control: `name`, `id`,
//! `placeholder`, `autocomplete` token, `aria-label`, and associated label
//! text, in that fixed order. Each signal carries the prior weight of its
//! attribute kind.
//!
//! - Weights load from JSON config with serde defaults as the seed.
//! - Fallback to the built-in priors on any read/parse error.
//! - Designed to be simple, testable, and resilient to noisy markup.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::page::FormControl;

/// Which attribute (or label) a signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Name,
    Id,
    Placeholder,
    Autocomplete,
    AriaLabel,
    Label,
}

impl SignalSource {
    /// Parse the snake_case wire name (diagnostics endpoints).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "name" => Some(SignalSource::Name),
            "id" => Some(SignalSource::Id),
            "placeholder" => Some(SignalSource::Placeholder),
            "autocomplete" => Some(SignalSource::Autocomplete),
            "aria_label" => Some(SignalSource::AriaLabel),
            "label" => Some(SignalSource::Label),
            _ => None,
        }
    }
}

/// One piece of evidence about a control's meaning, paired with the prior
/// weight of its source kind.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSignal {
    pub text: String,
    pub source: SignalSource,
    pub weight: f32,
}

/// Prior weights per signal source. The defaults are the calibrated priors;
/// an override file can tune them without recompiling.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalWeights {
    #[serde(default = "default_name")]
    pub name: f32,
    #[serde(default = "default_id")]
    pub id: f32,
    #[serde(default = "default_placeholder")]
    pub placeholder: f32,
    #[serde(default = "default_autocomplete")]
    pub autocomplete: f32,
    #[serde(default = "default_aria_label")]
    pub aria_label: f32,
    #[serde(default = "default_label")]
    pub label: f32,
}

fn default_name() -> f32 {
    0.8
}
fn default_id() -> f32 {
    0.7
}
fn default_placeholder() -> f32 {
    0.6
}
fn default_autocomplete() -> f32 {
    0.95
}
fn default_aria_label() -> f32 {
    0.7
}
fn default_label() -> f32 {
    0.9
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            name: default_name(),
            id: default_id(),
            placeholder: default_placeholder(),
            autocomplete: default_autocomplete(),
            aria_label: default_aria_label(),
            label: default_label(),
        }
    }
}

impl SignalWeights {
    /// Load from a JSON file. Falls back to the built-in priors on error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn weight_for(&self, source: SignalSource) -> f32 {
        let w = match source {
            SignalSource::Name => self.name,
            SignalSource::Id => self.id,
            SignalSource::Placeholder => self.placeholder,
            SignalSource::Autocomplete => self.autocomplete,
            SignalSource::AriaLabel => self.aria_label,
            SignalSource::Label => self.label,
        };
        clamp01(w)
    }
}

/// Collect every non-empty signal for a control, in the fixed extraction
/// order. Callers are expected to have filtered ineligible controls first.
pub fn extract_signals(control: &FormControl, weights: &SignalWeights) -> Vec<RawSignal> {
    let mut out = Vec::with_capacity(6);
    let mut push = |text: Option<&String>, source: SignalSource| {
        if let Some(t) = text {
            let t = normalize_text(t);
            if !t.is_empty() {
                out.push(RawSignal {
                    text: t,
                    source,
                    weight: weights.weight_for(source),
                });
            }
        }
    };

    push(control.attrs.name.as_ref(), SignalSource::Name);
    push(control.attrs.id.as_ref(), SignalSource::Id);
    push(control.attrs.placeholder.as_ref(), SignalSource::Placeholder);
    push(control.attrs.autocomplete.as_ref(), SignalSource::Autocomplete);
    push(control.attrs.aria_label.as_ref(), SignalSource::AriaLabel);
    push(control.label.as_ref(), SignalSource::Label);
    out
}

/// Normalize signal/label text: decode HTML entities, collapse whitespace,
/// trim. Case is preserved; the pattern table matches case-insensitively.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clamp01(x: f32) -> f32 {
    if x < 0.0 {
        0.0
    } else if x > 1.0 {
        1.0
    } else {
        x
    }
}
