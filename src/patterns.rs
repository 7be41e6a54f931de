// src/patterns.rs
//! Pattern table primitives: config types, regex compilation, autocomplete
//! token table, and candidate production for raw signals.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::info;

use crate::answers::SemanticKey;
use crate::signals::{RawSignal, SignalSource};

// --- env defaults & names ---
pub const DEFAULT_PATTERNS_CONFIG_PATH: &str = "config/patterns.toml";
pub const ENV_PATTERNS_CONFIG_PATH: &str = "PATTERNS_CONFIG_PATH";

/// Built-in table, compiled into the binary so the engine always has a
/// working rule set even without a config directory.
const DEFAULT_PATTERNS_TOML: &str = include_str!("../config/patterns.toml");

// Dev logging gate: AUTOFILL_DEV_LOG=1 AND a dev environment.
pub(crate) fn dev_logging_enabled() -> bool {
    let on = std::env::var("AUTOFILL_DEV_LOG").ok().as_deref() == Some("1");
    if !on {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("AUTOFILL_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

// Signal text may be user-adjacent (labels can embed prefilled values on
// sloppy pages), so diagnostics log a short hash, never the raw text.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct PatternRoot {
    pub matcher: MatcherSection,
    pub rules: Vec<RuleCfg>,
    /// HTML `autocomplete` token -> semantic key. Author-declared ground
    /// truth; bypasses the regex rules at a fixed score.
    #[serde(default)]
    pub autocomplete: HashMap<String, SemanticKey>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatcherSection {
    pub autocomplete_score: f32,
    /// Multiplier for split first/last-name rules: a split field alone
    /// should not receive the composed name at full confidence.
    pub split_name_discount: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleCfg {
    pub id: String,
    pub key: SemanticKey,
    pub pattern: String, // regex (already escaped in TOML)
    #[serde(default)]
    pub split_name: bool,
}

#[derive(Debug)]
struct CompiledRule {
    cfg: RuleCfg,
    re: Regex,
}

/// One (semantic key, score) candidate produced by matching a signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub key: SemanticKey,
    pub score: f32,
    /// Rule id or `autocomplete:<token>`, for explainability.
    pub rule: String,
}

/* ----------------------------
Compiled table
---------------------------- */

/// Holds the compiled rules plus the autocomplete token table.
#[derive(Debug)]
pub struct PatternTable {
    pub cfg: PatternRoot,
    rules: Vec<CompiledRule>,
}

impl PatternTable {
    /// Load from a TOML file. Uses PATTERNS_CONFIG_PATH, falling back to
    /// `config/patterns.toml`, falling back to the embedded table.
    pub fn from_toml() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_PATTERNS_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_PATTERNS_CONFIG_PATH));

        let content = fs::read_to_string(&path)
            .unwrap_or_else(|_| DEFAULT_PATTERNS_TOML.to_string());
        Self::from_toml_str(&content)
    }

    /// Build from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let cfg: PatternRoot = toml::from_str(toml_str)?;
        let rules = cfg
            .rules
            .iter()
            .cloned()
            .map(|r| {
                let re = Regex::new(&r.pattern)
                    .map_err(|e| anyhow::anyhow!("rule `{}` regex error: {}", r.id, e))?;
                Ok(CompiledRule { cfg: r, re })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { cfg, rules })
    }

    /// Built-in table (compiled from the embedded TOML).
    pub fn builtin() -> Self {
        Self::from_toml_str(DEFAULT_PATTERNS_TOML).expect("embedded pattern table is valid")
    }

    /// Map one signal to zero or more candidates.
    ///
    /// Autocomplete tokens short-circuit: they are author-declared ground
    /// truth, so the token table answers alone at the fixed score. All
    /// other signals run through the regex rules; an unmatched signal is a
    /// normal outcome, not an error.
    pub fn candidates_for(&self, signal: &RawSignal) -> Vec<Candidate> {
        if signal.source == SignalSource::Autocomplete {
            let token = signal.text.trim().to_ascii_lowercase();
            return match self.cfg.autocomplete.get(&token) {
                Some(&key) => vec![Candidate {
                    key,
                    score: self.cfg.matcher.autocomplete_score,
                    rule: format!("autocomplete:{token}"),
                }],
                None => Vec::new(),
            };
        }

        let mut out = Vec::new();
        for rule in &self.rules {
            if rule.re.is_match(&signal.text) {
                let score = if rule.cfg.split_name {
                    self.cfg.matcher.split_name_discount * signal.weight
                } else {
                    signal.weight
                };
                out.push(Candidate {
                    key: rule.cfg.key,
                    score,
                    rule: rule.cfg.id.clone(),
                });
            }
        }

        if dev_logging_enabled() && !out.is_empty() {
            info!(
                target: "patterns",
                id = %anon_hash(&signal.text),
                source = ?signal.source,
                hits = out.len(),
                "signal matched"
            );
        }
        out
    }

}

/* ----------------------------
Thread-safe handle + hot reload
---------------------------- */

/// A threadsafe handle that can hot-reload the underlying table in dev.
/// - Enable by setting AUTOFILL_HOT_RELOAD=1
/// - Dev-gated: active only in debug builds or AUTOFILL_ENV dev values.
#[derive(Clone)]
pub struct PatternHandle {
    inner: Arc<RwLock<PatternTable>>,
}

impl PatternHandle {
    pub fn new(table: PatternTable) -> Self {
        Self {
            inner: Arc::new(RwLock::new(table)),
        }
    }

    pub fn candidates_for(&self, signal: &RawSignal) -> Vec<Candidate> {
        match self.inner.read() {
            Ok(table) => table.candidates_for(signal),
            Err(_) => Vec::new(),
        }
    }

    /// Run a closure against the current table (diagnostics).
    pub fn with_table<R>(&self, f: impl FnOnce(&PatternTable) -> R) -> Option<R> {
        self.inner.read().ok().map(|t| f(&t))
    }

    /// Swap in a freshly loaded table.
    pub fn replace(&self, table: PatternTable) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = table;
        }
    }
}

fn hot_reload_enabled() -> bool {
    let want = std::env::var("AUTOFILL_HOT_RELOAD")
        .ok()
        .map(|v| v == "1")
        .unwrap_or(false);
    if !want {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("AUTOFILL_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

/// Poll `path` for mtime changes and swap the table atomically. Dev only.
pub fn start_hot_reload_thread(handle: PatternHandle, path: PathBuf) {
    if !hot_reload_enabled() {
        return;
    }

    thread::spawn(move || {
        let poll = Duration::from_secs(2);
        let mut last_mtime: Option<SystemTime> = None;

        loop {
            if let Ok(mtime) = fs::metadata(&path).and_then(|m| m.modified()) {
                let changed = match last_mtime {
                    None => {
                        last_mtime = Some(mtime);
                        false
                    }
                    Some(prev) => mtime > prev,
                };
                if changed {
                    if let Ok(content) = fs::read_to_string(&path) {
                        if let Ok(fresh) = PatternTable::from_toml_str(&content) {
                            if let Ok(mut guard) = handle.inner.write() {
                                *guard = fresh;
                            }
                        }
                    }
                    last_mtime = Some(mtime);
                }
            }
            thread::sleep(poll);
        }
    });
}

/* ----------------------------
Tests
---------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(text: &str, source: SignalSource, weight: f32) -> RawSignal {
        RawSignal {
            text: text.to_string(),
            source,
            weight,
        }
    }

    #[test]
    fn builtin_table_compiles() {
        let t = PatternTable::builtin();
        assert!(!t.cfg.rules.is_empty());
        assert!(!t.cfg.autocomplete.is_empty());
    }

    #[test]
    fn email_signal_scores_at_source_weight() {
        let t = PatternTable::builtin();
        let cands = t.candidates_for(&signal("email", SignalSource::Name, 0.8));
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].key, SemanticKey::Email);
        assert!((cands[0].score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn split_name_rule_is_discounted() {
        let t = PatternTable::builtin();
        let cands = t.candidates_for(&signal("first_name", SignalSource::Name, 0.8));
        assert_eq!(cands.len(), 1, "full-name rule must not fire on a split field");
        assert_eq!(cands[0].key, SemanticKey::LegalName);
        assert!((cands[0].score - 0.64).abs() < 1e-6);
    }

    #[test]
    fn full_name_rule_scores_undiscounted() {
        let t = PatternTable::builtin();
        let cands = t.candidates_for(&signal("full_name", SignalSource::Name, 0.8));
        assert!(cands.iter().any(|c| c.rule == "full_name" && (c.score - 0.8).abs() < 1e-6));
    }

    #[test]
    fn autocomplete_token_short_circuits_regex_rules() {
        let t = PatternTable::builtin();
        // "email" would also match the regex table, but the token table
        // must answer alone at the fixed score.
        let cands = t.candidates_for(&signal("email", SignalSource::Autocomplete, 0.95));
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].key, SemanticKey::Email);
        assert!((cands[0].score - 0.95).abs() < 1e-6);
        assert!(cands[0].rule.starts_with("autocomplete:"));
    }

    #[test]
    fn unknown_autocomplete_token_yields_nothing() {
        let t = PatternTable::builtin();
        let cands = t.candidates_for(&signal("cc-number", SignalSource::Autocomplete, 0.95));
        assert!(cands.is_empty());
    }

    #[test]
    fn unmatched_signal_is_a_normal_outcome() {
        let t = PatternTable::builtin();
        let cands = t.candidates_for(&signal("favorite_color", SignalSource::Name, 0.8));
        assert!(cands.is_empty());
    }

    #[test]
    fn one_signal_can_match_multiple_rules() {
        const TOML: &str = r#"
[matcher]
autocomplete_score = 0.95
split_name_discount = 0.8

[[rules]]
id = "contact_email"
key = "email"
pattern = '(?i)contact'

[[rules]]
id = "contact_phone"
key = "phone"
pattern = '(?i)contact'
"#;
        let t = PatternTable::from_toml_str(TOML).expect("load inline test config");
        let cands = t.candidates_for(&signal("contact", SignalSource::Name, 0.8));
        assert_eq!(cands.len(), 2);
    }

    #[test]
    fn bad_regex_is_a_config_error() {
        const TOML: &str = r#"
[matcher]
autocomplete_score = 0.95
split_name_discount = 0.8

[[rules]]
id = "broken"
key = "email"
pattern = '('
"#;
        let err = PatternTable::from_toml_str(TOML).unwrap_err();
        assert!(err.to_string().contains("broken"));
    }
}
