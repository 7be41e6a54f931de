//! Semantic keys and the resolved answer map.
//!
//! A `SemanticKey` identifies *what* a control asks for, independent of how
//! the host page words it. The answer map is fetched once per job context
//! and treated as read-only for the page session.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canonical meaning of a form field. Matches the Autofill Data Service
/// wire schema (camelCase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SemanticKey {
    LegalName,
    Email,
    Phone,
    Linkedin,
    Github,
    Portfolio,
    WorkAuth,
    VisaStatus,
    SalaryExpectation,
    Availability,
    Relocation,
    Remote,
    /// File controls: which generated document the user should pick.
    Resume,
    CoverLetter,
}

impl SemanticKey {
    /// Wire name, useful for logs and diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticKey::LegalName => "legalName",
            SemanticKey::Email => "email",
            SemanticKey::Phone => "phone",
            SemanticKey::Linkedin => "linkedin",
            SemanticKey::Github => "github",
            SemanticKey::Portfolio => "portfolio",
            SemanticKey::WorkAuth => "workAuth",
            SemanticKey::VisaStatus => "visaStatus",
            SemanticKey::SalaryExpectation => "salaryExpectation",
            SemanticKey::Availability => "availability",
            SemanticKey::Relocation => "relocation",
            SemanticKey::Remote => "remote",
            SemanticKey::Resume => "resume",
            SemanticKey::CoverLetter => "coverLetter",
        }
    }
}

/// A resolved answer value: free text or a yes/no flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Text(String),
    Flag(bool),
}

impl AnswerValue {
    /// Rendering used when writing into text-like controls and when
    /// matching select options.
    pub fn render(&self) -> String {
        match self {
            AnswerValue::Text(s) => s.clone(),
            AnswerValue::Flag(true) => "Yes".to_string(),
            AnswerValue::Flag(false) => "No".to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, AnswerValue::Text(s) if s.trim().is_empty())
    }
}

/// Wire shape of the Autofill Data Service answer payload.
/// Unknown keys land in `extra` (the backend allows additional fields).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutofillAnswers {
    pub legal_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub portfolio: Option<String>,
    pub work_auth: Option<String>,
    pub visa_status: Option<String>,
    pub salary_expectation: Option<String>,
    pub availability: Option<String>,
    pub relocation: Option<String>,
    pub remote: Option<String>,
    #[serde(default)]
    pub extra: HashMap<String, AnswerValue>,
}

/// Read-only map from semantic key to resolved value for the page session.
#[derive(Debug, Clone, Default)]
pub struct AnswerMap {
    values: HashMap<SemanticKey, AnswerValue>,
    /// Backend-supplied keys outside the canonical set; diagnostics only.
    extra: HashMap<String, AnswerValue>,
}

impl AnswerMap {
    pub fn value_for(&self, key: SemanticKey) -> Option<&AnswerValue> {
        self.values.get(&key).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, key: SemanticKey, value: AnswerValue) {
        self.values.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = SemanticKey> + '_ {
        self.values.keys().copied()
    }

    pub fn extra(&self) -> &HashMap<String, AnswerValue> {
        &self.extra
    }
}

impl From<AutofillAnswers> for AnswerMap {
    fn from(wire: AutofillAnswers) -> Self {
        let mut map = AnswerMap::default();
        let pairs = [
            (SemanticKey::LegalName, wire.legal_name),
            (SemanticKey::Email, wire.email),
            (SemanticKey::Phone, wire.phone),
            (SemanticKey::Linkedin, wire.linkedin),
            (SemanticKey::Github, wire.github),
            (SemanticKey::Portfolio, wire.portfolio),
            (SemanticKey::WorkAuth, wire.work_auth),
            (SemanticKey::VisaStatus, wire.visa_status),
            (SemanticKey::SalaryExpectation, wire.salary_expectation),
            (SemanticKey::Availability, wire.availability),
            (SemanticKey::Relocation, wire.relocation),
            (SemanticKey::Remote, wire.remote),
        ];
        for (key, value) in pairs {
            if let Some(v) = value {
                if !v.trim().is_empty() {
                    map.values.insert(key, AnswerValue::Text(v));
                }
            }
        }
        map.extra = wire.extra;
        map
    }
}
