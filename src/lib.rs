// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod answers;
pub mod api;
pub mod bridge;
pub mod engine;
pub mod executor;
pub mod metrics;
pub mod page;
pub mod patterns;
pub mod scanner;
pub mod scorer;
pub mod signals;
pub mod uploads;
pub mod watcher;

// ---- Re-exports for stable public API ----
pub use crate::answers::{AnswerMap, AnswerValue, AutofillAnswers, SemanticKey};
pub use crate::api::create_router;
pub use crate::engine::EngineState;
pub use crate::executor::{FillOutcome, FillReport};
pub use crate::page::{Page, PageSnapshot};
pub use crate::patterns::{PatternHandle, PatternTable};
pub use crate::scanner::FieldMatch;
pub use crate::scorer::{ConfidenceTier, TierTable};
pub use crate::signals::SignalWeights;
