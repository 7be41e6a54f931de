//! # File-Upload Assistant
//! File controls cannot be programmatically assigned a value, so the best
//! the engine can do is steer the user: scroll the control into view,
//! pulse a highlight on it, pop the native picker after a short delay, and
//! tell the user which generated document to pick. Best-effort UX, not a
//! guarantee.

use std::sync::Arc;
use std::time::Duration;

use crate::answers::SemanticKey;
use crate::page::{Annotation, ControlId, Page};

/// Delay before opening the native picker, so the highlight lands first.
pub const PICKER_DELAY: Duration = Duration::from_millis(400);

/// Human-readable name of the document a matched file control expects.
fn document_name(key: SemanticKey) -> &'static str {
    match key {
        SemanticKey::CoverLetter => "your generated cover letter",
        SemanticKey::Resume => "your tailored resume",
        _ => "the matching document",
    }
}

/// Run the assist choreography for one file control.
pub async fn assist(page: Arc<Page>, control: ControlId, key: SemanticKey) {
    page.annotate(Annotation::ScrolledIntoView { control });
    page.annotate(Annotation::Highlight {
        control,
        pulse: true,
    });

    tokio::time::sleep(PICKER_DELAY).await;

    page.annotate(Annotation::PickerOpened { control });
    page.annotate(Annotation::Notification {
        message: format!("Select {} in the file picker", document_name(key)),
    });
    tracing::info!(key = key.as_str(), "upload assist shown");
}
