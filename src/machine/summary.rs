use chrono::{DateTime, Utc};

use crate::model::{ContentState, ContentStatus, Effort};

/// Events driving an on-demand content fetch (summary or TLDR).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryEvent {
    Requested(Effort),
    LoadSucceeded {
        markdown: String,
        effort: Effort,
        checked_at: DateTime<Utc>,
    },
    LoadFailed(String),
    Reset,
    /// Restore a snapshot taken before the request; `None` means there was
    /// nothing worth keeping.
    Rollback(Option<ContentState>),
}

/// Apply `event` to `current`. Every event is accepted in every state.
///
/// The result always satisfies the content invariants: `Available` has
/// non-empty markdown, `Error` has a message and empty markdown. A success
/// carrying blank markdown therefore lands in `Error`.
pub fn reduce(current: &ContentState, event: SummaryEvent) -> ContentState {
    match event {
        SummaryEvent::Requested(effort) => ContentState {
            status: ContentStatus::Loading,
            effort,
            error_message: None,
            ..current.clone()
        },
        SummaryEvent::LoadSucceeded {
            markdown,
            effort,
            checked_at,
        } => {
            if markdown.trim().is_empty() {
                return failed(current, "empty response".to_string());
            }
            ContentState {
                status: ContentStatus::Available,
                markdown,
                effort,
                checked_at: Some(checked_at),
                error_message: None,
            }
        }
        SummaryEvent::LoadFailed(message) => failed(current, message),
        SummaryEvent::Reset => ContentState {
            status: ContentStatus::Unknown,
            markdown: String::new(),
            error_message: None,
            ..current.clone()
        },
        SummaryEvent::Rollback(snapshot) => snapshot.unwrap_or_default(),
    }
}

fn failed(current: &ContentState, message: String) -> ContentState {
    let message = if message.trim().is_empty() {
        "unknown error".to_string()
    } else {
        message
    };
    ContentState {
        status: ContentStatus::Error,
        markdown: String::new(),
        error_message: Some(message),
        ..current.clone()
    }
}
