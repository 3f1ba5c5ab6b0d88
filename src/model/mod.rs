//! Persisted data model: day payloads, issues, articles and content state.

mod patch;
mod types;

pub use patch::ArticlePatch;
pub use types::{
    Article, ContentKind, ContentState, ContentStatus, DayPayload, Effort, Issue, ReadState,
    Section,
};
