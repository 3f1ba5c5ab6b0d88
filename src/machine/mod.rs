//! Pure reducers for article state and UI interaction.
//!
//! Reducers never perform I/O. The lifecycle and content reducers return the
//! next state together with the [`ArticlePatch`](crate::model::ArticlePatch)
//! to persist; the interaction reducer owns its state directly.

pub mod interaction;
pub mod lifecycle;
pub mod summary;

pub use interaction::{InteractionEvent, InteractionMachine, PressDecision, DEFAULT_SUPPRESS_WINDOW_MS};
pub use lifecycle::{LifecycleEvent, LifecycleState, Transition};
pub use summary::SummaryEvent;

use thiserror::Error;

/// An event was applied in a state that does not accept it.
///
/// A programming error in the caller. Debug builds should surface it; UI
/// paths log it and carry on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event} is not allowed while {state}")]
pub struct InvalidTransitionError {
    pub state: &'static str,
    pub event: &'static str,
}

impl InvalidTransitionError {
    pub fn new(state: &'static str, event: &'static str) -> Self {
        Self { state, event }
    }
}
