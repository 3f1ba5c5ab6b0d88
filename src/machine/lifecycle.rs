use chrono::{DateTime, Utc};
use std::fmt;

use super::InvalidTransitionError;
use crate::model::{Article, ArticlePatch, ReadState};

/// Read/removed status of one article. Removal outranks read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unread,
    Read,
    Removed,
}

impl LifecycleState {
    pub fn of(article: &Article) -> Self {
        if article.removed {
            LifecycleState::Removed
        } else if article.read.is_read {
            LifecycleState::Read
        } else {
            LifecycleState::Unread
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Unread => "unread",
            LifecycleState::Read => "read",
            LifecycleState::Removed => "removed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    ReadMarked,
    ReadCleared,
    RemovedMarked,
    RemovedRestored,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::ReadMarked => "READ_MARKED",
            LifecycleEvent::ReadCleared => "READ_CLEARED",
            LifecycleEvent::RemovedMarked => "REMOVED_MARKED",
            LifecycleEvent::RemovedRestored => "REMOVED_RESTORED",
        }
    }
}

/// Next state plus the fields to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: LifecycleState,
    pub patch: ArticlePatch,
}

/// Apply `event` to `article`.
///
/// | From         | Event            | To              |
/// |--------------|------------------|-----------------|
/// | unread, read | READ_MARKED      | read            |
/// | unread, read | READ_CLEARED     | unread          |
/// | any          | REMOVED_MARKED   | removed         |
/// | removed      | REMOVED_RESTORED | read or unread  |
///
/// Changing read state while removed, or restoring an article that is not
/// removed, is an [`InvalidTransitionError`].
pub fn reduce(
    article: &Article,
    event: LifecycleEvent,
    now: DateTime<Utc>,
) -> Result<Transition, InvalidTransitionError> {
    let from = LifecycleState::of(article);
    let invalid = || InvalidTransitionError::new(from.as_str(), event.as_str());

    let transition = match (from, event) {
        (LifecycleState::Removed, LifecycleEvent::ReadMarked | LifecycleEvent::ReadCleared) => {
            return Err(invalid());
        }
        (LifecycleState::Unread | LifecycleState::Read, LifecycleEvent::RemovedRestored) => {
            return Err(invalid());
        }
        (_, LifecycleEvent::ReadMarked) => Transition {
            state: LifecycleState::Read,
            patch: ArticlePatch::read(ReadState::marked(now)),
        },
        (_, LifecycleEvent::ReadCleared) => Transition {
            state: LifecycleState::Unread,
            patch: ArticlePatch::read(ReadState::cleared()),
        },
        (_, LifecycleEvent::RemovedMarked) => Transition {
            state: LifecycleState::Removed,
            patch: ArticlePatch::removed(true),
        },
        (LifecycleState::Removed, LifecycleEvent::RemovedRestored) => Transition {
            state: if article.read.is_read {
                LifecycleState::Read
            } else {
                LifecycleState::Unread
            },
            patch: ArticlePatch::removed(false),
        },
    };

    Ok(transition)
}
