use std::collections::{BTreeSet, HashSet};

/// How long a long-press protects its target from the trailing short press.
pub const DEFAULT_SUPPRESS_WINDOW_MS: u64 = 800;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionEvent {
    ItemLongPress(String),
    ContainerLongPress { id: String, child_ids: Vec<String> },
    ItemShortPress(String),
    ContainerShortPress(String),
    RegisterDisabled { id: String, disabled: bool },
    ClearSelection,
    SetExpanded { id: String, expanded: bool },
}

/// What the caller should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressDecision {
    /// State may have changed; nothing else to do.
    Handled,
    /// The press was the tail of a long-press and was swallowed.
    Suppressed,
    /// Not in select mode: open the item.
    OpenItem,
}

impl PressDecision {
    pub fn should_open_item(self) -> bool {
        self == PressDecision::OpenItem
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SuppressLatch {
    id: String,
    until_ms: u64,
}

/// Selection and expand/collapse state for one list surface.
///
/// Select mode is derived from a non-empty selection. The suppress latch is a
/// single slot: only the most recent long-press is protected.
#[derive(Debug, Clone)]
pub struct InteractionMachine {
    selected: BTreeSet<String>,
    disabled: HashSet<String>,
    expanded: BTreeSet<String>,
    suppress: Option<SuppressLatch>,
    suppress_window_ms: u64,
}

impl Default for InteractionMachine {
    fn default() -> Self {
        Self::new(DEFAULT_SUPPRESS_WINDOW_MS)
    }
}

impl InteractionMachine {
    pub fn new(suppress_window_ms: u64) -> Self {
        Self {
            selected: BTreeSet::new(),
            disabled: HashSet::new(),
            expanded: BTreeSet::new(),
            suppress: None,
            suppress_window_ms,
        }
    }

    /// Rebuild from persisted selection and expansion.
    pub fn restore<S, E>(suppress_window_ms: u64, selected: S, expanded: E) -> Self
    where
        S: IntoIterator<Item = String>,
        E: IntoIterator<Item = String>,
    {
        Self {
            selected: selected.into_iter().collect(),
            expanded: expanded.into_iter().collect(),
            ..Self::new(suppress_window_ms)
        }
    }

    pub fn is_select_mode(&self) -> bool {
        !self.selected.is_empty()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn is_disabled(&self, id: &str) -> bool {
        self.disabled.contains(id)
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    pub fn selected_ids(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }

    pub fn expanded_ids(&self) -> impl Iterator<Item = &str> {
        self.expanded.iter().map(String::as_str)
    }

    pub fn suppress_window_ms(&self) -> u64 {
        self.suppress_window_ms
    }

    /// Apply `event` at time `now_ms` (milliseconds on any monotonic clock).
    pub fn dispatch(&mut self, event: InteractionEvent, now_ms: u64) -> PressDecision {
        match event {
            InteractionEvent::ItemLongPress(id) => {
                if !self.disabled.contains(&id) {
                    toggle(&mut self.selected, &id);
                }
                self.arm(id, now_ms);
                PressDecision::Handled
            }
            InteractionEvent::ContainerLongPress { id, child_ids } => {
                let eligible: Vec<String> = child_ids
                    .into_iter()
                    .filter(|c| !self.disabled.contains(c))
                    .collect();
                if eligible.iter().all(|c| self.selected.contains(c)) {
                    for child in &eligible {
                        self.selected.remove(child);
                    }
                } else {
                    self.selected.extend(eligible);
                }
                self.arm(id, now_ms);
                PressDecision::Handled
            }
            InteractionEvent::ItemShortPress(id) => {
                if self.consume_latch(&id, now_ms) {
                    PressDecision::Suppressed
                } else if self.is_select_mode() {
                    if !self.disabled.contains(&id) {
                        toggle(&mut self.selected, &id);
                    }
                    PressDecision::Handled
                } else {
                    PressDecision::OpenItem
                }
            }
            InteractionEvent::ContainerShortPress(id) => {
                if self.consume_latch(&id, now_ms) {
                    return PressDecision::Suppressed;
                }
                toggle(&mut self.expanded, &id);
                PressDecision::Handled
            }
            InteractionEvent::RegisterDisabled { id, disabled } => {
                if disabled {
                    self.selected.remove(&id);
                    self.disabled.insert(id);
                } else {
                    self.disabled.remove(&id);
                }
                PressDecision::Handled
            }
            InteractionEvent::ClearSelection => {
                self.selected.clear();
                PressDecision::Handled
            }
            InteractionEvent::SetExpanded { id, expanded } => {
                if expanded {
                    self.expanded.insert(id);
                } else {
                    self.expanded.remove(&id);
                }
                PressDecision::Handled
            }
        }
    }

    fn arm(&mut self, id: String, now_ms: u64) {
        self.suppress = Some(SuppressLatch {
            id,
            until_ms: now_ms.saturating_add(self.suppress_window_ms),
        });
    }

    /// True (and the latch cleared) if `id` is protected at `now_ms`.
    /// An expired latch is dropped on the way.
    fn consume_latch(&mut self, id: &str, now_ms: u64) -> bool {
        let Some(latch) = &self.suppress else {
            return false;
        };
        let expired = now_ms > latch.until_ms;
        let matches = latch.id == id;
        if expired || matches {
            self.suppress = None;
        }
        matches && !expired
    }
}

fn toggle(set: &mut BTreeSet<String>, id: &str) {
    if !set.remove(id) {
        set.insert(id.to_string());
    }
}
