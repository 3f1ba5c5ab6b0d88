//! High-level reader operations.
//!
//! Every user action follows the same path: run the matching reducer on the
//! stored article, persist the patch through the merge layer, and let the
//! change bus tell subscribers to re-read.

use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::api::{ApiClient, ApiError};
use crate::machine::lifecycle::{self, LifecycleEvent};
use crate::machine::summary::{self, SummaryEvent};
use crate::machine::{InteractionMachine, InvalidTransitionError};
use crate::merge::{merge_scrape_result, store_scraped_day, try_update_article, update_article};
use crate::model::{ArticlePatch, ContentKind, ContentState, ContentStatus, DayPayload, Effort};
use crate::storage::{StorageError, StorageKey};
use crate::sync::{lock, SyncContext};
use crate::util::{date_range, MAX_RANGE_DAYS};

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransitionError),

    #[error("Invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Date range too long: {days} days (max {max})")]
    RangeTooLong { days: i64, max: i64 },
}

/// A content fetch that has been requested and not yet settled.
struct PendingContent {
    generation: u64,
    /// State before the request, restored on cancel or when the result
    /// turns out to be stale. `None` means "nothing worth keeping".
    snapshot: Option<ContentState>,
}

/// Pending fetches are per day: the same URL can appear on several dates.
type ContentSlot = (NaiveDate, String, ContentKind);

#[derive(Clone)]
pub struct Reader {
    ctx: SyncContext,
    api: ApiClient,
    default_effort: Effort,
    suppress_window_ms: u64,
    pending: Arc<Mutex<HashMap<ContentSlot, PendingContent>>>,
    next_generation: Arc<AtomicU64>,
}

impl Reader {
    pub fn new(ctx: SyncContext, api: ApiClient) -> Self {
        Self {
            ctx,
            api,
            default_effort: Effort::default(),
            suppress_window_ms: crate::machine::DEFAULT_SUPPRESS_WINDOW_MS,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_generation: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn with_default_effort(mut self, effort: Effort) -> Self {
        self.default_effort = effort;
        self
    }

    pub fn with_suppress_window_ms(mut self, window_ms: u64) -> Self {
        self.suppress_window_ms = window_ms;
        self
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    pub fn default_effort(&self) -> Effort {
        self.default_effort
    }

    // ========================================================================
    // Day payloads
    // ========================================================================

    pub async fn load_day(&self, date: NaiveDate) -> Option<DayPayload> {
        self.ctx
            .get_json::<Option<DayPayload>>(&StorageKey::daily(date), None)
            .await
    }

    /// Fetch and merge every day in `[start, end]`, newest first.
    ///
    /// With the cache enabled and every day already stored, the backend is
    /// not contacted. Otherwise each scraped day is merged over its stored
    /// copy, so read, removed and content state survive. Days the scrape
    /// returned nothing for are stored empty so later calls can hit the
    /// cache.
    pub async fn scrape_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DayPayload>, ReaderError> {
        if start > end {
            return Err(ReaderError::InvalidRange { start, end });
        }
        let days = (end - start).num_days() + 1;
        if days > MAX_RANGE_DAYS {
            return Err(ReaderError::RangeTooLong {
                days,
                max: MAX_RANGE_DAYS,
            });
        }
        let dates = date_range(start, end);

        if self.cache_enabled().await {
            let mut cached = Vec::with_capacity(dates.len());
            for date in &dates {
                match self.load_day(*date).await {
                    Some(payload) => cached.push(payload),
                    None => break,
                }
            }
            if cached.len() == dates.len() {
                tracing::info!(%start, %end, "Serving range from cache");
                cached.sort_by(|a, b| b.date.cmp(&a.date));
                return Ok(cached);
            }
        }

        let response = self.api.scrape(start, end).await?;
        let mut fresh: HashMap<NaiveDate, DayPayload> =
            merge_scrape_result(&response.articles, &response.issues)
                .into_iter()
                .map(|day| (day.date, day))
                .collect();
        for date in &dates {
            fresh
                .entry(*date)
                .or_insert_with(|| DayPayload::new(*date));
        }

        let now = Utc::now();
        let mut stored = Vec::with_capacity(fresh.len());
        for (_, day) in fresh {
            stored.push(store_scraped_day(&self.ctx, day, now).await?);
        }
        stored.sort_by(|a, b| b.date.cmp(&a.date));

        tracing::info!(
            %start,
            %end,
            days = stored.len(),
            articles = response.stats.total_articles,
            "Scrape merged"
        );
        Ok(stored)
    }

    // ========================================================================
    // Read / removed lifecycle
    // ========================================================================

    /// Run a lifecycle event against the stored article and persist it.
    ///
    /// `Ok(None)` when the day or article is gone.
    pub async fn apply_lifecycle(
        &self,
        date: NaiveDate,
        url: &str,
        event: LifecycleEvent,
    ) -> Result<Option<DayPayload>, ReaderError> {
        let now = Utc::now();
        try_update_article(&self.ctx, date, url, |article| {
            lifecycle::reduce(article, event, now)
                .map(|t| t.patch)
                .map_err(ReaderError::from)
        })
        .await
    }

    pub async fn mark_read(&self, date: NaiveDate, url: &str) -> Result<Option<DayPayload>, ReaderError> {
        self.apply_lifecycle(date, url, LifecycleEvent::ReadMarked).await
    }

    pub async fn mark_unread(&self, date: NaiveDate, url: &str) -> Result<Option<DayPayload>, ReaderError> {
        self.apply_lifecycle(date, url, LifecycleEvent::ReadCleared).await
    }

    pub async fn remove(&self, date: NaiveDate, url: &str) -> Result<Option<DayPayload>, ReaderError> {
        self.apply_lifecycle(date, url, LifecycleEvent::RemovedMarked).await
    }

    pub async fn restore(&self, date: NaiveDate, url: &str) -> Result<Option<DayPayload>, ReaderError> {
        self.apply_lifecycle(date, url, LifecycleEvent::RemovedRestored).await
    }

    /// Flip read state, deciding on the stored value rather than a snapshot.
    pub async fn toggle_read(&self, date: NaiveDate, url: &str) -> Result<Option<DayPayload>, ReaderError> {
        let now = Utc::now();
        try_update_article(&self.ctx, date, url, |article| {
            let event = if article.read.is_read {
                LifecycleEvent::ReadCleared
            } else {
                LifecycleEvent::ReadMarked
            };
            lifecycle::reduce(article, event, now)
                .map(|t| t.patch)
                .map_err(ReaderError::from)
        })
        .await
    }

    // ========================================================================
    // Summary / TLDR
    // ========================================================================

    /// Fetch a summary or TLDR and record the outcome on the article.
    ///
    /// Content already available at `effort` is returned without a request.
    /// A failed fetch is recorded as an error state and returned as `Ok`.
    /// Returns `Ok(None)` when the article is gone or the request was
    /// superseded (cancelled, reset, or replaced by a newer request) before
    /// it completed.
    pub async fn request_content(
        &self,
        date: NaiveDate,
        url: &str,
        kind: ContentKind,
        effort: Effort,
    ) -> Result<Option<ContentState>, ReaderError> {
        let Some(day) = self.load_day(date).await else {
            return Ok(None);
        };
        let Some(article) = day.article(url) else {
            return Ok(None);
        };
        let current = article.content(kind).clone();
        if current.is_available() && current.effort == effort {
            return Ok(Some(current));
        }

        let slot: ContentSlot = (date, url.to_string(), kind);
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        {
            let mut pending = lock(&self.pending);
            // A request replacing another keeps the original snapshot
            let snapshot = match pending.remove(&slot) {
                Some(previous) => previous.snapshot,
                None => snapshot_of(&current),
            };
            pending.insert(slot.clone(), PendingContent { generation, snapshot });
        }

        let requested = self
            .apply_content(date, url, kind, |state| {
                Some(summary::reduce(state, SummaryEvent::Requested(effort)))
            })
            .await;
        match requested {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.settle(&slot, generation);
                return Ok(None);
            }
            Err(e) => {
                self.settle(&slot, generation);
                return Err(e);
            }
        }

        tracing::debug!(url, %kind, %effort, generation, "Requesting content");
        let outcome = self.api.fetch_content(url, kind, effort).await;

        let Some(snapshot) = self.settle(&slot, generation) else {
            tracing::debug!(url, %kind, generation, "Discarding superseded content result");
            return Ok(None);
        };

        let event = match outcome {
            Ok(markdown) => SummaryEvent::LoadSucceeded {
                markdown,
                effort,
                checked_at: Utc::now(),
            },
            Err(e) => {
                tracing::warn!(url, %kind, error = %e, "Content request failed");
                SummaryEvent::LoadFailed(e.to_string())
            }
        };

        let payload = self
            .apply_content(date, url, kind, |state| {
                if state.status == ContentStatus::Loading && state.effort == effort {
                    Some(summary::reduce(state, event))
                } else if state.status == ContentStatus::Loading {
                    // Another surface moved to a different effort and nothing
                    // here will complete it
                    Some(summary::reduce(state, SummaryEvent::Rollback(snapshot)))
                } else {
                    None
                }
            })
            .await?;

        Ok(payload
            .and_then(|day| day.article(url).map(|a| a.content(kind).clone())))
    }

    /// Abandon an in-flight fetch and restore what was there before it.
    pub async fn cancel_content(
        &self,
        date: NaiveDate,
        url: &str,
        kind: ContentKind,
    ) -> Result<Option<DayPayload>, ReaderError> {
        let slot: ContentSlot = (date, url.to_string(), kind);
        let event = match lock(&self.pending).remove(&slot) {
            Some(pending) => SummaryEvent::Rollback(pending.snapshot),
            None => SummaryEvent::Reset,
        };
        self.apply_content(date, url, kind, |state| Some(summary::reduce(state, event)))
            .await
    }

    /// Clear content back to unknown, abandoning any in-flight fetch.
    pub async fn reset_content(
        &self,
        date: NaiveDate,
        url: &str,
        kind: ContentKind,
    ) -> Result<Option<DayPayload>, ReaderError> {
        lock(&self.pending).remove(&(date, url.to_string(), kind));
        self.apply_content(date, url, kind, |state| {
            Some(summary::reduce(state, SummaryEvent::Reset))
        })
        .await
    }

    /// Remove the pending entry for `slot` if it still belongs to
    /// `generation`, returning its snapshot. `None` means superseded.
    fn settle(&self, slot: &ContentSlot, generation: u64) -> Option<Option<ContentState>> {
        let mut pending = lock(&self.pending);
        match pending.get(slot) {
            Some(entry) if entry.generation == generation => {
                pending.remove(slot).map(|entry| entry.snapshot)
            }
            _ => None,
        }
    }

    /// Persist `f(current content)`; `None` from `f` writes nothing.
    async fn apply_content<F>(
        &self,
        date: NaiveDate,
        url: &str,
        kind: ContentKind,
        f: F,
    ) -> Result<Option<DayPayload>, ReaderError>
    where
        F: FnOnce(&ContentState) -> Option<ContentState>,
    {
        let payload = update_article(&self.ctx, date, url, |article| {
            match f(article.content(kind)) {
                Some(next) if &next != article.content(kind) => ArticlePatch::content(kind, next),
                _ => ArticlePatch::default(),
            }
        })
        .await?;
        Ok(payload)
    }

    // ========================================================================
    // Settings and interaction persistence
    // ========================================================================

    pub async fn cache_enabled(&self) -> bool {
        self.ctx.get_json(&StorageKey::cache_enabled(), true).await
    }

    pub async fn set_cache_enabled(&self, enabled: bool) -> Result<(), ReaderError> {
        self.ctx
            .set_json(&StorageKey::cache_enabled(), &enabled)
            .await?;
        tracing::info!(enabled, "Cache setting changed");
        Ok(())
    }

    /// Rebuild selection and expansion state from the device store.
    pub async fn load_interaction(&self) -> InteractionMachine {
        let selected: Vec<String> = self
            .ctx
            .get_json(&StorageKey::selected_sources(), Vec::new())
            .await;
        let expanded: Vec<String> = self
            .ctx
            .get_json(&StorageKey::expanded_containers(), Vec::new())
            .await;
        InteractionMachine::restore(self.suppress_window_ms, selected, expanded)
    }

    pub async fn save_interaction(&self, machine: &InteractionMachine) -> Result<(), ReaderError> {
        let selected: Vec<&str> = machine.selected_ids().collect();
        let expanded: Vec<&str> = machine.expanded_ids().collect();
        self.ctx
            .set_json(&StorageKey::selected_sources(), &selected)
            .await?;
        self.ctx
            .set_json(&StorageKey::expanded_containers(), &expanded)
            .await?;
        Ok(())
    }
}

/// What a rollback should restore to. Unknown and orphaned loading states
/// carry nothing worth keeping.
fn snapshot_of(state: &ContentState) -> Option<ContentState> {
    match state.status {
        ContentStatus::Unknown | ContentStatus::Loading => None,
        ContentStatus::Available | ContentStatus::Error => Some(state.clone()),
    }
}
