use chrono::{DateTime, NaiveDate, Utc};

use super::merge_with_existing;
use crate::model::{Article, ArticlePatch, DayPayload};
use crate::storage::{StorageError, StorageKey};
use crate::sync::SyncContext;

/// Apply a patch computed from the current article and write the day back.
///
/// Returns `Ok(None)` when the day or the URL is not stored; callers hold
/// snapshots that may be stale and must treat that as a no-op. An empty patch
/// also skips the write. A written day is stamped with the write time.
pub async fn update_article<F>(
    ctx: &SyncContext,
    date: NaiveDate,
    url: &str,
    updater: F,
) -> Result<Option<DayPayload>, StorageError>
where
    F: FnOnce(&Article) -> ArticlePatch,
{
    try_update_article(ctx, date, url, |article| Ok::<_, StorageError>(updater(article))).await
}

/// Like [`update_article`], for updaters that can refuse. An updater error
/// aborts before anything is written and is returned as-is.
pub async fn try_update_article<F, E>(
    ctx: &SyncContext,
    date: NaiveDate,
    url: &str,
    updater: F,
) -> Result<Option<DayPayload>, E>
where
    F: FnOnce(&Article) -> Result<ArticlePatch, E>,
    E: From<StorageError>,
{
    let key = StorageKey::daily(date);
    let mut refused: Option<E> = None;

    let written = ctx
        .update_json(&key, None::<DayPayload>, |payload| {
            let mut payload = payload?;
            let article = payload.article_mut(url)?;
            match updater(&*article) {
                Ok(patch) if patch.is_empty() => None,
                Ok(patch) => {
                    patch.apply(article);
                    payload.cached_at = Some(Utc::now());
                    Some(Some(payload))
                }
                Err(e) => {
                    refused = Some(e);
                    None
                }
            }
        })
        .await?;

    if let Some(e) = refused {
        return Err(e);
    }
    if written.is_none() {
        tracing::debug!(date = %date, url, "Article update skipped");
    }
    Ok(written.flatten())
}

/// Merge a freshly scraped day over whatever is stored for its date and
/// persist the result, stamped with `now`.
pub async fn store_scraped_day(
    ctx: &SyncContext,
    fresh: DayPayload,
    now: DateTime<Utc>,
) -> Result<DayPayload, StorageError> {
    let key = StorageKey::daily(fresh.date);
    let written = ctx
        .update_json(&key, None::<DayPayload>, |existing| {
            let mut merged = merge_with_existing(fresh, existing.as_ref());
            merged.cached_at = Some(now);
            Some(Some(merged))
        })
        .await?;

    written
        .flatten()
        .ok_or_else(|| StorageError::write(&key, "merged payload missing after write"))
}
