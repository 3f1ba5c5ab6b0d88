use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Upper bound on the number of days a single range may span.
pub const MAX_RANGE_DAYS: i64 = 366;

/// Normalize a loosely formatted date string to a calendar date.
///
/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and `YYYY-MM-DDTHH:MM:SS`
/// without an offset. Anything else yields `None`; callers drop such records
/// instead of failing.
pub fn normalize_iso_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.date_naive());
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ts.date());
    }
    None
}

/// All dates from `start` to `end`, inclusive, oldest first.
///
/// Returns an empty vector when `start > end`. Ranges longer than
/// [`MAX_RANGE_DAYS`] are truncated.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .take(MAX_RANGE_DAYS as usize)
        .collect()
}
