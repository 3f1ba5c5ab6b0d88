//! Reconciling freshly scraped data with the locally annotated copy.
//!
//! Structure (titles, categories, sections, issues) always comes from the
//! latest scrape. User state (read, removed, summary, tldr) always comes from
//! the stored copy. Merging never fails: anything without a prior match
//! starts from defaults.

mod ordering;
mod update;

pub use ordering::{article_rank, group_by_section, sort_articles_by_state, SectionGroup};
pub use update::{store_scraped_day, try_update_article, update_article};

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};

use crate::api::{RawArticle, RawIssue};
use crate::model::{Article, ContentState, DayPayload, Issue, ReadState};
use crate::util::normalize_iso_date;

/// Group a scrape result into one payload per date, oldest first.
///
/// Records with an unparsable date or an empty URL are dropped. Duplicate
/// URLs within a day keep their first occurrence; duplicate issue categories
/// keep the last. Every article starts unread, not removed, with unknown
/// summary and tldr.
pub fn merge_scrape_result(raw_articles: &[RawArticle], raw_issues: &[RawIssue]) -> Vec<DayPayload> {
    let mut days: BTreeMap<NaiveDate, DayPayload> = BTreeMap::new();
    let mut seen: HashSet<(NaiveDate, &str)> = HashSet::new();

    for raw in raw_articles {
        let Some(date) = normalize_iso_date(&raw.date) else {
            tracing::debug!(url = %raw.url, date = %raw.date, "Dropping article with invalid date");
            continue;
        };
        let url = raw.url.trim();
        if url.is_empty() {
            tracing::debug!(date = %date, "Dropping article without URL");
            continue;
        }
        if !seen.insert((date, url)) {
            continue;
        }

        days.entry(date)
            .or_insert_with(|| DayPayload::new(date))
            .articles
            .push(article_from_raw(raw, url, date));
    }

    for raw in raw_issues {
        let Some(date) = normalize_iso_date(&raw.date) else {
            tracing::debug!(category = %raw.category, date = %raw.date, "Dropping issue with invalid date");
            continue;
        };
        let issue = Issue {
            category: raw.category.clone(),
            newsletter_type: raw.newsletter_type.clone(),
            title: raw.title.clone(),
            subtitle: raw.subtitle.clone(),
            sections: raw.sections.clone(),
        };

        let issues = &mut days.entry(date).or_insert_with(|| DayPayload::new(date)).issues;
        match issues.iter_mut().find(|i| i.category == issue.category) {
            Some(existing) => *existing = issue,
            None => issues.push(issue),
        }
    }

    days.into_values().collect()
}

fn article_from_raw(raw: &RawArticle, url: &str, date: NaiveDate) -> Article {
    let title = raw.title.trim();
    Article {
        url: url.to_string(),
        title: if title.is_empty() { url.to_string() } else { title.to_string() },
        issue_date: date,
        category: raw.category.clone().unwrap_or_default(),
        section: raw.section_title.clone(),
        section_emoji: raw.section_emoji.clone(),
        section_order: raw.section_order,
        newsletter_type: raw.newsletter_type.clone(),
        removed: false,
        read: ReadState::default(),
        summary: ContentState::default(),
        tldr: ContentState::default(),
    }
}

/// Merge a fresh day payload over the stored one.
///
/// Fresh articles keep their structural fields and inherit `removed`, `read`,
/// `summary` and `tldr` from the stored article with the same URL. Stored
/// articles missing from the fresh scrape are kept, after the fresh ones, so
/// user state is never lost. Issues come from the fresh payload unless it has
/// none.
pub fn merge_with_existing(fresh: DayPayload, existing: Option<&DayPayload>) -> DayPayload {
    let Some(existing) = existing else {
        return fresh;
    };
    if existing.date != fresh.date {
        tracing::warn!(
            fresh = %fresh.date,
            existing = %existing.date,
            "Refusing to merge payloads for different dates"
        );
        return fresh;
    }

    let fresh_urls: HashSet<&str> = fresh.articles.iter().map(|a| a.url.as_str()).collect();
    let carried: Vec<Article> = existing
        .articles
        .iter()
        .filter(|a| !fresh_urls.contains(a.url.as_str()))
        .cloned()
        .collect();

    let mut articles: Vec<Article> = fresh
        .articles
        .into_iter()
        .map(|mut article| {
            if let Some(prior) = existing.article(&article.url) {
                article.removed = prior.removed;
                article.read = prior.read.clone();
                article.summary = prior.summary.clone();
                article.tldr = prior.tldr.clone();
            }
            article
        })
        .collect();
    articles.extend(carried);

    let issues = if fresh.issues.is_empty() {
        existing.issues.clone()
    } else {
        fresh.issues
    };

    DayPayload {
        date: fresh.date,
        cached_at: fresh.cached_at.or(existing.cached_at),
        issues,
        articles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentStatus, Effort, Section};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn raw(url: &str, date: &str, title: &str) -> RawArticle {
        RawArticle {
            url: url.to_string(),
            title: title.to_string(),
            date: date.to_string(),
            category: Some("Tech".to_string()),
            section_title: Some("Big Tech".to_string()),
            section_emoji: Some("📱".to_string()),
            section_order: Some(1),
            newsletter_type: Some("tech".to_string()),
        }
    }

    fn raw_issue(date: &str, category: &str) -> RawIssue {
        RawIssue {
            date: date.to_string(),
            category: category.to_string(),
            newsletter_type: Some("tech".to_string()),
            title: Some(format!("{category} daily")),
            subtitle: None,
            sections: vec![Section {
                order: 1,
                title: "Big Tech".to_string(),
                emoji: None,
            }],
        }
    }

    fn day(date: &str) -> NaiveDate {
        normalize_iso_date(date).unwrap()
    }

    #[test]
    fn test_groups_by_date_and_drops_invalid() {
        let articles = vec![
            raw("https://a.example.com", "2024-08-02", "A"),
            raw("https://b.example.com", "2024-08-01T08:00:00Z", "B"),
            raw("https://c.example.com", "not-a-date", "C"),
            raw("  ", "2024-08-01", "blank url"),
        ];
        let issues = vec![raw_issue("2024-08-01", "Tech"), raw_issue("bogus", "AI")];

        let days = merge_scrape_result(&articles, &issues);

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, day("2024-08-01"));
        assert_eq!(days[0].articles.len(), 1);
        assert_eq!(days[0].articles[0].url, "https://b.example.com");
        assert_eq!(days[0].issues.len(), 1);
        assert_eq!(days[1].date, day("2024-08-02"));
        assert!(days[1].issues.is_empty());
        for payload in &days {
            assert!(payload.articles.iter().all(|a| a.issue_date == payload.date));
        }
    }

    #[test]
    fn test_fresh_articles_start_with_defaults() {
        let days = merge_scrape_result(&[raw("https://a.example.com", "2024-08-01", "")], &[]);
        let article = &days[0].articles[0];

        assert_eq!(article.title, "https://a.example.com");
        assert!(!article.removed);
        assert!(!article.read.is_read);
        assert_eq!(article.summary.status, ContentStatus::Unknown);
        assert_eq!(article.tldr.status, ContentStatus::Unknown);
    }

    #[test]
    fn test_duplicate_urls_keep_first() {
        let days = merge_scrape_result(
            &[
                raw("https://a.example.com", "2024-08-01", "First"),
                raw("https://a.example.com", "2024-08-01", "Second"),
            ],
            &[],
        );
        assert_eq!(days[0].articles.len(), 1);
        assert_eq!(days[0].articles[0].title, "First");
    }

    #[test]
    fn test_merge_without_existing_is_identity() {
        let fresh = merge_scrape_result(&[raw("https://a.example.com", "2024-08-01", "A")], &[])
            .remove(0);
        assert_eq!(merge_with_existing(fresh.clone(), None), fresh);
    }

    #[test]
    fn test_merge_keeps_user_state_and_takes_fresh_structure() {
        let mut existing =
            merge_scrape_result(&[raw("https://a.example.com", "2024-08-01", "Old title")], &[])
                .remove(0);
        {
            let a = &mut existing.articles[0];
            a.removed = true;
            a.read = ReadState::marked(Utc::now());
            a.summary = ContentState {
                status: ContentStatus::Available,
                markdown: "summary".to_string(),
                effort: Effort::High,
                checked_at: Some(Utc::now()),
                error_message: None,
            };
        }

        let mut fresh_raw = raw("https://a.example.com", "2024-08-01", "New title");
        fresh_raw.category = Some("AI".to_string());
        fresh_raw.section_order = Some(3);
        let fresh = merge_scrape_result(&[fresh_raw], &[]).remove(0);

        let merged = merge_with_existing(fresh, Some(&existing));
        let a = &merged.articles[0];

        assert_eq!(a.title, "New title");
        assert_eq!(a.category, "AI");
        assert_eq!(a.section_order, Some(3));
        assert!(a.removed);
        assert_eq!(a.read, existing.articles[0].read);
        assert_eq!(a.summary, existing.articles[0].summary);
    }

    #[test]
    fn test_merge_keeps_stored_articles_missing_from_scrape() {
        let existing = merge_scrape_result(
            &[
                raw("https://a.example.com", "2024-08-01", "A"),
                raw("https://b.example.com", "2024-08-01", "B"),
            ],
            &[],
        )
        .remove(0);
        let fresh = merge_scrape_result(&[raw("https://b.example.com", "2024-08-01", "B2")], &[])
            .remove(0);

        let merged = merge_with_existing(fresh, Some(&existing));
        let urls: Vec<&str> = merged.articles.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["https://b.example.com", "https://a.example.com"]);
    }

    #[test]
    fn test_issues_replaced_only_when_fresh_has_some() {
        let existing = merge_scrape_result(&[], &[raw_issue("2024-08-01", "Tech")]).remove(0);

        let empty = DayPayload::new(day("2024-08-01"));
        assert_eq!(merge_with_existing(empty, Some(&existing)).issues, existing.issues);

        let fresh = merge_scrape_result(&[], &[raw_issue("2024-08-01", "AI")]).remove(0);
        let merged = merge_with_existing(fresh, Some(&existing));
        assert_eq!(merged.issues.len(), 1);
        assert_eq!(merged.issues[0].category, "AI");
    }

    proptest! {
        #[test]
        fn prop_merge_preserves_user_state(
            removed in proptest::collection::vec(any::<bool>(), 1..8),
            read in proptest::collection::vec(any::<bool>(), 1..8),
            new_titles in proptest::collection::vec("[a-zA-Z ]{1,20}", 1..8),
            reverse in any::<bool>(),
        ) {
            let n = removed.len().min(read.len()).min(new_titles.len());
            let raws: Vec<RawArticle> = (0..n)
                .map(|i| raw(&format!("https://example.com/{i}"), "2024-08-01", "Original"))
                .collect();
            let mut existing = merge_scrape_result(&raws, &[]).remove(0);
            for (i, article) in existing.articles.iter_mut().enumerate() {
                article.removed = removed[i];
                if read[i] {
                    article.read = ReadState::marked(Utc::now());
                }
            }

            let mut fresh_raws: Vec<RawArticle> = (0..n)
                .map(|i| {
                    let mut r = raw(&format!("https://example.com/{i}"), "2024-08-01", &new_titles[i]);
                    r.category = Some(format!("cat-{i}"));
                    r
                })
                .collect();
            if reverse {
                fresh_raws.reverse();
            }
            let fresh = merge_scrape_result(&fresh_raws, &[]).remove(0);

            let merged = merge_with_existing(fresh, Some(&existing));

            prop_assert_eq!(merged.articles.len(), n);
            for article in &merged.articles {
                let prior = existing.article(&article.url).unwrap();
                prop_assert_eq!(article.removed, prior.removed);
                prop_assert_eq!(&article.read, &prior.read);
                prop_assert_ne!(&article.category, &prior.category);
            }
        }
    }
}
