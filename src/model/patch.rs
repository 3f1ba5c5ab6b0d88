use super::types::{Article, ContentKind, ContentState, ReadState};

/// Shallow patch over the user-owned fields of an [`Article`].
///
/// State machines emit patches; the merge layer applies them to the stored
/// payload. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticlePatch {
    pub removed: Option<bool>,
    pub read: Option<ReadState>,
    pub summary: Option<ContentState>,
    pub tldr: Option<ContentState>,
}

impl ArticlePatch {
    pub fn removed(removed: bool) -> Self {
        Self {
            removed: Some(removed),
            ..Self::default()
        }
    }

    pub fn read(read: ReadState) -> Self {
        Self {
            read: Some(read),
            ..Self::default()
        }
    }

    pub fn content(kind: ContentKind, state: ContentState) -> Self {
        match kind {
            ContentKind::Summary => Self {
                summary: Some(state),
                ..Self::default()
            },
            ContentKind::Tldr => Self {
                tldr: Some(state),
                ..Self::default()
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_none() && self.read.is_none() && self.summary.is_none() && self.tldr.is_none()
    }

    pub fn apply(self, article: &mut Article) {
        if let Some(removed) = self.removed {
            article.removed = removed;
        }
        if let Some(read) = self.read {
            article.read = read;
        }
        if let Some(summary) = self.summary {
            article.summary = summary;
        }
        if let Some(tldr) = self.tldr {
            article.tldr = tldr;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentStatus;
    use chrono::NaiveDate;

    fn article() -> Article {
        Article {
            url: "https://example.com/a".to_string(),
            title: "A".to_string(),
            issue_date: NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
            category: "tech".to_string(),
            section: None,
            section_emoji: None,
            section_order: None,
            newsletter_type: None,
            removed: false,
            read: ReadState::default(),
            summary: ContentState::default(),
            tldr: ContentState::default(),
        }
    }

    #[test]
    fn test_apply_only_touches_set_fields() {
        let mut a = article();
        a.read.is_read = true;

        ArticlePatch::removed(true).apply(&mut a);

        assert!(a.removed);
        assert!(a.read.is_read);
        assert_eq!(a.summary.status, ContentStatus::Unknown);
    }

    #[test]
    fn test_content_patch_targets_kind() {
        let mut a = article();
        let state = ContentState {
            status: ContentStatus::Available,
            markdown: "tl;dr".to_string(),
            ..ContentState::default()
        };

        ArticlePatch::content(ContentKind::Tldr, state.clone()).apply(&mut a);

        assert_eq!(a.tldr, state);
        assert_eq!(a.summary, ContentState::default());
    }

    #[test]
    fn test_default_patch_is_empty() {
        assert!(ArticlePatch::default().is_empty());
        assert!(!ArticlePatch::removed(false).is_empty());
    }
}
