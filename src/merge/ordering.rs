use crate::model::Article;

/// Display rank: unread (0), read (1), removed (2). Removal outranks read.
pub fn article_rank(article: &Article) -> u8 {
    if article.removed {
        2
    } else if article.read.is_read {
        1
    } else {
        0
    }
}

/// Unread first, then read, then removed. Ties keep scrape order.
pub fn sort_articles_by_state(articles: &[Article]) -> Vec<Article> {
    let mut sorted = articles.to_vec();
    // sort_by_key is stable
    sorted.sort_by_key(article_rank);
    sorted
}

/// A run of articles sharing category and section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionGroup {
    pub category: String,
    pub section: Option<String>,
    pub section_emoji: Option<String>,
    pub section_order: Option<i64>,
    pub articles: Vec<Article>,
}

impl SectionGroup {
    fn matches(&self, article: &Article) -> bool {
        self.category == article.category
            && self.section_order == article.section_order
            && self.section == article.section
    }
}

/// Group articles by `(category, section_order, section)`.
///
/// Groups appear in the order their first article appears, and every
/// article of a group is gathered into it even when the input interleaves
/// sections, so a section never renders as two separate runs.
pub fn group_by_section(articles: &[Article]) -> Vec<SectionGroup> {
    let mut groups: Vec<SectionGroup> = Vec::new();

    for article in articles {
        match groups.iter_mut().find(|g| g.matches(article)) {
            Some(group) => group.articles.push(article.clone()),
            None => groups.push(SectionGroup {
                category: article.category.clone(),
                section: article.section.clone(),
                section_emoji: article.section_emoji.clone(),
                section_order: article.section_order,
                articles: vec![article.clone()],
            }),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentState, ReadState};
    use chrono::{NaiveDate, Utc};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn article(url: &str) -> Article {
        Article {
            url: url.to_string(),
            title: url.to_string(),
            issue_date: NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
            category: "Tech".to_string(),
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

    fn in_section(url: &str, order: i64, title: &str) -> Article {
        Article {
            section: Some(title.to_string()),
            section_order: Some(order),
            ..article(url)
        }
    }

    #[test]
    fn test_removed_article_sorts_after_unread() {
        let mut first = article("https://example.com/1");
        first.removed = true;
        let second = article("https://example.com/2");

        let sorted = sort_articles_by_state(&[first, second]);

        let urls: Vec<&str> = sorted.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/2", "https://example.com/1"]);
    }

    #[test]
    fn test_removed_read_article_ranks_as_removed() {
        let mut a = article("https://example.com/1");
        a.removed = true;
        a.read = ReadState::marked(Utc::now());
        assert_eq!(article_rank(&a), 2);
    }

    #[test]
    fn test_group_gathers_interleaved_sections() {
        let articles = vec![
            in_section("https://example.com/1", 1, "Big Tech"),
            in_section("https://example.com/2", 2, "Science"),
            in_section("https://example.com/3", 1, "Big Tech"),
        ];

        let groups = group_by_section(&articles);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].section.as_deref(), Some("Big Tech"));
        assert_eq!(groups[0].articles.len(), 2);
        assert_eq!(groups[1].section.as_deref(), Some("Science"));
    }

    #[test]
    fn test_repeated_order_with_different_titles_stays_separate() {
        let articles = vec![
            in_section("https://example.com/1", 1, "Big Tech"),
            in_section("https://example.com/2", 1, "Startups"),
        ];
        assert_eq!(group_by_section(&articles).len(), 2);
    }

    #[test]
    fn test_same_section_in_other_category_is_separate() {
        let mut other = in_section("https://example.com/2", 1, "Big Tech");
        other.category = "AI".to_string();
        let articles = vec![in_section("https://example.com/1", 1, "Big Tech"), other];
        assert_eq!(group_by_section(&articles).len(), 2);
    }

    proptest! {
        #[test]
        fn prop_sort_orders_by_state_and_is_stable(
            states in proptest::collection::vec((any::<bool>(), any::<bool>()), 0..20)
        ) {
            let articles: Vec<Article> = states
                .iter()
                .enumerate()
                .map(|(i, (removed, read))| {
                    let mut a = article(&format!("https://example.com/{i}"));
                    a.removed = *removed;
                    if *read {
                        a.read = ReadState::marked(Utc::now());
                    }
                    a
                })
                .collect();

            let sorted = sort_articles_by_state(&articles);
            prop_assert_eq!(sorted.len(), articles.len());

            let index_of = |a: &Article| articles.iter().position(|b| b.url == a.url).unwrap();
            for pair in sorted.windows(2) {
                let (ra, rb) = (article_rank(&pair[0]), article_rank(&pair[1]));
                prop_assert!(ra <= rb);
                if ra == rb {
                    prop_assert!(index_of(&pair[0]) < index_of(&pair[1]));
                }
            }
        }

        #[test]
        fn prop_groups_partition_input(orders in proptest::collection::vec(0i64..4, 0..20)) {
            let articles: Vec<Article> = orders
                .iter()
                .enumerate()
                .map(|(i, o)| in_section(&format!("https://example.com/{i}"), *o, &format!("S{o}")))
                .collect();

            let groups = group_by_section(&articles);
            let total: usize = groups.iter().map(|g| g.articles.len()).sum();
            prop_assert_eq!(total, articles.len());
            for group in &groups {
                prop_assert!(group.articles.iter().all(|a| group.matches(a)));
            }
        }
    }
}
