use serde::{Deserialize, Serialize};

use crate::model::Section;

/// Article as returned by `/api/scrape`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawArticle {
    pub url: String,
    #[serde(default)]
    pub title: String,
    /// Issue date; may be a plain date or a timestamp.
    #[serde(default, alias = "issue_date")]
    pub date: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub section_title: Option<String>,
    #[serde(default)]
    pub section_emoji: Option<String>,
    #[serde(default)]
    pub section_order: Option<i64>,
    #[serde(default)]
    pub newsletter_type: Option<String>,
}

/// Issue as returned by `/api/scrape`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawIssue {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub newsletter_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// Counters reported by the scraper. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeStats {
    pub total_articles: u64,
    pub unique_urls: u64,
    pub dates_processed: u64,
    pub dates_with_content: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapeResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub articles: Vec<RawArticle>,
    #[serde(default)]
    pub issues: Vec<RawIssue>,
    #[serde(default)]
    pub stats: ScrapeStats,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScrapeRequest {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ContentRequest<'a> {
    pub url: &'a str,
    pub summary_effort: &'static str,
}

/// Body of `/api/summarize-url` and `/api/tldr-url` responses.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ContentResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub summary_markdown: Option<String>,
    #[serde(default)]
    pub tldr_markdown: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_response_tolerates_missing_fields() {
        let response: ScrapeResponse = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(response.success);
        assert!(response.articles.is_empty());
        assert_eq!(response.stats, ScrapeStats::default());
    }

    #[test]
    fn test_raw_article_accepts_issue_date_alias() {
        let article: RawArticle = serde_json::from_str(
            r#"{"url": "https://example.com/a", "title": "A", "issue_date": "2024-08-01"}"#,
        )
        .unwrap();
        assert_eq!(article.date, "2024-08-01");
    }
}
