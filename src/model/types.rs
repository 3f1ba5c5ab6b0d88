use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Content State
// ============================================================================

/// Fetch lifecycle of an on-demand content block (summary or TLDR).
///
/// The loading state is persisted as `"creating"` so payloads written by the
/// browser builds remain readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    #[default]
    Unknown,
    #[serde(rename = "creating")]
    Loading,
    Available,
    Error,
}

/// Reasoning effort requested from the summarizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Minimal,
    #[default]
    Low,
    Medium,
    High,
}

impl Effort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effort::Minimal => "minimal",
            Effort::Low => "low",
            Effort::Medium => "medium",
            Effort::High => "high",
        }
    }
}

impl fmt::Display for Effort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Effort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimal" => Ok(Effort::Minimal),
            "low" => Ok(Effort::Low),
            "medium" => Ok(Effort::Medium),
            "high" => Ok(Effort::High),
            other => Err(format!("unknown effort level: {other}")),
        }
    }
}

/// Which on-demand content block of an article is being addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Summary,
    Tldr,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Summary => f.write_str("summary"),
            ContentKind::Tldr => f.write_str("tldr"),
        }
    }
}

/// Persisted state of a summary or TLDR.
///
/// Invariants: `Available` carries non-empty markdown; `Error` carries an
/// error message and empty markdown.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentState {
    pub status: ContentStatus,
    pub markdown: String,
    pub effort: Effort,
    pub checked_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl ContentState {
    pub fn is_available(&self) -> bool {
        self.status == ContentStatus::Available && !self.markdown.is_empty()
    }
}

// ============================================================================
// Articles
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReadState {
    pub is_read: bool,
    pub marked_at: Option<DateTime<Utc>>,
}

impl ReadState {
    pub fn marked(now: DateTime<Utc>) -> Self {
        Self {
            is_read: true,
            marked_at: Some(now),
        }
    }

    pub fn cleared() -> Self {
        Self::default()
    }
}

/// One scraped article. `url` is its identity within a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub url: String,
    pub title: String,
    pub issue_date: NaiveDate,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub section_emoji: Option<String>,
    #[serde(default)]
    pub section_order: Option<i64>,
    #[serde(default)]
    pub newsletter_type: Option<String>,
    #[serde(default)]
    pub removed: bool,
    #[serde(default)]
    pub read: ReadState,
    #[serde(default)]
    pub summary: ContentState,
    #[serde(default)]
    pub tldr: ContentState,
}

impl Article {
    pub fn content(&self, kind: ContentKind) -> &ContentState {
        match kind {
            ContentKind::Summary => &self.summary,
            ContentKind::Tldr => &self.tldr,
        }
    }

    pub fn content_mut(&mut self, kind: ContentKind) -> &mut ContentState {
        match kind {
            ContentKind::Summary => &mut self.summary,
            ContentKind::Tldr => &mut self.tldr,
        }
    }
}

// ============================================================================
// Issues
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub order: i64,
    pub title: String,
    #[serde(default)]
    pub emoji: Option<String>,
}

/// One newsletter issue within a day. `category` is its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
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

// ============================================================================
// Day Payload
// ============================================================================

/// Persisted bundle of issues and articles for one calendar date.
///
/// Every article's `issue_date` equals `date`; `date` never changes once the
/// payload exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPayload {
    pub date: NaiveDate,
    pub cached_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub articles: Vec<Article>,
}

impl DayPayload {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            cached_at: None,
            issues: Vec::new(),
            articles: Vec::new(),
        }
    }

    pub fn article(&self, url: &str) -> Option<&Article> {
        self.articles.iter().find(|a| a.url == url)
    }

    pub fn article_mut(&mut self, url: &str) -> Option<&mut Article> {
        self.articles.iter_mut().find(|a| a.url == url)
    }
}
