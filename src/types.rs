use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A news outlet with its own extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub name: String,
    pub base_url: String,
    pub created_at: DateTime<Utc>,
}

/// Where a candidate sat on the listing page when it was scraped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PagePosition {
    Top,
    Middle,
    Bottom,
    Unknown,
}

impl PagePosition {
    /// Classify an element by its index among `total` listing candidates.
    pub fn classify(index: usize, total: usize) -> Self {
        if index < 3 {
            PagePosition::Top
        } else if index < total / 2 {
            PagePosition::Middle
        } else {
            PagePosition::Bottom
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PagePosition::Top => "top",
            PagePosition::Middle => "middle",
            PagePosition::Bottom => "bottom",
            PagePosition::Unknown => "unknown",
        }
    }
}

impl std::str::FromStr for PagePosition {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        Ok(match s {
            "top" => PagePosition::Top,
            "middle" => PagePosition::Middle,
            "bottom" => PagePosition::Bottom,
            _ => PagePosition::Unknown,
        })
    }
}

/// One scraped listing element, validated enough to carry a title and URL
/// but not yet persisted.
#[derive(Debug, Clone)]
pub struct RawCandidate {
    pub title: String,
    pub url: String,
    pub raw_timestamp: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub position: PagePosition,
    pub full_text: Option<String>,
}

/// Result of one extraction pass over a listing page.
#[derive(Debug)]
pub struct ExtractedListing {
    pub candidates: Vec<RawCandidate>,
    /// Elements skipped because a mandatory field was missing or malformed.
    pub dropped: usize,
}

/// Whether a normalized timestamp came from an actual parse or from the
/// "now" fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeConfidence {
    Parsed,
    Defaulted,
}

/// A timestamp normalization result. Always carries an instant; callers
/// distinguish confident parses from defaults via the confidence flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedTime {
    pub instant: DateTime<Utc>,
    pub confidence: TimeConfidence,
}

/// A persisted, normalized news item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub source_id: Uuid,
    pub title: String,
    pub url: String,
    pub full_text: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub ingested_at: DateTime<Utc>,
    pub position: PagePosition,
    pub is_duplicate: bool,
}

impl Article {
    /// The text the similarity engine sees for this article.
    pub fn analysis_text(&self) -> String {
        match &self.full_text {
            Some(body) => format!("{} {}", self.title, body),
            None => self.title.clone(),
        }
    }
}

/// Fields supplied when persisting a new article; id and ingest time are
/// assigned by the repository.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub source_id: Uuid,
    pub title: String,
    pub url: String,
    pub full_text: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub position: PagePosition,
}

/// A cluster of articles believed to report the same underlying story.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryGroup {
    pub id: Uuid,
    pub main_title: String,
    pub created_at: DateTime<Utc>,
}

/// The fact that an article belongs to a story group, with the similarity
/// score that justified it. Founding members carry exactly 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub id: Uuid,
    pub group_id: Uuid,
    pub article_id: Uuid,
    pub score: f64,
    pub added_at: DateTime<Utc>,
}

/// Minutes elapsed between a group's earliest publish time and this
/// article's publish time. Written at most once per article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedMetric {
    pub article_id: Uuid,
    pub minutes: f64,
    pub computed_at: DateTime<Utc>,
}

/// Outcome of one crawl-source operation.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub source: String,
    pub scraped: usize,
    pub saved: usize,
    pub skipped_existing: usize,
    pub dropped: usize,
    pub errors: usize,
    pub new_article_ids: Vec<Uuid>,
}

/// Why the grouping policy opened a new singleton group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NewGroupReason {
    NoCandidates,
    NoUsableText,
    BelowThreshold,
    EngineFailure,
    UnresolvedGroup,
}

/// Terminal state of one analyze-article operation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    NotFound,
    AlreadyDuplicate,
    AlreadyGrouped {
        group_id: Uuid,
    },
    NewGroup {
        group_id: Uuid,
        reason: NewGroupReason,
        best_score: Option<f64>,
    },
    AddedToGroup {
        group_id: Uuid,
        score: f64,
        is_duplicate: bool,
    },
}

/// Analyze-article payload: the grouping outcome plus a sentiment reading
/// over the article text.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    #[serde(flatten)]
    pub outcome: AnalysisOutcome,
    pub sentiment: Option<crate::sentiment::SentimentScore>,
}

/// Outcome of one compute-speed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SpeedOutcome {
    /// Fewer than two timestamped members; nothing to measure.
    InsufficientData,
    Computed { metrics_recorded: usize },
}

/// Outcome of one explicit retention purge.
#[derive(Debug, Clone, Serialize)]
pub struct PurgeReport {
    pub articles_deleted: usize,
    pub groups_deleted: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid source config: {0}")]
    InvalidConfig(String),

    #[error("fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("similarity computation failed: {0}")]
    Similarity(String),

    #[error("article URL already ingested: {url}")]
    DuplicateUrl { url: String },
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
