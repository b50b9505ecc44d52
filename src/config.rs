use crate::types::{AnalyzerError, Result};
use chrono::FixedOffset;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;
use url::Url;

/// Tehran local time, assumed for every source that does not declare its
/// own offset.
const DEFAULT_UTC_OFFSET_MINUTES: i32 = 210;

/// CSS selectors for the fields of one listing candidate. At least one
/// selector must be present for the config to be usable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemSelectors {
    pub title: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub main_image: Option<String>,
    pub publication_timestamp: Option<String>,
    pub full_text: Option<String>,
}

impl ItemSelectors {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.url.is_none()
            && self.category.is_none()
            && self.main_image.is_none()
            && self.publication_timestamp.is_none()
            && self.full_text.is_none()
    }

    fn all(&self) -> impl Iterator<Item = (&'static str, &String)> {
        [
            ("title", self.title.as_ref()),
            ("url", self.url.as_ref()),
            ("category", self.category.as_ref()),
            ("main_image", self.main_image.as_ref()),
            ("publication_timestamp", self.publication_timestamp.as_ref()),
            ("full_text", self.full_text.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, sel)| sel.map(|s| (name, s)))
    }
}

/// Declarative scraping rules for one news source. Validated on load and
/// immutable afterwards; a config missing its name, base URL, or every item
/// selector is rejected rather than failing at point of use.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub base_url: String,
    /// Selects the candidate elements on the listing page. When omitted the
    /// whole page is treated as a single candidate scope.
    pub news_list_selector: Option<String>,
    pub news_item_selectors: ItemSelectors,
    /// The source's local timezone as minutes east of UTC.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_minutes: i32,
}

fn default_utc_offset() -> i32 {
    DEFAULT_UTC_OFFSET_MINUTES
}

impl SourceConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: SourceConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading source config from {}", path.display());
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Load every `*.json` config under a directory, sorted by file name so
    /// crawl order is stable.
    pub fn load_dir(dir: &Path) -> Result<Vec<Self>> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut configs = Vec::with_capacity(paths.len());
        for path in paths {
            configs.push(Self::load(&path)?);
        }
        Ok(configs)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AnalyzerError::InvalidConfig("name must not be empty".into()));
        }
        Url::parse(&self.base_url)
            .map_err(|e| AnalyzerError::InvalidConfig(format!("base_url: {e}")))?;
        if self.news_item_selectors.is_empty() {
            return Err(AnalyzerError::InvalidConfig(
                "news_item_selectors must contain at least one selector".into(),
            ));
        }
        if let Some(list) = &self.news_list_selector {
            check_selector("news_list_selector", list)?;
        }
        for (field, selector) in self.news_item_selectors.all() {
            check_selector(field, selector)?;
        }
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            AnalyzerError::InvalidConfig(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            ))
        })?;
        Ok(())
    }

    pub fn base(&self) -> Result<Url> {
        Ok(Url::parse(&self.base_url)?)
    }

    pub fn utc_offset(&self) -> FixedOffset {
        // Range-checked in validate().
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"))
    }
}

fn check_selector(field: &str, selector: &str) -> Result<()> {
    scraper::Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| AnalyzerError::InvalidConfig(format!("selector for {field}: {e}")))
}

/// HTTP client behavior for crawl passes.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "NewsAnalyzer/1.0".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_seconds: 5,
            max_redirects: 5,
        }
    }
}

/// Knobs for the similarity engine and grouping policy. Both thresholds are
/// configuration, not constants baked into the engine.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Minimum similarity to attach an article to an existing group.
    pub grouping_threshold: f64,
    /// Minimum similarity to additionally flag the article as a duplicate.
    pub duplicate_threshold: f64,
    /// How far back the candidate window reaches, in days.
    pub window_days: i64,
    /// Vocabulary cap for the TF-IDF vector space.
    pub max_vocabulary: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            grouping_threshold: 0.75,
            duplicate_threshold: 0.90,
            window_days: 7,
            max_vocabulary: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "name": "example",
        "base_url": "https://news.example.ir",
        "news_list_selector": "ul.news li",
        "news_item_selectors": {
            "title": "h3 a",
            "url": "h3 a",
            "publication_timestamp": "span.time"
        }
    }"#;

    #[test]
    fn valid_config_loads() {
        let config = SourceConfig::from_json(VALID).unwrap();
        assert_eq!(config.name, "example");
        assert_eq!(config.utc_offset_minutes, 210);
        assert_eq!(config.utc_offset().local_minus_utc(), 210 * 60);
    }

    #[test]
    fn missing_selectors_rejected_at_load() {
        let raw = r#"{
            "name": "example",
            "base_url": "https://news.example.ir",
            "news_item_selectors": {}
        }"#;
        let err = SourceConfig::from_json(raw).unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidConfig(_)));
    }

    #[test]
    fn bad_base_url_rejected_at_load() {
        let raw = r#"{
            "name": "example",
            "base_url": "not a url",
            "news_item_selectors": { "title": "h3" }
        }"#;
        assert!(SourceConfig::from_json(raw).is_err());
    }

    #[test]
    fn unparseable_selector_rejected_at_load() {
        let raw = r#"{
            "name": "example",
            "base_url": "https://news.example.ir",
            "news_item_selectors": { "title": "h3 [[[" }
        }"#;
        let err = SourceConfig::from_json(raw).unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidConfig(_)));
    }

    #[test]
    fn empty_name_rejected() {
        let raw = r#"{
            "name": "  ",
            "base_url": "https://news.example.ir",
            "news_item_selectors": { "title": "h3" }
        }"#;
        assert!(SourceConfig::from_json(raw).is_err());
    }
}
