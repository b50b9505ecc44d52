use crate::config::{AnalysisConfig, FetchConfig, SourceConfig};
use crate::fetcher::Fetcher;
use crate::grouping::analyze_article;
use crate::ingest::crawl_source;
use crate::repo::ArticleRepository;
use crate::sentiment::score_sentiment;
use crate::similarity::SimilarityEngine;
use crate::speed::compute_publication_speed;
use crate::text::TextPreprocessor;
use crate::types::{
    AnalysisOutcome, AnalysisReport, CrawlReport, PurgeReport, Result, SpeedOutcome,
};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Facade over the full pipeline: crawl sources, group and flag articles,
/// derive speed metrics, and enforce retention. Holds every service the
/// operations need so callers only wire a repository and two configs.
pub struct NewsAnalyzer {
    repo: Arc<dyn ArticleRepository>,
    fetcher: Fetcher,
    engine: SimilarityEngine,
    preprocessor: TextPreprocessor,
    config: AnalysisConfig,
}

impl NewsAnalyzer {
    pub fn new(
        repo: Arc<dyn ArticleRepository>,
        fetch_config: FetchConfig,
        config: AnalysisConfig,
    ) -> Result<Self> {
        let preprocessor = TextPreprocessor::new();
        let engine = SimilarityEngine::new(preprocessor.clone(), config.max_vocabulary);
        Ok(Self {
            repo,
            fetcher: Fetcher::new(fetch_config)?,
            engine,
            preprocessor,
            config,
        })
    }

    /// One crawl pass over one source.
    pub async fn crawl_source(&self, source: &SourceConfig) -> Result<CrawlReport> {
        crawl_source(self.repo.as_ref(), &self.fetcher, source).await
    }

    /// Crawl every configured source under `config_dir`. One source failing
    /// never stops the others; failures are logged and skipped.
    pub async fn crawl_all(&self, config_dir: &Path) -> Result<Vec<CrawlReport>> {
        let configs = SourceConfig::load_dir(config_dir)?;
        info!("Crawling {} sources from {}", configs.len(), config_dir.display());

        let mut reports = Vec::with_capacity(configs.len());
        for config in &configs {
            match self.crawl_source(config).await {
                Ok(report) => reports.push(report),
                Err(e) => error!("Crawl of {} failed: {e}", config.name),
            }
        }
        Ok(reports)
    }

    /// Group one article and score its sentiment.
    pub async fn analyze_article(&self, article_id: Uuid) -> Result<AnalysisReport> {
        let outcome =
            analyze_article(self.repo.as_ref(), &self.engine, &self.config, article_id).await?;

        let sentiment = match &outcome {
            AnalysisOutcome::NotFound => None,
            _ => self
                .repo
                .find_article(article_id)
                .await?
                .map(|article| score_sentiment(&self.preprocessor, &article.analysis_text())),
        };

        Ok(AnalysisReport { outcome, sentiment })
    }

    /// Crawl one source, then analyze everything the crawl saved.
    pub async fn crawl_and_analyze(
        &self,
        source: &SourceConfig,
    ) -> Result<(CrawlReport, Vec<AnalysisReport>)> {
        let report = self.crawl_source(source).await?;
        let mut analyses = Vec::with_capacity(report.new_article_ids.len());
        for article_id in &report.new_article_ids {
            analyses.push(self.analyze_article(*article_id).await?);
        }
        Ok((report, analyses))
    }

    pub async fn compute_speed(&self, group_id: Uuid) -> Result<SpeedOutcome> {
        compute_publication_speed(self.repo.as_ref(), group_id).await
    }

    pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<PurgeReport> {
        self.repo.purge_articles_before(cutoff).await
    }
}
