use crate::config::SourceConfig;
use crate::dates::TimestampNormalizer;
use crate::extractor::FieldExtractor;
use crate::fetcher::Fetcher;
use crate::repo::ArticleRepository;
use crate::types::{AnalyzerError, CrawlReport, NewArticle, Result, TimeConfidence};
use tracing::{info, warn};

/// One crawl pass for one source: extract listing candidates, normalize
/// their timestamps, and persist whatever is new. Existing URLs are skipped,
/// per-candidate failures are counted, and the pass itself only fails when
/// the listing page cannot be fetched at all.
pub async fn crawl_source(
    repo: &dyn ArticleRepository,
    fetcher: &Fetcher,
    config: &SourceConfig,
) -> Result<CrawlReport> {
    info!("Crawling source {}", config.name);

    let source = repo
        .find_or_create_source(&config.name, &config.base_url)
        .await?;

    let extractor = FieldExtractor::new(config, fetcher)?;
    let listing = extractor.extract().await?;
    let normalizer = TimestampNormalizer::new(config.utc_offset());

    let mut report = CrawlReport {
        source: config.name.clone(),
        scraped: listing.candidates.len(),
        saved: 0,
        skipped_existing: 0,
        dropped: listing.dropped,
        errors: 0,
        new_article_ids: Vec::new(),
    };

    for candidate in listing.candidates {
        if repo.find_article_by_url(&candidate.url).await?.is_some() {
            report.skipped_existing += 1;
            continue;
        }

        // Only an actual parse becomes a publish time. A defaulted "now"
        // would poison the speed metrics downstream.
        let published_at = candidate.raw_timestamp.as_deref().and_then(|raw| {
            let normalized = normalizer.normalize(raw);
            (normalized.confidence == TimeConfidence::Parsed).then_some(normalized.instant)
        });

        let new_article = NewArticle {
            source_id: source.id,
            title: candidate.title,
            url: candidate.url.clone(),
            full_text: candidate.full_text,
            published_at,
            position: candidate.position,
        };

        match repo.create_article(new_article).await {
            Ok(article) => {
                report.saved += 1;
                report.new_article_ids.push(article.id);
            }
            // Lost the race against a concurrent crawl of the same URL.
            Err(AnalyzerError::DuplicateUrl { .. }) => {
                report.skipped_existing += 1;
            }
            Err(e) => {
                warn!("Failed to save {}: {e}", candidate.url);
                report.errors += 1;
            }
        }
    }

    info!(
        "Crawl of {} done: {} scraped, {} saved, {} existing, {} dropped, {} errors",
        report.source,
        report.scraped,
        report.saved,
        report.skipped_existing,
        report.dropped,
        report.errors
    );
    Ok(report)
}
