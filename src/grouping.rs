use crate::config::AnalysisConfig;
use crate::repo::ArticleRepository;
use crate::similarity::{SimilarityEngine, SimilarityOutcome};
use crate::speed::compute_publication_speed;
use crate::types::{AnalysisOutcome, Article, NewGroupReason, Result};
use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

/// Founding members carry a full score in their membership edge.
const FOUNDING_SCORE: f64 = 1.0;

/// Decide where one article belongs: attach it to the best-matching story
/// group in the recent window, or open a new singleton group. Idempotent
/// over already-grouped articles, and every failure mode of the engine
/// degrades to a recorded new-group reason instead of losing the article.
pub async fn analyze_article(
    repo: &dyn ArticleRepository,
    engine: &SimilarityEngine,
    config: &AnalysisConfig,
    article_id: Uuid,
) -> Result<AnalysisOutcome> {
    let article = match repo.find_article(article_id).await? {
        Some(article) => article,
        None => return Ok(AnalysisOutcome::NotFound),
    };

    if article.is_duplicate {
        return Ok(AnalysisOutcome::AlreadyDuplicate);
    }
    if let Some(group) = repo.find_group_of_article(article.id).await? {
        return Ok(AnalysisOutcome::AlreadyGrouped { group_id: group.id });
    }

    let since = Utc::now() - Duration::days(config.window_days);
    let window: Vec<Article> = repo
        .find_recent_articles(since, true)
        .await?
        .into_iter()
        .filter(|candidate| candidate.id != article.id)
        .collect();

    if window.is_empty() {
        return new_group(repo, &article, NewGroupReason::NoCandidates, None).await;
    }

    let texts: Vec<String> = window.iter().map(Article::analysis_text).collect();
    let outcome = match engine.score(&article.analysis_text(), &texts) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Similarity engine failed for article {}: {e}", article.id);
            return new_group(repo, &article, NewGroupReason::EngineFailure, None).await;
        }
    };

    let (best, score) = match outcome {
        SimilarityOutcome::NoCandidates => {
            return new_group(repo, &article, NewGroupReason::NoCandidates, None).await;
        }
        SimilarityOutcome::NoUsableText => {
            return new_group(repo, &article, NewGroupReason::NoUsableText, None).await;
        }
        SimilarityOutcome::Best { index, score } => (&window[index], score),
    };

    if score < config.grouping_threshold {
        return new_group(repo, &article, NewGroupReason::BelowThreshold, Some(score)).await;
    }

    // Re-resolve the winner's group right before committing the edge. A
    // winner without a group violates the membership invariant; degrade to
    // a singleton group instead of failing the operation.
    let group = match repo.find_group_of_article(best.id).await? {
        Some(group) => group,
        None => {
            warn!(
                "Best match {} (score {score:.3}) belongs to no group",
                best.id
            );
            return new_group(repo, &article, NewGroupReason::UnresolvedGroup, Some(score)).await;
        }
    };
    repo.add_membership(group.id, article.id, score).await?;

    let is_duplicate = score >= config.duplicate_threshold;
    if is_duplicate {
        repo.set_duplicate_flag(article.id).await?;
        info!(
            "Article {} flagged duplicate of group {} (score {score:.3})",
            article.id, group.id
        );
    } else {
        info!(
            "Article {} added to group {} (score {score:.3})",
            article.id, group.id
        );
    }

    refresh_speed(repo, group.id).await;

    Ok(AnalysisOutcome::AddedToGroup {
        group_id: group.id,
        score,
        is_duplicate,
    })
}

/// Open a singleton group for the article and record why.
async fn new_group(
    repo: &dyn ArticleRepository,
    article: &Article,
    reason: NewGroupReason,
    best_score: Option<f64>,
) -> Result<AnalysisOutcome> {
    let group = repo.create_group(&article.title).await?;
    repo.add_membership(group.id, article.id, FOUNDING_SCORE)
        .await?;
    info!(
        "Article {} founded group {} ({reason:?})",
        article.id, group.id
    );
    refresh_speed(repo, group.id).await;
    Ok(AnalysisOutcome::NewGroup {
        group_id: group.id,
        reason,
        best_score,
    })
}

/// Speed metrics are best-effort bookkeeping after a grouping decision; a
/// failure here must not undo the decision.
async fn refresh_speed(repo: &dyn ArticleRepository, group_id: Uuid) {
    if let Err(e) = compute_publication_speed(repo, group_id).await {
        warn!("Speed computation failed for group {group_id}: {e}");
    }
}
