use chrono::{DateTime, Duration, Utc};
use news_analyzer::config::AnalysisConfig;
use news_analyzer::grouping::analyze_article;
use news_analyzer::repo::{ArticleRepository, MemoryRepository};
use news_analyzer::speed::compute_publication_speed;
use news_analyzer::types::{
    AnalysisOutcome, AnalyzerError, NewArticle, NewGroupReason, PagePosition, SpeedOutcome,
};
use news_analyzer::{SimilarityEngine, TextPreprocessor};
use uuid::Uuid;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn engine() -> SimilarityEngine {
    SimilarityEngine::new(TextPreprocessor::new(), 1000)
}

async fn seed_article(
    repo: &MemoryRepository,
    title: &str,
    published_at: Option<DateTime<Utc>>,
) -> Uuid {
    let source = repo
        .find_or_create_source("wire", "https://news.example.ir")
        .await
        .unwrap();
    let article = repo
        .create_article(NewArticle {
            source_id: source.id,
            title: title.to_string(),
            url: format!("https://news.example.ir/{}", Uuid::new_v4()),
            full_text: None,
            published_at,
            position: PagePosition::Top,
        })
        .await
        .unwrap();
    article.id
}

#[tokio::test]
async fn first_article_founds_a_group() {
    init_tracing();
    let repo = MemoryRepository::new();
    let config = AnalysisConfig::default();

    let id = seed_article(&repo, "central bank raises interest rates", None).await;
    let outcome = analyze_article(&repo, &engine(), &config, id).await.unwrap();

    match outcome {
        AnalysisOutcome::NewGroup {
            group_id,
            reason,
            best_score,
        } => {
            assert_eq!(reason, NewGroupReason::NoCandidates);
            assert!(best_score.is_none());
            // Founding membership carries exactly 1.0.
            let members = repo.memberships_of(group_id);
            assert_eq!(members.len(), 1);
            assert_eq!(members[0].article_id, id);
            assert_eq!(members[0].score, 1.0);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn similar_headline_joins_the_group_without_duplicate_flag() {
    init_tracing();
    let repo = MemoryRepository::new();
    let config = AnalysisConfig::default();
    let engine = engine();

    let first = seed_article(
        &repo,
        "central bank raises interest rates amid inflation concerns",
        None,
    )
    .await;
    let second = seed_article(
        &repo,
        "central bank raises interest rates amid inflation worries",
        None,
    )
    .await;

    analyze_article(&repo, &engine, &config, first).await.unwrap();
    let outcome = analyze_article(&repo, &engine, &config, second)
        .await
        .unwrap();

    match outcome {
        AnalysisOutcome::AddedToGroup {
            group_id,
            score,
            is_duplicate,
        } => {
            assert!(
                score >= config.grouping_threshold && score < config.duplicate_threshold,
                "score {score}"
            );
            assert!(!is_duplicate);
            assert_eq!(repo.memberships_of(group_id).len(), 2);
            assert!(!repo.find_article(second).await.unwrap().unwrap().is_duplicate);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(repo.group_count(), 1);
}

#[tokio::test]
async fn identical_headline_is_flagged_duplicate() {
    init_tracing();
    let repo = MemoryRepository::new();
    let config = AnalysisConfig::default();
    let engine = engine();

    let title = "دولت لایحه بودجه سال آینده را تقدیم مجلس کرد";
    let first = seed_article(&repo, title, None).await;
    let second = seed_article(&repo, title, None).await;

    analyze_article(&repo, &engine, &config, first).await.unwrap();
    let outcome = analyze_article(&repo, &engine, &config, second)
        .await
        .unwrap();

    match outcome {
        AnalysisOutcome::AddedToGroup {
            score, is_duplicate, ..
        } => {
            assert!(score >= config.duplicate_threshold, "score {score}");
            assert!(is_duplicate);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(repo.find_article(second).await.unwrap().unwrap().is_duplicate);

    // The flag is terminal: re-analysis short-circuits.
    let again = analyze_article(&repo, &engine, &config, second)
        .await
        .unwrap();
    assert!(matches!(again, AnalysisOutcome::AlreadyDuplicate));
}

#[tokio::test]
async fn duplicates_leave_the_candidate_window() {
    init_tracing();
    let repo = MemoryRepository::new();
    let config = AnalysisConfig::default();
    let engine = engine();

    let title = "parliament approves national budget bill tonight";
    let first = seed_article(&repo, title, None).await;
    let second = seed_article(&repo, title, None).await;
    let third = seed_article(&repo, title, None).await;

    analyze_article(&repo, &engine, &config, first).await.unwrap();
    analyze_article(&repo, &engine, &config, second).await.unwrap();
    let outcome = analyze_article(&repo, &engine, &config, third)
        .await
        .unwrap();

    // The second article is now a flagged duplicate, so the third can only
    // have matched the first; everything lands in one group.
    match outcome {
        AnalysisOutcome::AddedToGroup {
            group_id,
            is_duplicate,
            ..
        } => {
            assert!(is_duplicate);
            assert_eq!(repo.memberships_of(group_id).len(), 3);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(repo.group_count(), 1);
}

#[tokio::test]
async fn analysis_is_idempotent_for_grouped_articles() {
    init_tracing();
    let repo = MemoryRepository::new();
    let config = AnalysisConfig::default();
    let engine = engine();

    let id = seed_article(&repo, "tehran stock exchange index climbs", None).await;
    let first = analyze_article(&repo, &engine, &config, id).await.unwrap();
    let group_id = match first {
        AnalysisOutcome::NewGroup { group_id, .. } => group_id,
        other => panic!("unexpected outcome {other:?}"),
    };

    let again = analyze_article(&repo, &engine, &config, id).await.unwrap();
    match again {
        AnalysisOutcome::AlreadyGrouped { group_id: existing } => {
            assert_eq!(existing, group_id)
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(repo.group_count(), 1);
}

#[tokio::test]
async fn unknown_article_reports_not_found() {
    init_tracing();
    let repo = MemoryRepository::new();
    let outcome = analyze_article(&repo, &engine(), &AnalysisConfig::default(), Uuid::new_v4())
        .await
        .unwrap();
    assert!(matches!(outcome, AnalysisOutcome::NotFound));
}

#[tokio::test]
async fn dissimilar_article_founds_its_own_group_with_score() {
    init_tracing();
    let repo = MemoryRepository::new();
    let config = AnalysisConfig::default();
    let engine = engine();

    let first = seed_article(&repo, "central bank raises interest rates", None).await;
    let second = seed_article(&repo, "football championship final results", None).await;

    analyze_article(&repo, &engine, &config, first).await.unwrap();
    let outcome = analyze_article(&repo, &engine, &config, second)
        .await
        .unwrap();

    match outcome {
        AnalysisOutcome::NewGroup {
            reason, best_score, ..
        } => {
            assert_eq!(reason, NewGroupReason::BelowThreshold);
            let score = best_score.expect("score retained for diagnostics");
            assert!(score < config.grouping_threshold, "score {score}");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(repo.group_count(), 2);
}

#[tokio::test]
async fn repeated_urls_are_rejected() {
    init_tracing();
    let repo = MemoryRepository::new();
    let source = repo
        .find_or_create_source("wire", "https://news.example.ir")
        .await
        .unwrap();

    let article = NewArticle {
        source_id: source.id,
        title: "first report".to_string(),
        url: "https://news.example.ir/news/1".to_string(),
        full_text: None,
        published_at: None,
        position: PagePosition::Top,
    };
    repo.create_article(article.clone()).await.unwrap();

    let err = repo.create_article(article).await.unwrap_err();
    assert!(matches!(err, AnalyzerError::DuplicateUrl { .. }));
    assert_eq!(
        repo.find_recent_articles(Utc::now() - Duration::hours(1), false)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn speed_measures_minutes_from_the_earliest_publish() {
    init_tracing();
    let repo = MemoryRepository::new();

    let t0 = Utc::now() - Duration::hours(3);
    let early = seed_article(&repo, "report breaks first", Some(t0)).await;
    let late = seed_article(
        &repo,
        "report follows later",
        Some(t0 + Duration::minutes(47)),
    )
    .await;

    let group = repo.create_group("report breaks first").await.unwrap();
    repo.add_membership(group.id, early, 1.0).await.unwrap();
    repo.add_membership(group.id, late, 0.8).await.unwrap();

    let outcome = compute_publication_speed(&repo, group.id).await.unwrap();
    assert_eq!(
        outcome,
        SpeedOutcome::Computed {
            metrics_recorded: 1
        }
    );
    // The earliest member is the baseline and gets no metric itself.
    assert_eq!(repo.speed_metric_minutes(early), None);
    assert_eq!(repo.speed_metric_minutes(late), Some(47.0));

    // Each article is measured at most once.
    let again = compute_publication_speed(&repo, group.id).await.unwrap();
    assert_eq!(
        again,
        SpeedOutcome::Computed {
            metrics_recorded: 0
        }
    );
    assert_eq!(repo.speed_metric_count(), 1);
}

#[tokio::test]
async fn speed_needs_two_timestamped_members() {
    init_tracing();
    let repo = MemoryRepository::new();

    let timestamped = seed_article(&repo, "only dated report", Some(Utc::now())).await;
    let undated = seed_article(&repo, "undated report", None).await;

    let group = repo.create_group("only dated report").await.unwrap();
    repo.add_membership(group.id, timestamped, 1.0).await.unwrap();
    repo.add_membership(group.id, undated, 0.8).await.unwrap();

    let outcome = compute_publication_speed(&repo, group.id).await.unwrap();
    assert_eq!(outcome, SpeedOutcome::InsufficientData);
    assert_eq!(repo.speed_metric_count(), 0);
}

#[tokio::test]
async fn purge_removes_articles_and_empty_groups() {
    init_tracing();
    let repo = MemoryRepository::new();
    let config = AnalysisConfig::default();
    let engine = engine();

    let id = seed_article(&repo, "story to be retired", None).await;
    analyze_article(&repo, &engine, &config, id).await.unwrap();
    assert_eq!(repo.group_count(), 1);

    // Nothing is old enough yet.
    let untouched = repo
        .purge_articles_before(Utc::now() - Duration::days(30))
        .await
        .unwrap();
    assert_eq!(untouched.articles_deleted, 0);
    assert_eq!(untouched.groups_deleted, 0);

    // A cutoff past the ingest time takes the article and its group.
    let report = repo
        .purge_articles_before(Utc::now() + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(report.articles_deleted, 1);
    assert_eq!(report.groups_deleted, 1);
    assert!(repo.find_article(id).await.unwrap().is_none());
}
