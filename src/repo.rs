use crate::types::{
    AnalyzerError, Article, Membership, NewArticle, PagePosition, PurgeReport, Result, Source,
    SpeedMetric, StoryGroup,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Narrow persistence interface the core reads and writes through. Each
/// call is atomic at the single-record level; the core performs no
/// multi-statement transactions across components.
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn find_or_create_source(&self, name: &str, base_url: &str) -> Result<Source>;

    async fn find_article(&self, id: Uuid) -> Result<Option<Article>>;

    async fn find_article_by_url(&self, url: &str) -> Result<Option<Article>>;

    /// Persist a new article. URL uniqueness is enforced here: a second
    /// insert for a known URL fails with `DuplicateUrl` and never creates
    /// a second record.
    async fn create_article(&self, article: NewArticle) -> Result<Article>;

    /// Articles ingested since `since`, oldest first, optionally excluding
    /// flagged duplicates.
    async fn find_recent_articles(
        &self,
        since: DateTime<Utc>,
        excluding_duplicates: bool,
    ) -> Result<Vec<Article>>;

    async fn find_group_of_article(&self, article_id: Uuid) -> Result<Option<StoryGroup>>;

    async fn create_group(&self, main_title: &str) -> Result<StoryGroup>;

    /// Attach an article to a group. Re-adding an existing (group, article)
    /// pair returns the existing membership unchanged.
    async fn add_membership(
        &self,
        group_id: Uuid,
        article_id: Uuid,
        score: f64,
    ) -> Result<Membership>;

    /// One-way: the flag is only ever set, never cleared.
    async fn set_duplicate_flag(&self, article_id: Uuid) -> Result<()>;

    /// Group members that have a known publish time, earliest first.
    async fn find_group_members_with_publish_time(&self, group_id: Uuid) -> Result<Vec<Article>>;

    async fn has_speed_metric(&self, article_id: Uuid) -> Result<bool>;

    /// Record a speed metric once; re-recording for the same article is a
    /// no-op.
    async fn record_speed_metric(&self, article_id: Uuid, minutes: f64) -> Result<()>;

    /// Explicit retention: delete articles ingested before `cutoff`
    /// together with their memberships and metrics, then drop groups left
    /// without members. No implicit cascade anywhere else.
    async fn purge_articles_before(&self, cutoff: DateTime<Utc>) -> Result<PurgeReport>;
}

/// PostgreSQL-backed repository.
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn article_from_row(row: &PgRow) -> Result<Article> {
    let position: String = row.try_get("position")?;
    Ok(Article {
        id: row.try_get("id")?,
        source_id: row.try_get("source_id")?,
        title: row.try_get("title")?,
        url: row.try_get("url")?,
        full_text: row.try_get("full_text")?,
        published_at: row.try_get("published_at")?,
        ingested_at: row.try_get("ingested_at")?,
        position: position.parse().unwrap_or(PagePosition::Unknown),
        is_duplicate: row.try_get("is_duplicate")?,
    })
}

fn group_from_row(row: &PgRow) -> Result<StoryGroup> {
    Ok(StoryGroup {
        id: row.try_get("id")?,
        main_title: row.try_get("main_title")?,
        created_at: row.try_get("created_at")?,
    })
}

fn membership_from_row(row: &PgRow) -> Result<Membership> {
    Ok(Membership {
        id: row.try_get("id")?,
        group_id: row.try_get("group_id")?,
        article_id: row.try_get("article_id")?,
        score: row.try_get("score")?,
        added_at: row.try_get("added_at")?,
    })
}

#[async_trait]
impl ArticleRepository for PgRepository {
    async fn find_or_create_source(&self, name: &str, base_url: &str) -> Result<Source> {
        sqlx::query(
            r#"
            INSERT INTO sources (id, name, base_url, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(base_url)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT * FROM sources WHERE name = $1")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(Source {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            base_url: row.try_get("base_url")?,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn find_article(&self, id: Uuid) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(article_from_row).transpose()
    }

    async fn find_article_by_url(&self, url: &str) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE url = $1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(article_from_row).transpose()
    }

    async fn create_article(&self, article: NewArticle) -> Result<Article> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO articles
                (id, source_id, title, url, full_text, published_at,
                 ingested_at, position, is_duplicate)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE)
            ON CONFLICT (url) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(article.source_id)
        .bind(&article.title)
        .bind(&article.url)
        .bind(&article.full_text)
        .bind(article.published_at)
        .bind(now)
        .bind(article.position.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AnalyzerError::DuplicateUrl { url: article.url });
        }

        Ok(Article {
            id,
            source_id: article.source_id,
            title: article.title,
            url: article.url,
            full_text: article.full_text,
            published_at: article.published_at,
            ingested_at: now,
            position: article.position,
            is_duplicate: false,
        })
    }

    async fn find_recent_articles(
        &self,
        since: DateTime<Utc>,
        excluding_duplicates: bool,
    ) -> Result<Vec<Article>> {
        let query = if excluding_duplicates {
            "SELECT * FROM articles \
             WHERE ingested_at >= $1 AND is_duplicate = FALSE \
             ORDER BY ingested_at ASC"
        } else {
            "SELECT * FROM articles WHERE ingested_at >= $1 ORDER BY ingested_at ASC"
        };
        let rows = sqlx::query(query).bind(since).fetch_all(&self.pool).await?;
        rows.iter().map(article_from_row).collect()
    }

    async fn find_group_of_article(&self, article_id: Uuid) -> Result<Option<StoryGroup>> {
        let row = sqlx::query(
            r#"
            SELECT g.* FROM story_groups g
            JOIN memberships m ON m.group_id = g.id
            WHERE m.article_id = $1
            LIMIT 1
            "#,
        )
        .bind(article_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(group_from_row).transpose()
    }

    async fn create_group(&self, main_title: &str) -> Result<StoryGroup> {
        let group = StoryGroup {
            id: Uuid::new_v4(),
            main_title: main_title.to_string(),
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO story_groups (id, main_title, created_at) VALUES ($1, $2, $3)",
        )
        .bind(group.id)
        .bind(&group.main_title)
        .bind(group.created_at)
        .execute(&self.pool)
        .await?;
        debug!("Created story group {} for {:?}", group.id, group.main_title);
        Ok(group)
    }

    async fn add_membership(
        &self,
        group_id: Uuid,
        article_id: Uuid,
        score: f64,
    ) -> Result<Membership> {
        let membership = Membership {
            id: Uuid::new_v4(),
            group_id,
            article_id,
            score,
            added_at: Utc::now(),
        };
        let result = sqlx::query(
            r#"
            INSERT INTO memberships (id, group_id, article_id, score, added_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (group_id, article_id) DO NOTHING
            "#,
        )
        .bind(membership.id)
        .bind(group_id)
        .bind(article_id)
        .bind(score)
        .bind(membership.added_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(membership);
        }
        // The pair already exists; hand back the stored edge unchanged.
        let row = sqlx::query(
            "SELECT * FROM memberships WHERE group_id = $1 AND article_id = $2",
        )
        .bind(group_id)
        .bind(article_id)
        .fetch_one(&self.pool)
        .await?;
        membership_from_row(&row)
    }

    async fn set_duplicate_flag(&self, article_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE articles SET is_duplicate = TRUE WHERE id = $1")
            .bind(article_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_group_members_with_publish_time(&self, group_id: Uuid) -> Result<Vec<Article>> {
        let rows = sqlx::query(
            r#"
            SELECT a.* FROM articles a
            JOIN memberships m ON m.article_id = a.id
            WHERE m.group_id = $1 AND a.published_at IS NOT NULL
            ORDER BY a.published_at ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(article_from_row).collect()
    }

    async fn has_speed_metric(&self, article_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM speed_metrics WHERE article_id = $1)",
        )
        .bind(article_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn record_speed_metric(&self, article_id: Uuid, minutes: f64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO speed_metrics (article_id, minutes, computed_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (article_id) DO NOTHING
            "#,
        )
        .bind(article_id)
        .bind(minutes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn purge_articles_before(&self, cutoff: DateTime<Utc>) -> Result<PurgeReport> {
        sqlx::query(
            "DELETE FROM speed_metrics WHERE article_id IN \
             (SELECT id FROM articles WHERE ingested_at < $1)",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "DELETE FROM memberships WHERE article_id IN \
             (SELECT id FROM articles WHERE ingested_at < $1)",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        let articles = sqlx::query("DELETE FROM articles WHERE ingested_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        let groups = sqlx::query(
            "DELETE FROM story_groups WHERE id NOT IN \
             (SELECT DISTINCT group_id FROM memberships)",
        )
        .execute(&self.pool)
        .await?;

        let report = PurgeReport {
            articles_deleted: articles.rows_affected() as usize,
            groups_deleted: groups.rows_affected() as usize,
        };
        info!(
            "Purged {} articles and {} empty groups before {}",
            report.articles_deleted, report.groups_deleted, cutoff
        );
        Ok(report)
    }
}

#[derive(Default)]
struct MemoryState {
    sources: Vec<Source>,
    articles: Vec<Article>,
    groups: Vec<StoryGroup>,
    memberships: Vec<Membership>,
    metrics: Vec<SpeedMetric>,
}

/// In-memory repository with the same uniqueness guarantees as the
/// Postgres one. Used by tests and offline runs.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> T {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        f(&mut state)
    }

    /// Test hook: number of stored speed metrics.
    pub fn speed_metric_count(&self) -> usize {
        self.with_state(|s| s.metrics.len())
    }

    /// Test hook: the recorded metric for one article, if any.
    pub fn speed_metric_minutes(&self, article_id: Uuid) -> Option<f64> {
        self.with_state(|s| {
            s.metrics
                .iter()
                .find(|m| m.article_id == article_id)
                .map(|m| m.minutes)
        })
    }

    /// Test hook: all memberships of a group, in insertion order.
    pub fn memberships_of(&self, group_id: Uuid) -> Vec<Membership> {
        self.with_state(|s| {
            s.memberships
                .iter()
                .filter(|m| m.group_id == group_id)
                .cloned()
                .collect()
        })
    }

    /// Test hook: total group count.
    pub fn group_count(&self) -> usize {
        self.with_state(|s| s.groups.len())
    }
}

#[async_trait]
impl ArticleRepository for MemoryRepository {
    async fn find_or_create_source(&self, name: &str, base_url: &str) -> Result<Source> {
        self.with_state(|s| {
            if let Some(existing) = s.sources.iter().find(|src| src.name == name) {
                return Ok(existing.clone());
            }
            let source = Source {
                id: Uuid::new_v4(),
                name: name.to_string(),
                base_url: base_url.to_string(),
                created_at: Utc::now(),
            };
            s.sources.push(source.clone());
            Ok(source)
        })
    }

    async fn find_article(&self, id: Uuid) -> Result<Option<Article>> {
        self.with_state(|s| Ok(s.articles.iter().find(|a| a.id == id).cloned()))
    }

    async fn find_article_by_url(&self, url: &str) -> Result<Option<Article>> {
        self.with_state(|s| Ok(s.articles.iter().find(|a| a.url == url).cloned()))
    }

    async fn create_article(&self, article: NewArticle) -> Result<Article> {
        self.with_state(|s| {
            if s.articles.iter().any(|a| a.url == article.url) {
                return Err(AnalyzerError::DuplicateUrl { url: article.url });
            }
            let stored = Article {
                id: Uuid::new_v4(),
                source_id: article.source_id,
                title: article.title,
                url: article.url,
                full_text: article.full_text,
                published_at: article.published_at,
                ingested_at: Utc::now(),
                position: article.position,
                is_duplicate: false,
            };
            s.articles.push(stored.clone());
            Ok(stored)
        })
    }

    async fn find_recent_articles(
        &self,
        since: DateTime<Utc>,
        excluding_duplicates: bool,
    ) -> Result<Vec<Article>> {
        self.with_state(|s| {
            Ok(s.articles
                .iter()
                .filter(|a| a.ingested_at >= since)
                .filter(|a| !excluding_duplicates || !a.is_duplicate)
                .cloned()
                .collect())
        })
    }

    async fn find_group_of_article(&self, article_id: Uuid) -> Result<Option<StoryGroup>> {
        self.with_state(|s| {
            let group_id = s
                .memberships
                .iter()
                .find(|m| m.article_id == article_id)
                .map(|m| m.group_id);
            Ok(group_id.and_then(|gid| s.groups.iter().find(|g| g.id == gid).cloned()))
        })
    }

    async fn create_group(&self, main_title: &str) -> Result<StoryGroup> {
        self.with_state(|s| {
            let group = StoryGroup {
                id: Uuid::new_v4(),
                main_title: main_title.to_string(),
                created_at: Utc::now(),
            };
            s.groups.push(group.clone());
            Ok(group)
        })
    }

    async fn add_membership(
        &self,
        group_id: Uuid,
        article_id: Uuid,
        score: f64,
    ) -> Result<Membership> {
        self.with_state(|s| {
            if let Some(existing) = s
                .memberships
                .iter()
                .find(|m| m.group_id == group_id && m.article_id == article_id)
            {
                return Ok(existing.clone());
            }
            let membership = Membership {
                id: Uuid::new_v4(),
                group_id,
                article_id,
                score,
                added_at: Utc::now(),
            };
            s.memberships.push(membership.clone());
            Ok(membership)
        })
    }

    async fn set_duplicate_flag(&self, article_id: Uuid) -> Result<()> {
        self.with_state(|s| {
            if let Some(article) = s.articles.iter_mut().find(|a| a.id == article_id) {
                article.is_duplicate = true;
            }
            Ok(())
        })
    }

    async fn find_group_members_with_publish_time(&self, group_id: Uuid) -> Result<Vec<Article>> {
        self.with_state(|s| {
            let mut members: Vec<Article> = s
                .memberships
                .iter()
                .filter(|m| m.group_id == group_id)
                .filter_map(|m| s.articles.iter().find(|a| a.id == m.article_id))
                .filter(|a| a.published_at.is_some())
                .cloned()
                .collect();
            members.sort_by_key(|a| a.published_at);
            Ok(members)
        })
    }

    async fn has_speed_metric(&self, article_id: Uuid) -> Result<bool> {
        self.with_state(|s| Ok(s.metrics.iter().any(|m| m.article_id == article_id)))
    }

    async fn record_speed_metric(&self, article_id: Uuid, minutes: f64) -> Result<()> {
        self.with_state(|s| {
            if !s.metrics.iter().any(|m| m.article_id == article_id) {
                s.metrics.push(SpeedMetric {
                    article_id,
                    minutes,
                    computed_at: Utc::now(),
                });
            }
            Ok(())
        })
    }

    async fn purge_articles_before(&self, cutoff: DateTime<Utc>) -> Result<PurgeReport> {
        self.with_state(|s| {
            let doomed: Vec<Uuid> = s
                .articles
                .iter()
                .filter(|a| a.ingested_at < cutoff)
                .map(|a| a.id)
                .collect();

            s.metrics.retain(|m| !doomed.contains(&m.article_id));
            s.memberships.retain(|m| !doomed.contains(&m.article_id));
            s.articles.retain(|a| !doomed.contains(&a.id));

            let before = s.groups.len();
            let memberships = &s.memberships;
            s.groups
                .retain(|g| memberships.iter().any(|m| m.group_id == g.id));

            Ok(PurgeReport {
                articles_deleted: doomed.len(),
                groups_deleted: before - s.groups.len(),
            })
        })
    }
}
