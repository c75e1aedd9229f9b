//! Article persistence: Postgres in production, in-memory for tests and for
//! running without a database.
//!
//! Both implementations share the same contract:
//!   - `upsert` is idempotent by `article_url`; a second insert of the same URL
//!     returns `None` and leaves categories untouched.
//!   - `list` returns distinct articles carrying any of the given categories (all
//!     articles when none are given), newest `published_date` first, undated last.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::debug;

use crate::models::article::{ArticleRow, NewArticle};

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Inserts the article and its categories. `None` when the URL is already stored.
    async fn upsert(&self, article: &NewArticle) -> Result<Option<i64>, sqlx::Error>;

    async fn exists(&self, article_url: &str) -> Result<bool, sqlx::Error>;

    async fn list(&self, interests: &[String], limit: usize) -> Result<Vec<ArticleRow>, sqlx::Error>;

    async fn count(&self) -> Result<i64, sqlx::Error>;
}

// ── Postgres ─────────────────────────────────────────────────────────────────

pub struct PgArticleStore {
    pool: PgPool,
}

impl PgArticleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn upsert(&self, article: &NewArticle) -> Result<Option<i64>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO articles
                (title, summary, image_url, article_url, source_name, published_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (article_url) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&article.title)
        .bind(&article.summary)
        .bind(&article.image_url)
        .bind(&article.article_url)
        .bind(&article.source_name)
        .bind(article.published_date)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(article_id) = id {
            for category in &article.categories {
                sqlx::query(
                    "INSERT INTO article_categories (article_id, category) VALUES ($1, $2) ON CONFLICT DO NOTHING",
                )
                .bind(article_id)
                .bind(category)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(id)
    }

    async fn exists(&self, article_url: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM articles WHERE article_url = $1)")
            .bind(article_url)
            .fetch_one(&self.pool)
            .await
    }

    async fn list(&self, interests: &[String], limit: usize) -> Result<Vec<ArticleRow>, sqlx::Error> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT a.id, a.title, a.summary, a.image_url, a.article_url, a.source_name,
                   a.published_date, a.created_at,
                   COALESCE(
                       ARRAY_AGG(ac.category ORDER BY ac.category)
                           FILTER (WHERE ac.category IS NOT NULL),
                       '{}'::TEXT[]
                   ) AS categories
            FROM articles a
            LEFT JOIN article_categories ac ON ac.article_id = a.id
            WHERE cardinality($1::TEXT[]) = 0
               OR EXISTS (
                   SELECT 1 FROM article_categories f
                   WHERE f.article_id = a.id AND f.category = ANY($1)
               )
            GROUP BY a.id
            ORDER BY a.published_date DESC NULLS LAST, a.id DESC
            LIMIT $2
            "#,
        )
        .bind(interests.to_vec())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await
    }
}

// ── In-memory ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryArticleStore {
    rows: Mutex<Vec<ArticleRow>>,
}

impl MemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleStore for MemoryArticleStore {
    async fn upsert(&self, article: &NewArticle) -> Result<Option<i64>, sqlx::Error> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        if rows.iter().any(|r| r.article_url == article.article_url) {
            debug!("Skipping existing article {}", article.article_url);
            return Ok(None);
        }

        let mut categories = article.categories.clone();
        categories.sort();
        categories.dedup();

        let id = rows.len() as i64 + 1;
        rows.push(ArticleRow {
            id,
            title: article.title.clone(),
            summary: article.summary.clone(),
            image_url: article.image_url.clone(),
            article_url: article.article_url.clone(),
            source_name: article.source_name.clone(),
            published_date: article.published_date,
            created_at: Utc::now(),
            categories,
        });
        Ok(Some(id))
    }

    async fn exists(&self, article_url: &str) -> Result<bool, sqlx::Error> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows.iter().any(|r| r.article_url == article_url))
    }

    async fn list(&self, interests: &[String], limit: usize) -> Result<Vec<ArticleRow>, sqlx::Error> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let mut matched: Vec<ArticleRow> = rows
            .iter()
            .filter(|r| interests.is_empty() || r.categories.iter().any(|c| interests.contains(c)))
            .cloned()
            .collect();

        // Newest first, undated last, then id descending like the SQL ordering.
        matched.sort_by(|a, b| {
            match (a.published_date, b.published_date) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
            .then_with(|| b.id.cmp(&a.id))
        });
        matched.truncate(limit);
        Ok(matched)
    }

    async fn count(&self) -> Result<i64, sqlx::Error> {
        Ok(self.rows.lock().unwrap_or_else(|e| e.into_inner()).len() as i64)
    }
}

#[cfg(test)]
pub(crate) fn sample_article(url: &str, categories: &[&str]) -> NewArticle {
    NewArticle {
        title: format!("Article at {url}"),
        summary: "Summary".to_string(),
        image_url: "https://example.org/img.png".to_string(),
        article_url: url.to_string(),
        source_name: "Test Feed".to_string(),
        published_date: None,
        categories: categories.iter().map(|c| c.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_upsert_is_idempotent_by_url() {
        let store = MemoryArticleStore::new();
        let article = sample_article("https://example.org/a", &["ADHD"]);

        assert_eq!(store.upsert(&article).await.unwrap(), Some(1));
        let mut changed = article.clone();
        changed.categories = vec!["Sleep".to_string()];
        assert_eq!(store.upsert(&changed).await.unwrap(), None);

        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.exists("https://example.org/a").await.unwrap());
        assert!(!store.exists("https://example.org/b").await.unwrap());
        let rows = store.list(&[], 10).await.unwrap();
        assert_eq!(rows[0].categories, vec!["ADHD".to_string()]);
    }

    #[tokio::test]
    async fn test_list_filters_by_any_interest() {
        let store = MemoryArticleStore::new();
        store.upsert(&sample_article("https://a", &["ADHD", "Sleep"])).await.unwrap();
        store.upsert(&sample_article("https://b", &["Autism"])).await.unwrap();
        store.upsert(&sample_article("https://c", &["Nutrition"])).await.unwrap();

        let interests = vec!["Sleep".to_string(), "Autism".to_string()];
        let urls: Vec<_> = store
            .list(&interests, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.article_url)
            .collect();
        assert_eq!(urls, vec!["https://b", "https://a"]);
        assert_eq!(store.list(&[], 10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_list_orders_newest_first_with_undated_last() {
        let store = MemoryArticleStore::new();
        let mut old = sample_article("https://old", &["ADHD"]);
        old.published_date = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).single();
        let mut new = sample_article("https://new", &["ADHD"]);
        new.published_date = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single();
        let undated = sample_article("https://undated", &["ADHD"]);

        store.upsert(&undated).await.unwrap();
        store.upsert(&old).await.unwrap();
        store.upsert(&new).await.unwrap();

        let urls: Vec<_> = store
            .list(&[], 2)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.article_url)
            .collect();
        assert_eq!(urls, vec!["https://new", "https://old"]);
    }
}
