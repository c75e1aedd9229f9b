use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An article parsed from a feed, not yet stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewArticle {
    pub title: String,
    pub summary: String,
    pub image_url: String,
    pub article_url: String,
    pub source_name: String,
    pub published_date: Option<DateTime<Utc>>,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ArticleRow {
    pub id: i64,
    pub title: String,
    pub summary: String,
    pub image_url: String,
    pub article_url: String,
    pub source_name: String,
    pub published_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub categories: Vec<String>,
}
