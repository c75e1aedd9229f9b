use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::feed::ingest::IngestReport;
use crate::feed::sources::canonical_category;
use crate::models::article::ArticleRow;
use crate::sessions::handlers::load_profile;
use crate::state::AppState;

const DEFAULT_ARTICLE_LIMIT: usize = 20;
const MAX_ARTICLE_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ArticleQuery {
    /// Comma-separated category names.
    pub interests: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ArticleListResponse {
    pub interests: Vec<String>,
    pub articles: Vec<ArticleRow>,
}

/// Splits `a, b,,c` into known taxonomy labels; unknown names are rejected.
fn parse_interests(raw: Option<&str>) -> Result<Vec<String>, AppError> {
    let mut interests = Vec::new();
    for label in raw.unwrap_or_default().split(',').map(str::trim) {
        if label.is_empty() {
            continue;
        }
        let known = canonical_category(label)
            .ok_or_else(|| AppError::Validation(format!("Unknown interest '{label}'")))?;
        if !interests.iter().any(|i| i == known) {
            interests.push(known.to_string());
        }
    }
    Ok(interests)
}

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_ARTICLE_LIMIT).clamp(1, MAX_ARTICLE_LIMIT)
}

/// GET /api/v1/articles?interests=ADHD,Sleep
pub async fn handle_list_articles(
    State(state): State<AppState>,
    Query(params): Query<ArticleQuery>,
) -> Result<Json<ArticleListResponse>, AppError> {
    let interests = parse_interests(params.interests.as_deref())?;
    let articles = state
        .articles
        .list(&interests, clamp_limit(params.limit))
        .await?;
    Ok(Json(ArticleListResponse {
        interests,
        articles,
    }))
}

/// GET /api/v1/sessions/:id/articles
///
/// Interests come from the session's stored profile.
pub async fn handle_session_articles(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<ArticleListResponse>, AppError> {
    let (profile, _) = load_profile(&state.sessions, id).await?;
    let interests = profile.interests();
    let articles = state
        .articles
        .list(&interests, clamp_limit(params.limit))
        .await?;
    Ok(Json(ArticleListResponse {
        interests,
        articles,
    }))
}

/// POST /api/v1/feed/refresh
pub async fn handle_refresh_feed(State(state): State<AppState>) -> Json<IngestReport> {
    Json(state.ingestor.run_once().await)
}
