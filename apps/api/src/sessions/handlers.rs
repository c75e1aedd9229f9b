use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::activities::handlers::ensure_complete;
use crate::activities::recommender::{recommend, Recommendation};
use crate::errors::AppError;
use crate::models::profile::ChildProfile;
use crate::sessions::progress::{
    self, AchievementReport, Bookmark, CompletionEntry, CompletionOutcome, CompletionRecord, FeedbackRecord,
    SkillProgress, Statistics,
};
use crate::sessions::store::{SessionInfo, SessionStore, StorageInfo, PROFILE_DOC};
use crate::state::AppState;

const RECOMMENDATIONS_DOC: &str = "recommendations";

#[derive(Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<Uuid>,
    pub storage: StorageInfo,
}

#[derive(Serialize)]
pub struct SessionDetailResponse {
    #[serde(flatten)]
    pub info: SessionInfo,
    pub data_types: Vec<String>,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub user_id: Option<String>,
    pub profile: ChildProfile,
}

#[derive(Serialize)]
pub struct BookmarkResponse {
    pub added: bool,
    pub bookmarks: Vec<Bookmark>,
}

/// The stored profile and the user id it was saved under.
pub(crate) async fn load_profile(
    store: &SessionStore,
    session: Uuid,
) -> Result<(ChildProfile, Option<String>), AppError> {
    let doc = store
        .load(session, PROFILE_DOC)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session {session} has no profile yet")))?;
    let user_id = user_id_of(&doc);
    let profile = serde_json::from_value(doc)
        .map_err(|e| AppError::Storage(format!("Stored profile is malformed: {e}")))?;
    Ok((profile, user_id))
}

/// User id from the stored profile, if one was saved.
async fn current_user(store: &SessionStore, session: Uuid) -> Result<Option<String>, AppError> {
    Ok(store
        .load(session, PROFILE_DOC)
        .await?
        .as_ref()
        .and_then(user_id_of))
}

fn user_id_of(doc: &Value) -> Option<String> {
    doc.get("user_id").and_then(Value::as_str).map(str::to_string)
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionInfo>), AppError> {
    let info = state.sessions.create_session().await?;
    Ok((StatusCode::CREATED, Json(info)))
}

/// GET /api/v1/sessions
pub async fn handle_list_sessions(
    State(state): State<AppState>,
) -> Result<Json<SessionListResponse>, AppError> {
    Ok(Json(SessionListResponse {
        sessions: state.sessions.list_sessions().await?,
        storage: state.sessions.info().await?,
    }))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionDetailResponse>, AppError> {
    Ok(Json(SessionDetailResponse {
        info: state.sessions.session_info(id).await?,
        data_types: state.sessions.data_types(id).await?,
    }))
}

/// PUT /api/v1/sessions/:id/profile
pub async fn handle_put_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(profile): Json<ChildProfile>,
) -> Result<Json<ProfileResponse>, AppError> {
    ensure_complete(&profile)?;
    let existing = current_user(&state.sessions, id).await?;
    let doc = serde_json::to_value(&profile).map_err(anyhow::Error::from)?;
    let user_id = state
        .sessions
        .save(id, PROFILE_DOC, doc, existing.as_deref())
        .await?;
    Ok(Json(ProfileResponse { user_id, profile }))
}

/// GET /api/v1/sessions/:id/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProfileResponse>, AppError> {
    let (profile, user_id) = load_profile(&state.sessions, id).await?;
    Ok(Json(ProfileResponse { user_id, profile }))
}

/// POST /api/v1/sessions/:id/recommendations
///
/// Recommends from the stored profile and keeps the result as the session's
/// `recommendations` document.
pub async fn handle_session_recommend(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Recommendation>, AppError> {
    let (profile, user_id) = load_profile(&state.sessions, id).await?;
    ensure_complete(&profile)?;

    let recommendation = recommend(&profile, &state.library, state.generator.as_ref()).await;
    let doc = serde_json::to_value(&recommendation).map_err(anyhow::Error::from)?;
    state
        .sessions
        .save(id, RECOMMENDATIONS_DOC, doc, user_id.as_deref())
        .await?;
    Ok(Json(recommendation))
}

/// POST /api/v1/sessions/:id/completions
pub async fn handle_record_completion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(record): Json<CompletionRecord>,
) -> Result<(StatusCode, Json<CompletionOutcome>), AppError> {
    let user = current_user(&state.sessions, id).await?;
    let outcome = progress::record_completion(&state.sessions, id, user.as_deref(), record).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// POST /api/v1/sessions/:id/feedback
pub async fn handle_record_feedback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(record): Json<FeedbackRecord>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let user = current_user(&state.sessions, id).await?;
    let doc = progress::record_feedback(&state.sessions, id, user.as_deref(), record).await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

/// GET /api/v1/sessions/:id/progress
pub async fn handle_get_progress(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BTreeMap<String, SkillProgress>>, AppError> {
    Ok(Json(progress::skill_progress(&state.sessions, id).await?))
}

/// GET /api/v1/sessions/:id/stats
pub async fn handle_get_stats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Statistics>, AppError> {
    Ok(Json(progress::statistics(&state.sessions, id).await?))
}

/// GET /api/v1/sessions/:id/achievements
pub async fn handle_get_achievements(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AchievementReport>, AppError> {
    Ok(Json(progress::achievements(&state.sessions, id).await?))
}

/// GET /api/v1/sessions/:id/history
pub async fn handle_get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CompletionEntry>>, AppError> {
    Ok(Json(progress::activity_history(&state.sessions, id).await?))
}

/// POST /api/v1/sessions/:id/bookmarks
pub async fn handle_add_bookmark(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(bookmark): Json<Bookmark>,
) -> Result<Json<BookmarkResponse>, AppError> {
    if bookmark.url.trim().is_empty() {
        return Err(AppError::Validation("Bookmark url must not be empty".to_string()));
    }
    let user = current_user(&state.sessions, id).await?;
    let added = progress::bookmark_article(&state.sessions, id, user.as_deref(), bookmark).await?;
    Ok(Json(BookmarkResponse {
        added,
        bookmarks: progress::bookmarks(&state.sessions, id).await?,
    }))
}

/// GET /api/v1/sessions/:id/bookmarks
pub async fn handle_list_bookmarks(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Bookmark>>, AppError> {
    Ok(Json(progress::bookmarks(&state.sessions, id).await?))
}
