//! Axum route handlers for the Activities API.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::activities::recommender::{recommend, Recommendation};
use crate::errors::AppError;
use crate::models::activity::Activity;
use crate::models::profile::ChildProfile;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ActivityListResponse {
    pub total: usize,
    pub activities: Vec<Activity>,
}

/// Rejects profiles with blank mandatory answers.
pub(crate) fn ensure_complete(profile: &ChildProfile) -> Result<(), AppError> {
    let missing = profile.missing_fields();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Please fill out all mandatory fields: {}",
            missing.join(", ")
        )))
    }
}

/// GET /api/v1/activities
pub async fn handle_list_activities(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Json<ActivityListResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let catalog = &state.library.catalog;
    Json(ActivityListResponse {
        total: catalog.len(),
        activities: catalog.activities().iter().take(limit).cloned().collect(),
    })
}

/// POST /api/v1/recommendations
///
/// Stateless: recommends for the profile in the body without creating a session.
pub async fn handle_recommend(
    State(state): State<AppState>,
    Json(profile): Json<ChildProfile>,
) -> Result<Json<Recommendation>, AppError> {
    ensure_complete(&profile)?;
    let recommendation = recommend(&profile, &state.library, state.generator.as_ref()).await;
    Ok(Json(recommendation))
}
