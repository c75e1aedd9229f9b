pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::activities::handlers as activities;
use crate::feed::handlers as feed;
use crate::sessions::handlers as sessions;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Activities
        .route("/api/v1/activities", get(activities::handle_list_activities))
        .route("/api/v1/recommendations", post(activities::handle_recommend))
        // Sessions
        .route(
            "/api/v1/sessions",
            post(sessions::handle_create_session).get(sessions::handle_list_sessions),
        )
        .route("/api/v1/sessions/:id", get(sessions::handle_get_session))
        .route(
            "/api/v1/sessions/:id/profile",
            get(sessions::handle_get_profile).put(sessions::handle_put_profile),
        )
        .route(
            "/api/v1/sessions/:id/recommendations",
            post(sessions::handle_session_recommend),
        )
        .route(
            "/api/v1/sessions/:id/completions",
            post(sessions::handle_record_completion),
        )
        .route(
            "/api/v1/sessions/:id/feedback",
            post(sessions::handle_record_feedback),
        )
        .route("/api/v1/sessions/:id/progress", get(sessions::handle_get_progress))
        .route("/api/v1/sessions/:id/stats", get(sessions::handle_get_stats))
        .route(
            "/api/v1/sessions/:id/achievements",
            get(sessions::handle_get_achievements),
        )
        .route("/api/v1/sessions/:id/history", get(sessions::handle_get_history))
        .route(
            "/api/v1/sessions/:id/bookmarks",
            get(sessions::handle_list_bookmarks).post(sessions::handle_add_bookmark),
        )
        .route(
            "/api/v1/sessions/:id/articles",
            get(feed::handle_session_articles),
        )
        // Articles
        .route("/api/v1/articles", get(feed::handle_list_articles))
        .route("/api/v1/feed/refresh", post(feed::handle_refresh_feed))
        .with_state(state)
}
