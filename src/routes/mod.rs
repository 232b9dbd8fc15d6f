use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::{AppError, AppResult};
use crate::middleware::request_id::request_id_middleware;
use crate::models::TargetType;
use crate::services::RecommendationEngine;

pub mod feedback;
pub mod recommendations;
pub mod search;
pub mod users;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RecommendationEngine>,
}

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/recommendations",
            post(recommendations::generate_personalized),
        )
        .route(
            "/items/:item_type/:id/similar",
            get(recommendations::similar_items),
        )
        .route("/trending", get(recommendations::trending))
        .route("/search/intent", get(search::classify))
        .route("/feedback", post(feedback::record))
        .route("/users/:id/insights", get(users::insights))
        .route("/users/:id/activity-events", post(users::activity_ingested))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Maps an optional `content|package|all` string to a type filter
pub(crate) fn parse_type_filter(raw: Option<&str>) -> AppResult<Option<TargetType>> {
    match raw {
        None => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("all") => Ok(None),
        Some(s) => s
            .parse::<TargetType>()
            .map(Some)
            .map_err(AppError::InvalidArgument),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_type_filter() {
        assert_eq!(parse_type_filter(None).unwrap(), None);
        assert_eq!(parse_type_filter(Some("all")).unwrap(), None);
        assert_eq!(
            parse_type_filter(Some("content")).unwrap(),
            Some(TargetType::Content)
        );
        assert!(parse_type_filter(Some("bogus")).is_err());
    }
}
