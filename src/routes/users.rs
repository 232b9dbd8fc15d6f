use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::UserInsights;

use super::AppState;

/// Handler for the persona/pattern summary view
pub async fn insights(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserInsights>> {
    let insights = state.engine.user_insights(user_id).await?;
    Ok(Json(insights))
}

/// Invalidation hook the CRUD layer calls after ingesting a new activity
/// event for the user; evicts the cached profile so the next request
/// rebuilds it
pub async fn activity_ingested(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> (StatusCode, Json<Value>) {
    state.engine.invalidate_profile(user_id).await;
    (StatusCode::ACCEPTED, Json(json!({ "invalidated": user_id })))
}
