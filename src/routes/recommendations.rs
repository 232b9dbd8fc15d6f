use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::request_id::RequestId;
use crate::models::{ItemRef, Recommendation, RecommendationBatch, TargetType, Timeframe};

use super::{parse_type_filter, AppState};

const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub user_id: Uuid,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

/// Handler for personalized batch generation
pub async fn generate_personalized(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<GenerateRequest>,
) -> AppResult<Json<RecommendationBatch>> {
    let type_filter = parse_type_filter(request.item_type.as_deref())?;

    tracing::info!(
        request_id = %request_id,
        user_id = %request.user_id,
        limit = request.limit,
        "Processing personalized recommendation request"
    );

    let batch = state
        .engine
        .generate_personalized(request.user_id, request.limit, type_filter)
        .await?;

    Ok(Json(batch))
}

#[derive(Debug, Deserialize)]
pub struct SimilarParams {
    pub limit: Option<usize>,
}

/// Handler for single-anchor similar-item lookups
pub async fn similar_items(
    State(state): State<AppState>,
    Path((item_type, id)): Path<(String, Uuid)>,
    Query(params): Query<SimilarParams>,
) -> AppResult<Json<Vec<Recommendation>>> {
    let target_type: TargetType = item_type.parse().map_err(AppError::InvalidArgument)?;
    let item = ItemRef {
        target_type,
        id,
    };

    let similar = state
        .engine
        .similar_items(item, params.limit.unwrap_or(DEFAULT_LIMIT))
        .await?;

    Ok(Json(similar))
}

#[derive(Debug, Deserialize)]
pub struct TrendingParams {
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub timeframe: Option<String>,
    pub limit: Option<usize>,
}

/// Handler for the trending list, no user context
pub async fn trending(
    State(state): State<AppState>,
    Query(params): Query<TrendingParams>,
) -> AppResult<Json<Vec<Recommendation>>> {
    let type_filter = parse_type_filter(params.item_type.as_deref())?;
    let timeframe = match params.timeframe.as_deref() {
        None => Timeframe::SevenDays,
        Some(raw) => raw.parse().map_err(AppError::InvalidArgument)?,
    };

    let ranked = state
        .engine
        .trending(type_filter, timeframe, params.limit.unwrap_or(DEFAULT_LIMIT))
        .await?;

    Ok(Json(ranked))
}
