use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Feedback, ItemRef, TargetType};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub batch_id: Uuid,
    pub item_type: String,
    pub item_id: Uuid,
    pub rating: u8,
    pub helpful: bool,
    pub reason: Option<String>,
}

/// Handler for recording feedback on a prior batch
pub async fn record(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> AppResult<Json<Feedback>> {
    let target_type: TargetType = request
        .item_type
        .parse()
        .map_err(AppError::InvalidArgument)?;

    let feedback = state
        .engine
        .record_feedback(
            request.batch_id,
            ItemRef {
                target_type,
                id: request.item_id,
            },
            request.rating,
            request.helpful,
            request.reason,
        )
        .await?;

    Ok(Json(feedback))
}
