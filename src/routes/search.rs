use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::services::search_intent::SearchIntent;

use super::AppState;

const DEFAULT_SUGGESTION_LIMIT: usize = 8;

#[derive(Debug, Deserialize)]
pub struct ClassifyParams {
    pub q: String,
    pub limit: Option<usize>,
}

/// Handler for search intent classification
///
/// Queries under two characters yield the empty intent rather than an error.
pub async fn classify(
    State(state): State<AppState>,
    Query(params): Query<ClassifyParams>,
) -> AppResult<Json<SearchIntent>> {
    let intent = state
        .engine
        .classify_search(&params.q, params.limit.unwrap_or(DEFAULT_SUGGESTION_LIMIT))
        .await?;

    Ok(Json(intent))
}
