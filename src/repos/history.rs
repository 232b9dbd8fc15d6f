use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Feedback, RecommendationBatch};

use super::{retry_once, HistoryStore};

/// Client for the external recommendation history service
///
/// Batches and feedback are appended over HTTP; the service owns retention
/// and downstream analytics.
pub struct HttpHistoryStore {
    http_client: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl HttpHistoryStore {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url,
            api_key,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn put_batch(&self, batch: &RecommendationBatch) -> AppResult<()> {
        let url = format!("{}/batches/{}", self.base_url, batch.id);

        let response = self
            .authorize(self.http_client.put(&url).json(batch))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                batch_id = %batch.id,
                status = %status,
                body = %body,
                "History service rejected batch"
            );
            return Err(AppError::Upstream(format!(
                "history service returned status {}",
                status
            )));
        }

        tracing::debug!(batch_id = %batch.id, "Batch recorded in history service");
        Ok(())
    }

    async fn fetch_batch(&self, batch_id: Uuid) -> AppResult<Option<RecommendationBatch>> {
        let url = format!("{}/batches/{}", self.base_url, batch_id);

        let response = self.authorize(self.http_client.get(&url)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "history service returned status {}",
                response.status()
            )));
        }

        let batch: RecommendationBatch = response.json().await?;
        Ok(Some(batch))
    }

    async fn post_feedback(&self, feedback: &Feedback) -> AppResult<()> {
        let url = format!("{}/feedback", self.base_url);

        let response = self
            .authorize(self.http_client.post(&url).json(feedback))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(
                batch_id = %feedback.batch_id,
                status = %status,
                "History service rejected feedback"
            );
            return Err(AppError::Upstream(format!(
                "history service returned status {}",
                status
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl HistoryStore for HttpHistoryStore {
    async fn record_batch(&self, batch: RecommendationBatch) -> AppResult<()> {
        retry_once("history.record_batch", || self.put_batch(&batch)).await
    }

    async fn get_batch(&self, batch_id: Uuid) -> AppResult<Option<RecommendationBatch>> {
        retry_once("history.get_batch", || self.fetch_batch(batch_id)).await
    }

    async fn record_feedback(&self, feedback: Feedback) -> AppResult<()> {
        retry_once("history.record_feedback", || self.post_feedback(&feedback)).await
    }
}
