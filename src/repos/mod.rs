use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    ActivityEvent, CandidateItem, Feedback, ItemRef, RecommendationBatch, TargetType,
};

pub mod history;
pub mod postgres;

pub use history::HttpHistoryStore;
pub use postgres::{PgActivityRepository, PgCatalogRepository};

/// How a peer engaged with an item; authorship weighs heavier than a like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerEngagementKind {
    Authored,
    Liked,
}

/// One peer-to-item engagement edge used by the collaborative recommender
#[derive(Debug, Clone)]
pub struct PeerEngagement {
    pub peer: Uuid,
    pub item: ItemRef,
    pub kind: PeerEngagementKind,
}

/// Read-only view over the platform's append-only activity log
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// Full event history for one user, oldest first
    async fn events_for_user(&self, user_id: Uuid) -> AppResult<Vec<ActivityEvent>>;

    /// How many users this user follows
    async fn follow_count(&self, user_id: Uuid) -> AppResult<u64>;

    /// Most recently active users, excluding the given one
    async fn recent_active_users(&self, exclude: Uuid, limit: usize) -> AppResult<Vec<Uuid>>;
}

/// Read-only view over the content/package catalog
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Single item lookup
    async fn item(&self, item: ItemRef) -> AppResult<Option<CandidateItem>>;

    /// Items matching any of the given categories, destinations, or tags
    async fn candidates_matching(
        &self,
        categories: Vec<String>,
        destinations: Vec<String>,
        tags: Vec<String>,
    ) -> AppResult<Vec<CandidateItem>>;

    /// Items created at or after the cutoff, optionally filtered by type
    async fn created_since(
        &self,
        cutoff: DateTime<Utc>,
        target: Option<TargetType>,
    ) -> AppResult<Vec<CandidateItem>>;

    /// Authored/liked engagement edges for the given users
    async fn items_engaged_by(&self, users: Vec<Uuid>) -> AppResult<Vec<PeerEngagement>>;

    /// Items the user authored, liked, or booked; the exclusion set for
    /// collaborative candidates
    async fn engaged_refs(&self, user_id: Uuid) -> AppResult<HashSet<ItemRef>>;

    /// Most-booked destinations with booking counts
    async fn top_destinations(&self, limit: usize) -> AppResult<Vec<(String, u64)>>;

    /// Largest catalog categories for a type, with item counts
    async fn top_categories(&self, target: TargetType, limit: usize)
        -> AppResult<Vec<(String, u64)>>;
}

/// External recommendation history service: batches in, feedback in,
/// batch lookups out
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn record_batch(&self, batch: RecommendationBatch) -> AppResult<()>;

    async fn get_batch(&self, batch_id: Uuid) -> AppResult<Option<RecommendationBatch>>;

    async fn record_feedback(&self, feedback: Feedback) -> AppResult<()>;
}

const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Runs an upstream operation, retrying once with backoff on transient
/// failure before surfacing the error
pub async fn retry_once<T, F, Fut>(label: &str, op: F) -> AppResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(e) if e.is_transient() => {
            tracing::warn!(error = %e, operation = label, "Transient upstream failure, retrying");
            tokio::time::sleep(RETRY_BACKOFF).await;
            op().await
        }
        Err(e) => Err(e),
    }
}
