use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    ActivityEvent, ActivityKind, CandidateItem, ContentItem, Engagement, ItemRef, PackageItem,
    TargetType,
};

use super::{retry_once, ActivityRepository, CatalogRepository, PeerEngagement, PeerEngagementKind};

/// Raw activity log row; enum columns arrive as text
#[derive(sqlx::FromRow)]
struct ActivityEventRow {
    user_id: Uuid,
    kind: String,
    target_type: String,
    target_id: Uuid,
    category: Option<String>,
    destination: Option<String>,
    tags: Option<Vec<String>>,
    amount: Option<f64>,
    duration_days: Option<i32>,
    group_size: Option<i32>,
    occurred_at: DateTime<Utc>,
}

impl ActivityEventRow {
    /// Rows with unknown enum values are logged and dropped rather than
    /// failing the whole read
    fn into_event(self) -> Option<ActivityEvent> {
        let kind: ActivityKind = match self.kind.parse() {
            Ok(k) => k,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %self.user_id, "Skipping malformed activity row");
                return None;
            }
        };
        let target_type: TargetType = match self.target_type.parse() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %self.user_id, "Skipping malformed activity row");
                return None;
            }
        };

        Some(ActivityEvent {
            user_id: self.user_id,
            kind,
            target: ItemRef {
                target_type,
                id: self.target_id,
            },
            category: self.category,
            destination: self.destination,
            tags: self.tags.unwrap_or_default(),
            amount: self.amount,
            duration_days: self.duration_days.map(|d| d.max(0) as u32),
            group_size: self.group_size.map(|g| g.max(0) as u32),
            occurred_at: self.occurred_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ContentRow {
    id: Uuid,
    category: String,
    destination: Option<String>,
    tags: Vec<String>,
    likes: i64,
    comments: i64,
    views: i64,
    created_at: DateTime<Utc>,
}

impl From<ContentRow> for CandidateItem {
    fn from(row: ContentRow) -> Self {
        CandidateItem::Content(ContentItem {
            id: row.id,
            category: row.category,
            destination: row.destination,
            tags: row.tags,
            engagement: Engagement {
                likes: row.likes.max(0) as u64,
                comments: row.comments.max(0) as u64,
                views: row.views.max(0) as u64,
                ..Default::default()
            },
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PackageRow {
    id: Uuid,
    category: String,
    destination: Option<String>,
    tags: Vec<String>,
    bookings: i64,
    views: i64,
    rating: Option<f64>,
    created_at: DateTime<Utc>,
}

impl From<PackageRow> for CandidateItem {
    fn from(row: PackageRow) -> Self {
        CandidateItem::Package(PackageItem {
            id: row.id,
            category: row.category,
            destination: row.destination,
            tags: row.tags,
            engagement: Engagement {
                bookings: row.bookings.max(0) as u64,
                views: row.views.max(0) as u64,
                rating: row.rating,
                ..Default::default()
            },
            created_at: row.created_at,
        })
    }
}

const CONTENT_COLUMNS: &str = "id, category, destination, tags, likes, comments, views, created_at";
const PACKAGE_COLUMNS: &str = "id, category, destination, tags, bookings, views, rating, created_at";

/// Activity log reads backed by the platform's Postgres event store
pub struct PgActivityRepository {
    pool: Arc<PgPool>,
}

impl PgActivityRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn fetch_events(&self, user_id: Uuid) -> AppResult<Vec<ActivityEvent>> {
        let rows = sqlx::query_as::<_, ActivityEventRow>(
            "SELECT user_id, kind, target_type, target_id, category, destination, \
                    tags, amount, duration_days, group_size, occurred_at \
             FROM activity_events \
             WHERE user_id = $1 \
             ORDER BY occurred_at ASC",
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(ActivityEventRow::into_event)
            .collect())
    }

    async fn fetch_follow_count(&self, user_id: Uuid) -> AppResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE follower_id = $1")
                .bind(user_id)
                .fetch_one(self.pool.as_ref())
                .await?;
        Ok(count.max(0) as u64)
    }

    async fn fetch_recent_active(&self, exclude: Uuid, limit: usize) -> AppResult<Vec<Uuid>> {
        let users: Vec<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM activity_events \
             WHERE user_id <> $1 \
             GROUP BY user_id \
             ORDER BY MAX(occurred_at) DESC \
             LIMIT $2",
        )
        .bind(exclude)
        .bind(limit as i64)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(users)
    }
}

#[async_trait]
impl ActivityRepository for PgActivityRepository {
    async fn events_for_user(&self, user_id: Uuid) -> AppResult<Vec<ActivityEvent>> {
        retry_once("activity.events_for_user", || self.fetch_events(user_id)).await
    }

    async fn follow_count(&self, user_id: Uuid) -> AppResult<u64> {
        retry_once("activity.follow_count", || self.fetch_follow_count(user_id)).await
    }

    async fn recent_active_users(&self, exclude: Uuid, limit: usize) -> AppResult<Vec<Uuid>> {
        retry_once("activity.recent_active_users", || {
            self.fetch_recent_active(exclude, limit)
        })
        .await
    }
}

/// Catalog reads over the content and package tables
pub struct PgCatalogRepository {
    pool: Arc<PgPool>,
}

impl PgCatalogRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn fetch_item(&self, item: ItemRef) -> AppResult<Option<CandidateItem>> {
        match item.target_type {
            TargetType::Content => {
                let row = sqlx::query_as::<_, ContentRow>(&format!(
                    "SELECT {} FROM content_items WHERE id = $1",
                    CONTENT_COLUMNS
                ))
                .bind(item.id)
                .fetch_optional(self.pool.as_ref())
                .await?;
                Ok(row.map(CandidateItem::from))
            }
            TargetType::Package => {
                let row = sqlx::query_as::<_, PackageRow>(&format!(
                    "SELECT {} FROM travel_packages WHERE id = $1",
                    PACKAGE_COLUMNS
                ))
                .bind(item.id)
                .fetch_optional(self.pool.as_ref())
                .await?;
                Ok(row.map(CandidateItem::from))
            }
        }
    }

    async fn fetch_matching(
        &self,
        categories: &[String],
        destinations: &[String],
        tags: &[String],
    ) -> AppResult<Vec<CandidateItem>> {
        let content = sqlx::query_as::<_, ContentRow>(&format!(
            "SELECT {} FROM content_items \
             WHERE category = ANY($1) OR destination = ANY($2) OR tags && $3",
            CONTENT_COLUMNS
        ))
        .bind(categories)
        .bind(destinations)
        .bind(tags)
        .fetch_all(self.pool.as_ref())
        .await?;

        let packages = sqlx::query_as::<_, PackageRow>(&format!(
            "SELECT {} FROM travel_packages \
             WHERE category = ANY($1) OR destination = ANY($2) OR tags && $3",
            PACKAGE_COLUMNS
        ))
        .bind(categories)
        .bind(destinations)
        .bind(tags)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(content
            .into_iter()
            .map(CandidateItem::from)
            .chain(packages.into_iter().map(CandidateItem::from))
            .collect())
    }

    async fn fetch_created_since(
        &self,
        cutoff: DateTime<Utc>,
        target: Option<TargetType>,
    ) -> AppResult<Vec<CandidateItem>> {
        let mut items = Vec::new();

        if target.is_none() || target == Some(TargetType::Content) {
            let content = sqlx::query_as::<_, ContentRow>(&format!(
                "SELECT {} FROM content_items WHERE created_at >= $1",
                CONTENT_COLUMNS
            ))
            .bind(cutoff)
            .fetch_all(self.pool.as_ref())
            .await?;
            items.extend(content.into_iter().map(CandidateItem::from));
        }

        if target.is_none() || target == Some(TargetType::Package) {
            let packages = sqlx::query_as::<_, PackageRow>(&format!(
                "SELECT {} FROM travel_packages WHERE created_at >= $1",
                PACKAGE_COLUMNS
            ))
            .bind(cutoff)
            .fetch_all(self.pool.as_ref())
            .await?;
            items.extend(packages.into_iter().map(CandidateItem::from));
        }

        Ok(items)
    }

    async fn fetch_engaged_by(&self, users: &[Uuid]) -> AppResult<Vec<PeerEngagement>> {
        let rows = sqlx::query_as::<_, (Uuid, String, String, Uuid)>(
            "SELECT user_id, kind, target_type, target_id \
             FROM activity_events \
             WHERE user_id = ANY($1) AND kind IN ('authored', 'liked')",
        )
        .bind(users)
        .fetch_all(self.pool.as_ref())
        .await?;

        let mut edges = Vec::with_capacity(rows.len());
        for (peer, kind, target_type, target_id) in rows {
            let kind = match kind.as_str() {
                "authored" => PeerEngagementKind::Authored,
                "liked" => PeerEngagementKind::Liked,
                other => {
                    tracing::warn!(kind = other, "Skipping unexpected engagement kind");
                    continue;
                }
            };
            let target_type: TargetType = match target_type.parse() {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping engagement with unknown target type");
                    continue;
                }
            };
            edges.push(PeerEngagement {
                peer,
                item: ItemRef {
                    target_type,
                    id: target_id,
                },
                kind,
            });
        }
        Ok(edges)
    }

    async fn fetch_engaged_refs(&self, user_id: Uuid) -> AppResult<HashSet<ItemRef>> {
        let rows = sqlx::query_as::<_, (String, Uuid)>(
            "SELECT DISTINCT target_type, target_id \
             FROM activity_events \
             WHERE user_id = $1 AND kind IN ('authored', 'liked', 'booked')",
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(target_type, id)| {
                target_type
                    .parse::<TargetType>()
                    .ok()
                    .map(|target_type| ItemRef { target_type, id })
            })
            .collect())
    }

    async fn fetch_top_destinations(&self, limit: usize) -> AppResult<Vec<(String, u64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT destination, COUNT(*) AS bookings \
             FROM activity_events \
             WHERE kind = 'booked' AND destination IS NOT NULL \
             GROUP BY destination \
             ORDER BY bookings DESC, destination ASC \
             LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(destination, count)| (destination, count.max(0) as u64))
            .collect())
    }

    async fn fetch_top_categories(
        &self,
        target: TargetType,
        limit: usize,
    ) -> AppResult<Vec<(String, u64)>> {
        let table = match target {
            TargetType::Content => "content_items",
            TargetType::Package => "travel_packages",
        };
        let rows = sqlx::query_as::<_, (String, i64)>(&format!(
            "SELECT category, COUNT(*) AS items \
             FROM {} \
             GROUP BY category \
             ORDER BY items DESC, category ASC \
             LIMIT $1",
            table
        ))
        .bind(limit as i64)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(category, count)| (category, count.max(0) as u64))
            .collect())
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn item(&self, item: ItemRef) -> AppResult<Option<CandidateItem>> {
        retry_once("catalog.item", || self.fetch_item(item)).await
    }

    async fn candidates_matching(
        &self,
        categories: Vec<String>,
        destinations: Vec<String>,
        tags: Vec<String>,
    ) -> AppResult<Vec<CandidateItem>> {
        if categories.is_empty() && destinations.is_empty() && tags.is_empty() {
            return Ok(Vec::new());
        }
        retry_once("catalog.candidates_matching", || {
            self.fetch_matching(&categories, &destinations, &tags)
        })
        .await
    }

    async fn created_since(
        &self,
        cutoff: DateTime<Utc>,
        target: Option<TargetType>,
    ) -> AppResult<Vec<CandidateItem>> {
        retry_once("catalog.created_since", || {
            self.fetch_created_since(cutoff, target)
        })
        .await
    }

    async fn items_engaged_by(&self, users: Vec<Uuid>) -> AppResult<Vec<PeerEngagement>> {
        if users.is_empty() {
            return Ok(Vec::new());
        }
        retry_once("catalog.items_engaged_by", || self.fetch_engaged_by(&users)).await
    }

    async fn engaged_refs(&self, user_id: Uuid) -> AppResult<HashSet<ItemRef>> {
        retry_once("catalog.engaged_refs", || self.fetch_engaged_refs(user_id)).await
    }

    async fn top_destinations(&self, limit: usize) -> AppResult<Vec<(String, u64)>> {
        retry_once("catalog.top_destinations", || {
            self.fetch_top_destinations(limit)
        })
        .await
    }

    async fn top_categories(
        &self,
        target: TargetType,
        limit: usize,
    ) -> AppResult<Vec<(String, u64)>> {
        retry_once("catalog.top_categories", || {
            self.fetch_top_categories(target, limit)
        })
        .await
    }
}
