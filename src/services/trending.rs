use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::db::{Cache, CacheKey};
use crate::error::AppResult;
use crate::models::{
    CandidateItem, Recommendation, RecommendationSource, TargetType, Timeframe,
};
use crate::repos::CatalogRepository;

const CONTENT_LIKE_WEIGHT: f64 = 3.0;
const CONTENT_COMMENT_WEIGHT: f64 = 5.0;
const CONTENT_VIEW_WEIGHT: f64 = 0.1;

const PACKAGE_BOOKING_WEIGHT: f64 = 10.0;
const PACKAGE_VIEW_WEIGHT: f64 = 0.5;
const PACKAGE_RATING_WEIGHT: f64 = 2.0;

/// How many entries a cached trending list holds, independent of the
/// requested limit
const CACHED_LIST_SIZE: usize = 50;

/// Profile-independent recommender: recent engagement with linear time decay
pub struct TrendingRecommender {
    catalog: Arc<dyn CatalogRepository>,
    cache: Option<Cache>,
    cache_ttl_secs: u64,
}

impl TrendingRecommender {
    pub fn new(catalog: Arc<dyn CatalogRepository>, cache: Option<Cache>, cache_ttl_secs: u64) -> Self {
        Self {
            catalog,
            cache,
            cache_ttl_secs,
        }
    }

    pub async fn recommend(
        &self,
        target: Option<TargetType>,
        timeframe: Timeframe,
        limit: usize,
    ) -> AppResult<Vec<Recommendation>> {
        let key = CacheKey::Trending(target, timeframe);

        if let Some(cache) = &self.cache {
            match cache.get_from_cache::<Vec<Recommendation>>(&key).await {
                Ok(Some(cached)) if cached.len() >= limit.min(CACHED_LIST_SIZE) => {
                    tracing::debug!(key = %key, "Trending cache hit");
                    let mut list = cached;
                    list.truncate(limit);
                    return Ok(list);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, key = %key, "Trending cache read failed, recomputing");
                }
            }
        }

        let now = Utc::now();
        let cutoff = now - Duration::days(timeframe.window_days() as i64);
        let items = self.catalog.created_since(cutoff, target).await?;

        tracing::debug!(
            timeframe = %timeframe,
            candidate_count = items.len(),
            "Scoring trending candidates"
        );

        let mut ranked: Vec<Recommendation> = items
            .iter()
            .filter_map(|item| {
                let score = trending_score(item, now, timeframe);
                if score <= 0.0 {
                    return None;
                }
                Some(Recommendation {
                    item: item.item_ref(),
                    source: RecommendationSource::Trending,
                    score,
                    reason: timeframe_phrase(timeframe).to_string(),
                })
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.item.id.cmp(&b.item.id))
        });
        ranked.truncate(limit.max(CACHED_LIST_SIZE));

        if let Some(cache) = &self.cache {
            cache.set_in_background(&key, &ranked, self.cache_ttl_secs);
        }

        ranked.truncate(limit);
        Ok(ranked)
    }
}

/// Raw engagement weight before decay; packages weigh bookings and rating,
/// content weighs likes and comments
pub fn engagement_score(item: &CandidateItem) -> f64 {
    let engagement = item.engagement();
    match item {
        CandidateItem::Content(_) => {
            CONTENT_LIKE_WEIGHT * engagement.likes as f64
                + CONTENT_COMMENT_WEIGHT * engagement.comments as f64
                + CONTENT_VIEW_WEIGHT * engagement.views as f64
        }
        CandidateItem::Package(_) => {
            PACKAGE_BOOKING_WEIGHT * engagement.bookings as f64
                + PACKAGE_VIEW_WEIGHT * engagement.views as f64
                + PACKAGE_RATING_WEIGHT * engagement.rating.unwrap_or(0.0)
        }
    }
}

/// Linear decay from 1 at age zero to 0 at the window edge
pub fn time_decay(age_days: f64, window_days: f64) -> f64 {
    (1.0 - age_days / window_days).max(0.0)
}

pub fn trending_score(item: &CandidateItem, now: DateTime<Utc>, timeframe: Timeframe) -> f64 {
    engagement_score(item) * time_decay(item.age_days(now), timeframe.window_days() as f64)
}

fn timeframe_phrase(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::OneDay => "trending today",
        Timeframe::SevenDays => "trending this week",
        Timeframe::ThirtyDays => "trending this month",
        Timeframe::NinetyDays => "trending this quarter",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentItem, Engagement, PackageItem};
    use uuid::Uuid;

    fn content(likes: u64, comments: u64, views: u64, age_days: i64) -> CandidateItem {
        CandidateItem::Content(ContentItem {
            id: Uuid::new_v4(),
            category: "Adventure".to_string(),
            destination: None,
            tags: vec![],
            engagement: Engagement {
                likes,
                comments,
                views,
                ..Default::default()
            },
            created_at: Utc::now() - Duration::days(age_days),
        })
    }

    fn package(bookings: u64, views: u64, rating: f64, age_days: i64) -> CandidateItem {
        CandidateItem::Package(PackageItem {
            id: Uuid::new_v4(),
            category: "Beach".to_string(),
            destination: Some("Bali".to_string()),
            tags: vec![],
            engagement: Engagement {
                bookings,
                views,
                rating: Some(rating),
                ..Default::default()
            },
            created_at: Utc::now() - Duration::days(age_days),
        })
    }

    #[test]
    fn test_content_engagement_formula() {
        let item = content(10, 4, 100, 0);
        // 3*10 + 5*4 + 0.1*100
        assert!((engagement_score(&item) - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_package_engagement_formula() {
        let item = package(3, 40, 4.5, 0);
        // 10*3 + 0.5*40 + 2*4.5
        assert!((engagement_score(&item) - 59.0).abs() < 1e-9);
    }

    #[test]
    fn test_decay_is_strictly_decreasing_inside_window() {
        let now = Utc::now();
        let younger = content(10, 0, 0, 2);
        let older = content(10, 0, 0, 5);

        let younger_score = trending_score(&younger, now, Timeframe::SevenDays);
        let older_score = trending_score(&older, now, Timeframe::SevenDays);
        assert!(younger_score > older_score);
        assert!(older_score > 0.0);
    }

    #[test]
    fn test_decay_floors_at_window_edge() {
        assert_eq!(time_decay(7.0, 7.0), 0.0);
        assert_eq!(time_decay(12.0, 7.0), 0.0);
        assert!((time_decay(0.0, 7.0) - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_recommend_ranks_by_decayed_engagement() {
        use crate::repos::MockCatalogRepository;

        let hot_and_fresh = content(50, 10, 0, 1);
        let hot_but_old = content(50, 10, 0, 6);
        let expected_first = hot_and_fresh.item_ref();

        let items = vec![hot_but_old, hot_and_fresh];
        let mut catalog = MockCatalogRepository::new();
        catalog
            .expect_created_since()
            .returning(move |_, _| Ok(items.clone()));

        let recommender = TrendingRecommender::new(Arc::new(catalog), None, 300);
        let ranked = recommender
            .recommend(None, Timeframe::SevenDays, 10)
            .await
            .unwrap();

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].item, expected_first);
        assert!(ranked[0].score >= ranked[1].score);
    }

    #[tokio::test]
    async fn test_zero_engagement_items_are_dropped() {
        use crate::repos::MockCatalogRepository;

        let silent = content(0, 0, 0, 1);
        let items = vec![silent];
        let mut catalog = MockCatalogRepository::new();
        catalog
            .expect_created_since()
            .returning(move |_, _| Ok(items.clone()));

        let recommender = TrendingRecommender::new(Arc::new(catalog), None, 300);
        let ranked = recommender
            .recommend(Some(TargetType::Content), Timeframe::OneDay, 10)
            .await
            .unwrap();
        assert!(ranked.is_empty());
    }
}
