use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::events::{DomainEvent, EventPublisher};
use crate::models::profile::{BehaviorProfile, TravelPattern};
use crate::models::{
    Feedback, ItemRef, Recommendation, RecommendationBatch, TargetType, Timeframe,
};
use crate::repos::{CatalogRepository, HistoryStore};

pub mod collaborative;
pub mod content_based;
pub mod fusion;
pub mod profile;
pub mod profile_cache;
pub mod search_intent;
pub mod trending;

use collaborative::CollaborativeRecommender;
use content_based::ContentBasedRecommender;
use profile_cache::ProfileCache;
use search_intent::{SearchClassifier, SearchIntent};
use trending::TrendingRecommender;

/// Timeframe used when trending feeds a personalized batch
const PERSONALIZED_TRENDING_WINDOW: Timeframe = Timeframe::SevenDays;

/// Read-only persona and travel-pattern summary over a user's profile
#[derive(Debug, Clone, Serialize)]
pub struct UserInsights {
    pub user_id: Uuid,
    pub persona: String,
    pub diversity_score: f64,
    pub activity_level: f64,
    pub social_level: f64,
    pub travel_pattern: TravelPattern,
    pub top_categories: Vec<(String, f64)>,
    pub top_destinations: Vec<(String, f64)>,
}

impl From<&BehaviorProfile> for UserInsights {
    fn from(profile: &BehaviorProfile) -> Self {
        Self {
            user_id: profile.user_id,
            persona: profile.persona.clone(),
            diversity_score: profile.diversity_score,
            activity_level: profile.activity_level,
            social_level: profile.social_level,
            travel_pattern: profile.travel_pattern.clone(),
            top_categories: profile.top_categories(5),
            top_destinations: profile.top_destinations(5),
        }
    }
}

/// Front door of the recommendation engine
///
/// Owns the three strategy recommenders, the shared profile cache, the
/// search classifier, and the history/event sinks.
pub struct RecommendationEngine {
    profiles: ProfileCache,
    content: ContentBasedRecommender,
    collaborative: CollaborativeRecommender,
    trending: TrendingRecommender,
    classifier: SearchClassifier,
    catalog: Arc<dyn CatalogRepository>,
    history: Arc<dyn HistoryStore>,
    events: EventPublisher,
}

impl RecommendationEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        profiles: ProfileCache,
        content: ContentBasedRecommender,
        collaborative: CollaborativeRecommender,
        trending: TrendingRecommender,
        classifier: SearchClassifier,
        catalog: Arc<dyn CatalogRepository>,
        history: Arc<dyn HistoryStore>,
        events: EventPublisher,
    ) -> Self {
        Self {
            profiles,
            content,
            collaborative,
            trending,
            classifier,
            catalog,
            history,
            events,
        }
    }

    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    /// Generates a personalized batch by fanning out to the three strategies
    /// and fusing their lists
    ///
    /// A user with an empty profile degrades to trending-only with zero
    /// confidence. A single failing strategy shrinks the result; the request
    /// only fails when every strategy does.
    pub async fn generate_personalized(
        &self,
        user_id: Uuid,
        limit: usize,
        type_filter: Option<TargetType>,
    ) -> AppResult<RecommendationBatch> {
        if limit == 0 {
            return Err(AppError::InvalidArgument(
                "limit must be at least 1".to_string(),
            ));
        }

        let profile = self.profiles.get(user_id).await?;

        let (content_list, collaborative_list, trending_list) = if profile.is_empty() {
            tracing::info!(user_id = %user_id, "Empty profile, degrading to trending only");
            let trending = self
                .trending
                .recommend(type_filter, PERSONALIZED_TRENDING_WINDOW, limit)
                .await?;
            (Vec::new(), Vec::new(), trending)
        } else {
            // The three strategies are data-independent once the profile
            // exists; run them concurrently and fan in to fusion
            let (content, collaborative, trending) = tokio::join!(
                self.content.recommend(&profile, limit),
                self.collaborative.recommend(&profile, limit),
                self.trending
                    .recommend(type_filter, PERSONALIZED_TRENDING_WINDOW, limit),
            );

            let mut failures = 0;
            let content = strategy_result(content, "content", &mut failures);
            let collaborative = strategy_result(collaborative, "collaborative", &mut failures);
            let trending = strategy_result(trending, "trending", &mut failures);

            if failures == 3 {
                return Err(AppError::Upstream(
                    "all recommendation strategies failed".to_string(),
                ));
            }

            (content, collaborative, trending)
        };

        let recommendations = fusion::fuse(
            vec![content_list, collaborative_list, trending_list],
            limit,
            type_filter,
        );
        let confidence = if profile.is_empty() {
            0
        } else {
            fusion::confidence(&profile)
        };

        let batch = RecommendationBatch {
            id: Uuid::new_v4(),
            user_id,
            recommendations,
            confidence,
            profile_snapshot_id: profile.snapshot_id,
            generated_at: Utc::now(),
        };

        tracing::info!(
            user_id = %user_id,
            batch_id = %batch.id,
            recommendation_count = batch.recommendations.len(),
            confidence = batch.confidence,
            "Generated recommendation batch"
        );

        // History persistence is best effort and off the request path
        let history = self.history.clone();
        let to_record = batch.clone();
        tokio::spawn(async move {
            if let Err(e) = history.record_batch(to_record).await {
                tracing::warn!(error = %e, "Failed to persist recommendation batch");
            }
        });

        self.events.publish(DomainEvent::BatchGenerated {
            batch_id: batch.id,
            user_id,
            recommendation_count: batch.recommendations.len(),
            confidence: batch.confidence,
        });

        Ok(batch)
    }

    /// Content-based ranking anchored on a single catalog item
    pub async fn similar_items(
        &self,
        item: ItemRef,
        limit: usize,
    ) -> AppResult<Vec<Recommendation>> {
        if limit == 0 {
            return Err(AppError::InvalidArgument(
                "limit must be at least 1".to_string(),
            ));
        }

        let anchor = self
            .catalog
            .item(item)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no such item: {}", item)))?;

        self.content.similar_to(&anchor, limit).await
    }

    /// Engagement-weighted trending, no user context
    pub async fn trending(
        &self,
        target: Option<TargetType>,
        timeframe: Timeframe,
        limit: usize,
    ) -> AppResult<Vec<Recommendation>> {
        if limit == 0 {
            return Err(AppError::InvalidArgument(
                "limit must be at least 1".to_string(),
            ));
        }
        self.trending.recommend(target, timeframe, limit).await
    }

    /// Search intent classification with merged suggestions
    pub async fn classify_search(&self, query: &str, limit: usize) -> AppResult<SearchIntent> {
        self.classifier.classify_with_suggestions(query, limit).await
    }

    /// Records feedback against a previously generated batch
    ///
    /// The batch must exist and contain the item; feedback is append-only
    /// and not consumed by the engine itself.
    pub async fn record_feedback(
        &self,
        batch_id: Uuid,
        item: ItemRef,
        rating: u8,
        helpful: bool,
        reason: Option<String>,
    ) -> AppResult<Feedback> {
        if !(1..=5).contains(&rating) {
            return Err(AppError::InvalidArgument(
                "rating must be between 1 and 5".to_string(),
            ));
        }

        let batch = self
            .history
            .get_batch(batch_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no such batch: {}", batch_id)))?;

        if !batch.recommendations.iter().any(|r| r.item == item) {
            return Err(AppError::NotFound(format!(
                "item {} is not part of batch {}",
                item, batch_id
            )));
        }

        let feedback = Feedback {
            batch_id,
            item,
            rating,
            helpful,
            reason,
            submitted_at: Utc::now(),
        };

        self.history.record_feedback(feedback.clone()).await?;

        self.events.publish(DomainEvent::FeedbackRecorded {
            batch_id,
            item,
            helpful,
        });

        Ok(feedback)
    }

    /// Persona and pattern summary for one user
    pub async fn user_insights(&self, user_id: Uuid) -> AppResult<UserInsights> {
        let profile = self.profiles.get(user_id).await?;
        Ok(UserInsights::from(profile.as_ref()))
    }

    /// Evicts the cached profile after new activity was ingested
    pub async fn invalidate_profile(&self, user_id: Uuid) {
        self.profiles.invalidate(user_id).await;
    }
}

/// Collapses a strategy failure into an empty list, counting it
fn strategy_result(
    result: AppResult<Vec<Recommendation>>,
    strategy: &str,
    failures: &mut usize,
) -> Vec<Recommendation> {
    match result {
        Ok(list) => list,
        Err(e) => {
            *failures += 1;
            tracing::warn!(strategy = strategy, error = %e, "Strategy failed, continuing without it");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::PersonaRules;
    use crate::models::{CandidateItem, ContentItem, Engagement, RecommendationSource};
    use crate::repos::{
        MockActivityRepository, MockCatalogRepository, MockHistoryStore,
    };
    use crate::services::profile::ProfileBuilder;
    use std::time::Duration;

    fn fresh_content(likes: u64) -> CandidateItem {
        CandidateItem::Content(ContentItem {
            id: Uuid::new_v4(),
            category: "Adventure".to_string(),
            destination: None,
            tags: vec![],
            engagement: Engagement {
                likes,
                ..Default::default()
            },
            created_at: Utc::now(),
        })
    }

    fn engine_for_empty_user(catalog: MockCatalogRepository) -> RecommendationEngine {
        let mut activity = MockActivityRepository::new();
        activity.expect_events_for_user().returning(|_| Ok(vec![]));
        activity.expect_follow_count().returning(|_| Ok(0));
        activity
            .expect_recent_active_users()
            .returning(|_, _| Ok(vec![]));
        let activity: Arc<dyn crate::repos::ActivityRepository> = Arc::new(activity);

        let catalog: Arc<dyn CatalogRepository> = Arc::new(catalog);

        let mut history = MockHistoryStore::new();
        history.expect_record_batch().returning(|_| Ok(()));
        let history: Arc<dyn HistoryStore> = Arc::new(history);

        let builder = ProfileBuilder::new(activity.clone(), PersonaRules::default());
        let profiles = ProfileCache::new(builder, None, Duration::from_secs(60));

        RecommendationEngine::new(
            profiles.clone(),
            ContentBasedRecommender::new(catalog.clone()),
            CollaborativeRecommender::new(activity, catalog.clone(), profiles, 100, 4),
            TrendingRecommender::new(catalog.clone(), None, 300),
            SearchClassifier::with_catalog(catalog.clone()),
            catalog,
            history,
            EventPublisher::default(),
        )
    }

    #[tokio::test]
    async fn test_zero_activity_user_gets_trending_only_with_zero_confidence() {
        let trending_item = fresh_content(10);
        let items = vec![trending_item];
        let mut catalog = MockCatalogRepository::new();
        catalog
            .expect_created_since()
            .returning(move |_, _| Ok(items.clone()));

        let engine = engine_for_empty_user(catalog);
        let batch = engine
            .generate_personalized(Uuid::new_v4(), 10, None)
            .await
            .unwrap();

        assert_eq!(batch.confidence, 0);
        assert!(!batch.recommendations.is_empty());
        assert!(batch
            .recommendations
            .iter()
            .all(|r| r.source == RecommendationSource::Trending));
    }

    #[tokio::test]
    async fn test_zero_limit_is_rejected() {
        let engine = engine_for_empty_user(MockCatalogRepository::new());
        let err = engine
            .generate_personalized(Uuid::new_v4(), 0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_similar_items_unknown_anchor_is_not_found() {
        let mut catalog = MockCatalogRepository::new();
        catalog.expect_item().returning(|_| Ok(None));

        let engine = engine_for_empty_user(catalog);
        let err = engine
            .similar_items(ItemRef::content(Uuid::new_v4()), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_feedback_rating_out_of_range_is_rejected() {
        let engine = engine_for_empty_user(MockCatalogRepository::new());
        let err = engine
            .record_feedback(Uuid::new_v4(), ItemRef::content(Uuid::new_v4()), 9, true, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_feedback_for_unknown_batch_is_not_found() {
        let mut activity = MockActivityRepository::new();
        activity.expect_events_for_user().returning(|_| Ok(vec![]));
        activity.expect_follow_count().returning(|_| Ok(0));
        let activity: Arc<dyn crate::repos::ActivityRepository> = Arc::new(activity);

        let catalog: Arc<dyn CatalogRepository> = Arc::new(MockCatalogRepository::new());

        let mut history = MockHistoryStore::new();
        history.expect_get_batch().returning(|_| Ok(None));
        let history: Arc<dyn HistoryStore> = Arc::new(history);

        let builder = ProfileBuilder::new(activity.clone(), PersonaRules::default());
        let profiles = ProfileCache::new(builder, None, Duration::from_secs(60));

        let engine = RecommendationEngine::new(
            profiles.clone(),
            ContentBasedRecommender::new(catalog.clone()),
            CollaborativeRecommender::new(activity, catalog.clone(), profiles, 100, 4),
            TrendingRecommender::new(catalog.clone(), None, 300),
            SearchClassifier::with_catalog(catalog.clone()),
            catalog,
            history,
            EventPublisher::default(),
        );

        let err = engine
            .record_feedback(Uuid::new_v4(), ItemRef::content(Uuid::new_v4()), 4, true, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
