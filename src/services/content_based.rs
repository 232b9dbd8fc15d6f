use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::AppResult;
use crate::models::profile::BehaviorProfile;
use crate::models::{CandidateItem, ItemRef, Recommendation, RecommendationSource};
use crate::repos::CatalogRepository;

const CATEGORY_WEIGHT: f64 = 0.3;
const DESTINATION_WEIGHT: f64 = 0.25;
const TAG_WEIGHT: f64 = 0.1;
const LIKE_WEIGHT: f64 = 0.01;
const COMMENT_WEIGHT: f64 = 0.02;
const VIEW_WEIGHT: f64 = 0.001;
const RECENCY_WEIGHT: f64 = 0.02;
const RECENCY_HORIZON_DAYS: f64 = 30.0;

const TOP_CATEGORIES: usize = 5;
const TOP_DESTINATIONS: usize = 5;
const TOP_TAGS: usize = 10;

/// Scores catalog candidates against a user's preference frequencies
pub struct ContentBasedRecommender {
    catalog: Arc<dyn CatalogRepository>,
}

impl ContentBasedRecommender {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }

    /// Recommends items matching the profile's strongest signals
    ///
    /// Already-seen items are not filtered here; fusion owns dedup.
    pub async fn recommend(
        &self,
        profile: &BehaviorProfile,
        limit: usize,
    ) -> AppResult<Vec<Recommendation>> {
        if profile.is_empty() {
            return Ok(Vec::new());
        }

        let categories: Vec<String> = profile
            .top_categories(TOP_CATEGORIES)
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        let destinations: Vec<String> = profile
            .top_destinations(TOP_DESTINATIONS)
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        let tags: Vec<String> = profile
            .top_tags(TOP_TAGS)
            .into_iter()
            .map(|(k, _)| k)
            .collect();

        let candidates = self
            .catalog
            .candidates_matching(categories, destinations, tags)
            .await?;

        tracing::debug!(
            user_id = %profile.user_id,
            candidate_count = candidates.len(),
            "Scoring content-based candidates"
        );

        let now = Utc::now();
        let mut scored: Vec<Recommendation> = candidates
            .iter()
            .map(|item| Recommendation {
                item: item.item_ref(),
                source: RecommendationSource::Content,
                score: score_candidate(profile, item, now),
                reason: describe_match(profile, item),
            })
            .collect();

        sort_with_recency_ties(&mut scored, &candidates);
        scored.truncate(limit);
        Ok(scored)
    }

    /// Ranks catalog items by similarity to a single anchor item
    ///
    /// The anchor's own category/destination/tags act as a one-item profile.
    pub async fn similar_to(
        &self,
        anchor: &CandidateItem,
        limit: usize,
    ) -> AppResult<Vec<Recommendation>> {
        let mut pseudo = BehaviorProfile::empty(uuid::Uuid::nil(), String::new());
        pseudo
            .category_freq
            .insert(anchor.category().to_string(), 1.0);
        if let Some(destination) = anchor.destination() {
            pseudo
                .destination_freq
                .insert(destination.to_string(), 1.0);
        }
        for tag in anchor.tags() {
            pseudo.tag_freq.insert(tag.clone(), 1.0);
        }

        let categories = vec![anchor.category().to_string()];
        let destinations: Vec<String> =
            anchor.destination().map(|d| d.to_string()).into_iter().collect();
        let tags = anchor.tags().to_vec();

        let anchor_ref = anchor.item_ref();
        let candidates: Vec<CandidateItem> = self
            .catalog
            .candidates_matching(categories, destinations, tags)
            .await?
            .into_iter()
            .filter(|item| item.item_ref() != anchor_ref)
            .collect();

        let now = Utc::now();
        let mut scored: Vec<Recommendation> = candidates
            .iter()
            .map(|item| Recommendation {
                item: item.item_ref(),
                source: RecommendationSource::Content,
                score: score_candidate(&pseudo, item, now),
                reason: format!("similar to {}", anchor_ref),
            })
            .collect();

        sort_with_recency_ties(&mut scored, &candidates);
        scored.truncate(limit);
        Ok(scored)
    }
}

/// Fixed linear scoring formula over profile match strength, engagement,
/// and recency
pub fn score_candidate(
    profile: &BehaviorProfile,
    item: &CandidateItem,
    now: DateTime<Utc>,
) -> f64 {
    let mut score = 0.0;

    if let Some(freq) = profile.category_freq.get(item.category()) {
        score += CATEGORY_WEIGHT * freq;
    }
    if let Some(freq) = item
        .destination()
        .and_then(|d| profile.destination_freq.get(d))
    {
        score += DESTINATION_WEIGHT * freq;
    }
    for tag in item.tags() {
        if let Some(freq) = profile.tag_freq.get(tag) {
            score += TAG_WEIGHT * freq;
        }
    }

    let engagement = item.engagement();
    score += LIKE_WEIGHT * engagement.likes as f64;
    score += COMMENT_WEIGHT * engagement.comments as f64;
    score += VIEW_WEIGHT * engagement.views as f64;

    score += (RECENCY_WEIGHT * (RECENCY_HORIZON_DAYS - item.age_days(now))).max(0.0);

    score
}

/// Sorts descending by score, breaking ties with the newer item first
fn sort_with_recency_ties(scored: &mut [Recommendation], candidates: &[CandidateItem]) {
    let created: std::collections::HashMap<ItemRef, DateTime<Utc>> = candidates
        .iter()
        .map(|c| (c.item_ref(), c.created_at()))
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| created.get(&b.item).cmp(&created.get(&a.item)))
    });
}

fn describe_match(profile: &BehaviorProfile, item: &CandidateItem) -> String {
    if profile.category_freq.contains_key(item.category()) {
        return format!("matches your interest in {}", item.category());
    }
    if let Some(destination) = item.destination() {
        if profile.destination_freq.contains_key(destination) {
            return format!("fits your trips to {}", destination);
        }
    }
    "shares tags with items you engage with".to_string()
}
