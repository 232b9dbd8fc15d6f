use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::profile::BehaviorProfile;
use crate::models::{Recommendation, RecommendationSource};
use crate::repos::{ActivityRepository, CatalogRepository, PeerEngagementKind};
use crate::services::profile_cache::ProfileCache;

/// Minimum similarity for a user to count as a peer
const SIMILARITY_THRESHOLD: f64 = 0.3;
/// How many peers feed the candidate aggregation
const MAX_PEERS: usize = 10;

const AUTHORED_WEIGHT: f64 = 2.0;
const LIKED_WEIGHT: f64 = 1.0;

/// Recommends items engaged by behaviorally similar users
///
/// The per-peer profile builds go through the shared singleflight cache, so
/// overlapping requests never duplicate the expensive aggregation.
pub struct CollaborativeRecommender {
    activity: Arc<dyn ActivityRepository>,
    catalog: Arc<dyn CatalogRepository>,
    profiles: ProfileCache,
    peer_pool_size: usize,
    peer_concurrency: usize,
}

impl CollaborativeRecommender {
    pub fn new(
        activity: Arc<dyn ActivityRepository>,
        catalog: Arc<dyn CatalogRepository>,
        profiles: ProfileCache,
        peer_pool_size: usize,
        peer_concurrency: usize,
    ) -> Self {
        Self {
            activity,
            catalog,
            profiles,
            peer_pool_size,
            peer_concurrency: peer_concurrency.max(1),
        }
    }

    pub async fn recommend(
        &self,
        profile: &BehaviorProfile,
        limit: usize,
    ) -> AppResult<Vec<Recommendation>> {
        if profile.is_empty() {
            return Ok(Vec::new());
        }

        let pool = self
            .activity
            .recent_active_users(profile.user_id, self.peer_pool_size)
            .await?;
        if pool.is_empty() {
            return Ok(Vec::new());
        }

        let peers = self.rank_peers(profile, pool).await;
        if peers.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(
            user_id = %profile.user_id,
            peer_count = peers.len(),
            "Aggregating peer engagement"
        );

        let exclusions = self.catalog.engaged_refs(profile.user_id).await?;
        let peer_ids: Vec<Uuid> = peers.iter().map(|(id, _)| *id).collect();
        let engagements = self.catalog.items_engaged_by(peer_ids).await?;

        let similarity: HashMap<Uuid, f64> = peers.into_iter().collect();
        let mut scores: HashMap<crate::models::ItemRef, f64> = HashMap::new();

        for engagement in engagements {
            if exclusions.contains(&engagement.item) {
                continue;
            }
            let weight = match engagement.kind {
                PeerEngagementKind::Authored => AUTHORED_WEIGHT,
                PeerEngagementKind::Liked => LIKED_WEIGHT,
            };
            if let Some(sim) = similarity.get(&engagement.peer) {
                *scores.entry(engagement.item).or_insert(0.0) += sim * weight;
            }
        }

        let mut ranked: Vec<Recommendation> = scores
            .into_iter()
            .map(|(item, score)| Recommendation {
                item,
                source: RecommendationSource::Collaborative,
                score,
                reason: "popular with travelers whose taste matches yours".to_string(),
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.item.id.cmp(&b.item.id))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// Builds peer profiles with a bounded fan-out and keeps the closest ones
    ///
    /// A failed peer build shrinks the pool instead of failing the request.
    async fn rank_peers(&self, profile: &BehaviorProfile, pool: Vec<Uuid>) -> Vec<(Uuid, f64)> {
        let semaphore = Arc::new(Semaphore::new(self.peer_concurrency));
        let mut tasks = Vec::with_capacity(pool.len());

        for peer_id in pool {
            let profiles = self.profiles.clone();
            let semaphore = semaphore.clone();
            let task = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                match profiles.get(peer_id).await {
                    Ok(peer_profile) => Some((peer_id, peer_profile)),
                    Err(e) => {
                        tracing::warn!(peer_id = %peer_id, error = %e, "Skipping peer, profile build failed");
                        None
                    }
                }
            });
            tasks.push(task);
        }

        let mut scored: Vec<(Uuid, f64)> = Vec::new();
        for task in tasks {
            let Ok(Some((peer_id, peer_profile))) = task.await else {
                continue;
            };
            let similarity = cosine_similarity(profile, &peer_profile);
            if similarity > SIMILARITY_THRESHOLD {
                scored.push((peer_id, similarity));
            }
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(MAX_PEERS);
        scored
    }
}

/// Cosine similarity between two profiles over the union of their
/// category/destination/tag frequency vectors
///
/// Frequencies are non-negative, so the result lands in [0, 1]; the measure
/// is symmetric by construction.
pub fn cosine_similarity(a: &BehaviorProfile, b: &BehaviorProfile) -> f64 {
    let va = preference_vector(a);
    let vb = preference_vector(b);

    let keys: HashSet<&String> = va.keys().chain(vb.keys()).collect();

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for key in keys {
        let x = va.get(key).copied().unwrap_or(0.0);
        let y = vb.get(key).copied().unwrap_or(0.0);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Flattens a profile into one namespaced frequency vector
fn preference_vector(profile: &BehaviorProfile) -> HashMap<String, f64> {
    let mut vector = HashMap::with_capacity(
        profile.category_freq.len() + profile.destination_freq.len() + profile.tag_freq.len(),
    );
    for (key, value) in &profile.category_freq {
        vector.insert(format!("cat:{}", key), *value);
    }
    for (key, value) in &profile.destination_freq {
        vector.insert(format!("dest:{}", key), *value);
    }
    for (key, value) in &profile.tag_freq {
        vector.insert(format!("tag:{}", key), *value);
    }
    vector
}
