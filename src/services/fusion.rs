use std::collections::HashMap;

use crate::models::profile::BehaviorProfile;
use crate::models::{ItemRef, Recommendation, RecommendationSource, TargetType};

/// Merges ranked lists from the three strategies into one deduplicated,
/// sorted list
///
/// Duplicate `(type, id)` entries keep the highest score; every contributing
/// source is recorded in the reason. The optional type filter applies after
/// fusion, then the list is truncated.
pub fn fuse(
    lists: Vec<Vec<Recommendation>>,
    limit: usize,
    type_filter: Option<TargetType>,
) -> Vec<Recommendation> {
    let mut merged: HashMap<ItemRef, (Recommendation, Vec<RecommendationSource>)> = HashMap::new();

    for recommendation in lists.into_iter().flatten() {
        match merged.get_mut(&recommendation.item) {
            Some((best, sources)) => {
                if !sources.contains(&recommendation.source) {
                    sources.push(recommendation.source);
                }
                if recommendation.score > best.score {
                    *best = recommendation;
                }
            }
            None => {
                let sources = vec![recommendation.source];
                merged.insert(recommendation.item, (recommendation, sources));
            }
        }
    }

    let mut fused: Vec<Recommendation> = merged
        .into_values()
        .map(|(mut best, sources)| {
            if sources.len() > 1 {
                let others: Vec<String> = sources
                    .iter()
                    .filter(|s| **s != best.source)
                    .map(|s| s.to_string())
                    .collect();
                best.reason = format!("{} (also via {})", best.reason, others.join(", "));
            }
            best
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.item.id.cmp(&b.item.id))
    });

    if let Some(target) = type_filter {
        fused.retain(|r| r.item.target_type == target);
    }

    fused.truncate(limit);
    fused
}

/// Confidence grows with the number of distinct profile signals, five points
/// each, capped at 100
pub fn confidence(profile: &BehaviorProfile) -> u8 {
    (5 * profile.signal_count()).min(100) as u8
}
