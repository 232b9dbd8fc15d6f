use chrono::{Datelike, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::profile::{
    BehaviorProfile, BookingFrequency, PersonaRules, Season, TravelPattern,
};
use crate::models::{ActivityEvent, ActivityKind};
use crate::repos::ActivityRepository;

/// Preference weight an activity kind contributes to category/destination
/// frequencies; views carry no preference signal
fn kind_weight(kind: ActivityKind) -> f64 {
    match kind {
        ActivityKind::Authored => 3.0,
        ActivityKind::Booked => 2.0,
        ActivityKind::Liked | ActivityKind::Commented => 1.0,
        ActivityKind::Viewed => 0.0,
    }
}

/// Aggregates a user's raw activity log into a weighted behavior profile
pub struct ProfileBuilder {
    activity: Arc<dyn ActivityRepository>,
    persona_rules: PersonaRules,
}

impl ProfileBuilder {
    pub fn new(activity: Arc<dyn ActivityRepository>, persona_rules: PersonaRules) -> Self {
        Self {
            activity,
            persona_rules,
        }
    }

    /// Builds a fresh profile from the activity log
    ///
    /// A user with no recorded activity gets a zero-valued profile, never an
    /// error.
    pub async fn build(&self, user_id: Uuid) -> AppResult<BehaviorProfile> {
        let events = self.activity.events_for_user(user_id).await?;
        let follows_given = self.activity.follow_count(user_id).await?;

        tracing::debug!(
            user_id = %user_id,
            event_count = events.len(),
            "Building behavior profile"
        );

        Ok(self.build_from_events(user_id, &events, follows_given))
    }

    /// Pure aggregation over an event slice, oldest first
    pub fn build_from_events(
        &self,
        user_id: Uuid,
        events: &[ActivityEvent],
        follows_given: u64,
    ) -> BehaviorProfile {
        if events.is_empty() {
            return BehaviorProfile::empty(user_id, self.persona_rules.fallback.clone());
        }

        let mut category_freq: HashMap<String, f64> = HashMap::new();
        let mut destination_freq: HashMap<String, f64> = HashMap::new();
        let mut tag_freq: HashMap<String, f64> = HashMap::new();
        let mut total_weighted = 0.0;
        let mut comments_given = 0u64;

        for event in events {
            let weight = kind_weight(event.kind);
            total_weighted += weight;

            if event.kind == ActivityKind::Commented {
                comments_given += 1;
            }

            if weight > 0.0 {
                if let Some(category) = &event.category {
                    *category_freq.entry(category.clone()).or_insert(0.0) += weight;
                }
                if let Some(destination) = &event.destination {
                    *destination_freq.entry(destination.clone()).or_insert(0.0) += weight;
                }
            }

            // Tags always count once per occurrence, whatever the kind
            for tag in &event.tags {
                *tag_freq.entry(tag.clone()).or_insert(0.0) += 1.0;
            }
        }

        let diversity_score = normalized_entropy(&category_freq);
        let travel_pattern = build_travel_pattern(events);
        let activity_level = (total_weighted * 2.0).min(100.0);
        let social_level = (((follows_given * 3 + comments_given) as f64) * 2.0).min(100.0);
        let persona =
            self.persona_rules
                .classify(diversity_score, activity_level, travel_pattern.avg_budget);

        BehaviorProfile {
            user_id,
            snapshot_id: Uuid::new_v4(),
            category_freq,
            destination_freq,
            tag_freq,
            diversity_score,
            travel_pattern,
            activity_level,
            social_level,
            persona,
            built_at: Utc::now(),
        }
    }
}

/// Shannon entropy over the frequency distribution, normalized by log2(k)
///
/// Defined only with at least two categories; 0 otherwise.
fn normalized_entropy(freq: &HashMap<String, f64>) -> f64 {
    let k = freq.len();
    if k < 2 {
        return 0.0;
    }

    let total: f64 = freq.values().sum();
    if total <= 0.0 {
        return 0.0;
    }

    let entropy: f64 = freq
        .values()
        .filter(|v| **v > 0.0)
        .map(|v| {
            let p = v / total;
            -p * p.log2()
        })
        .sum();

    (entropy / (k as f64).log2()).clamp(0.0, 1.0)
}

/// Booking habit aggregates; events must be ordered oldest first
fn build_travel_pattern(events: &[ActivityEvent]) -> TravelPattern {
    let mut bookings: Vec<&ActivityEvent> = events
        .iter()
        .filter(|e| e.kind == ActivityKind::Booked)
        .collect();
    bookings.sort_by_key(|e| e.occurred_at);

    if bookings.is_empty() {
        return TravelPattern::default();
    }

    let mut season_counts: HashMap<Season, u32> = HashMap::new();
    for booking in &bookings {
        *season_counts
            .entry(Season::from_month(booking.occurred_at.month()))
            .or_insert(0) += 1;
    }
    let mut seasons: Vec<(Season, u32)> = season_counts.into_iter().collect();
    seasons.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| (a.0 as u8).cmp(&(b.0 as u8))));
    let preferred_seasons: Vec<Season> = seasons.into_iter().take(2).map(|(s, _)| s).collect();

    let amounts: Vec<f64> = bookings.iter().filter_map(|b| b.amount).collect();
    let (avg_budget, budget_range) = if amounts.is_empty() {
        (0.0, (0.0, 0.0))
    } else {
        let sum: f64 = amounts.iter().sum();
        let min = amounts.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = amounts.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        (sum / amounts.len() as f64, (min, max))
    };

    let durations: Vec<f64> = bookings
        .iter()
        .filter_map(|b| b.duration_days.map(|d| d as f64))
        .collect();
    let avg_duration_days = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<f64>() / durations.len() as f64
    };

    let group_sizes: Vec<f64> = bookings
        .iter()
        .filter_map(|b| b.group_size.map(|g| g as f64))
        .collect();
    let preferred_group_size = if group_sizes.is_empty() {
        0
    } else {
        (group_sizes.iter().sum::<f64>() / group_sizes.len() as f64).round() as u32
    };

    let booking_frequency = classify_booking_frequency(&bookings);

    TravelPattern {
        preferred_seasons,
        avg_budget,
        budget_range,
        avg_duration_days,
        preferred_group_size,
        booking_frequency,
    }
}

/// Mean inter-booking gap: under 30 days High, under 90 Medium, else Low.
/// A single booking is classified by recency instead.
fn classify_booking_frequency(bookings: &[&ActivityEvent]) -> BookingFrequency {
    if bookings.len() == 1 {
        let days_since = (Utc::now() - bookings[0].occurred_at).num_days();
        return if days_since <= 90 {
            BookingFrequency::Medium
        } else {
            BookingFrequency::Low
        };
    }

    let gap_days: Vec<f64> = bookings
        .windows(2)
        .map(|pair| (pair[1].occurred_at - pair[0].occurred_at).num_seconds() as f64 / 86_400.0)
        .collect();
    let mean_gap = gap_days.iter().sum::<f64>() / gap_days.len() as f64;

    if mean_gap < 30.0 {
        BookingFrequency::High
    } else if mean_gap < 90.0 {
        BookingFrequency::Medium
    } else {
        BookingFrequency::Low
    }
}
