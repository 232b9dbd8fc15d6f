use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Quarterly season bucket for booking months
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    /// Maps a 1-based month to its quarterly bucket (Dec-Feb = Winter)
    pub fn from_month(month: u32) -> Self {
        match month {
            12 | 1 | 2 => Season::Winter,
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            _ => Season::Autumn,
        }
    }
}

/// How often a user books, derived from mean inter-booking gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingFrequency {
    High,
    Medium,
    Low,
}

/// Aggregated booking habits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelPattern {
    /// Top seasons by booking count, at most two
    pub preferred_seasons: Vec<Season>,
    pub avg_budget: f64,
    pub budget_range: (f64, f64),
    pub avg_duration_days: f64,
    pub preferred_group_size: u32,
    pub booking_frequency: BookingFrequency,
}

impl Default for TravelPattern {
    fn default() -> Self {
        Self {
            preferred_seasons: Vec::new(),
            avg_budget: 0.0,
            budget_range: (0.0, 0.0),
            avg_duration_days: 0.0,
            preferred_group_size: 0,
            booking_frequency: BookingFrequency::Low,
        }
    }
}

/// Weighted statistical summary of one user's activity
///
/// Cacheable; a fresh `snapshot_id` is minted on every build so batches can
/// record exactly which profile state they were generated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorProfile {
    pub user_id: Uuid,
    pub snapshot_id: Uuid,
    pub category_freq: HashMap<String, f64>,
    pub destination_freq: HashMap<String, f64>,
    pub tag_freq: HashMap<String, f64>,
    /// Normalized Shannon entropy over category_freq, 0 with < 2 categories
    pub diversity_score: f64,
    pub travel_pattern: TravelPattern,
    pub activity_level: f64,
    pub social_level: f64,
    pub persona: String,
    pub built_at: DateTime<Utc>,
}

impl BehaviorProfile {
    /// Zero-valued profile for users with no recorded activity
    pub fn empty(user_id: Uuid, persona: String) -> Self {
        Self {
            user_id,
            snapshot_id: Uuid::new_v4(),
            category_freq: HashMap::new(),
            destination_freq: HashMap::new(),
            tag_freq: HashMap::new(),
            diversity_score: 0.0,
            travel_pattern: TravelPattern::default(),
            activity_level: 0.0,
            social_level: 0.0,
            persona,
            built_at: Utc::now(),
        }
    }

    /// True when no preference signal exists at all
    pub fn is_empty(&self) -> bool {
        self.category_freq.is_empty()
            && self.destination_freq.is_empty()
            && self.tag_freq.is_empty()
    }

    pub fn top_categories(&self, n: usize) -> Vec<(String, f64)> {
        top_n(&self.category_freq, n)
    }

    pub fn top_destinations(&self, n: usize) -> Vec<(String, f64)> {
        top_n(&self.destination_freq, n)
    }

    pub fn top_tags(&self, n: usize) -> Vec<(String, f64)> {
        top_n(&self.tag_freq, n)
    }

    /// Count of distinct non-zero signals backing this profile; feeds the
    /// batch confidence estimate
    pub fn signal_count(&self) -> usize {
        let activity_bucket = if self.activity_level > 0.0 { 1 } else { 0 };
        self.category_freq.len() + self.travel_pattern.preferred_seasons.len() + activity_bucket
    }
}

/// Highest-frequency entries, ties broken by key for determinism
fn top_n(freq: &HashMap<String, f64>, n: usize) -> Vec<(String, f64)> {
    let mut entries: Vec<(String, f64)> = freq.iter().map(|(k, v)| (k.clone(), *v)).collect();
    entries.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    entries.truncate(n);
    entries
}

/// One persona classification rule; all present bounds must hold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaRule {
    pub persona: String,
    #[serde(default)]
    pub min_diversity: Option<f64>,
    #[serde(default)]
    pub max_diversity: Option<f64>,
    #[serde(default)]
    pub min_activity: Option<f64>,
    #[serde(default)]
    pub min_budget: Option<f64>,
}

impl PersonaRule {
    fn matches(&self, diversity: f64, activity: f64, avg_budget: f64) -> bool {
        self.min_diversity.map_or(true, |m| diversity >= m)
            && self.max_diversity.map_or(true, |m| diversity <= m)
            && self.min_activity.map_or(true, |m| activity >= m)
            && self.min_budget.map_or(true, |m| avg_budget >= m)
    }
}

/// Ordered persona rule table; first matching rule wins
///
/// The thresholds are product configuration, not algorithm: deployments
/// override the default table via `PERSONA_RULES`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaRules {
    pub rules: Vec<PersonaRule>,
    pub fallback: String,
}

impl Default for PersonaRules {
    fn default() -> Self {
        Self {
            rules: vec![
                PersonaRule {
                    persona: "explorer".to_string(),
                    min_diversity: Some(0.6),
                    max_diversity: None,
                    min_activity: Some(60.0),
                    min_budget: None,
                },
                PersonaRule {
                    persona: "luxury-traveler".to_string(),
                    min_diversity: None,
                    max_diversity: None,
                    min_activity: None,
                    min_budget: Some(3000.0),
                },
                PersonaRule {
                    persona: "frequent-traveler".to_string(),
                    min_diversity: None,
                    max_diversity: None,
                    min_activity: Some(60.0),
                    min_budget: None,
                },
                PersonaRule {
                    persona: "casual-traveler".to_string(),
                    min_diversity: None,
                    max_diversity: None,
                    min_activity: Some(20.0),
                    min_budget: None,
                },
            ],
            fallback: "newcomer".to_string(),
        }
    }
}

impl PersonaRules {
    pub fn classify(&self, diversity: f64, activity: f64, avg_budget: f64) -> String {
        self.rules
            .iter()
            .find(|rule| rule.matches(diversity, activity, avg_budget))
            .map(|rule| rule.persona.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}
