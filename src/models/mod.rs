use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

pub mod profile;

/// Kind of catalog item a reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Content,
    Package,
}

impl std::str::FromStr for TargetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "content" => Ok(TargetType::Content),
            "package" => Ok(TargetType::Package),
            other => Err(format!("unknown item type: {}", other)),
        }
    }
}

impl Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetType::Content => write!(f, "content"),
            TargetType::Package => write!(f, "package"),
        }
    }
}

/// Typed reference to a catalog item, used as the dedup/exclusion key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    pub target_type: TargetType,
    pub id: Uuid,
}

impl ItemRef {
    pub fn content(id: Uuid) -> Self {
        Self {
            target_type: TargetType::Content,
            id,
        }
    }

    pub fn package(id: Uuid) -> Self {
        Self {
            target_type: TargetType::Package,
            id,
        }
    }
}

impl Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.target_type, self.id)
    }
}

/// What a user did to an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Authored,
    Liked,
    Commented,
    Booked,
    Viewed,
}

impl std::str::FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "authored" => Ok(ActivityKind::Authored),
            "liked" => Ok(ActivityKind::Liked),
            "commented" => Ok(ActivityKind::Commented),
            "booked" => Ok(ActivityKind::Booked),
            "viewed" => Ok(ActivityKind::Viewed),
            other => Err(format!("unknown activity kind: {}", other)),
        }
    }
}

/// One append-only entry in the user activity log
///
/// `duration_days` and `group_size` are only populated on booking events;
/// they feed the travel pattern aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub user_id: Uuid,
    pub kind: ActivityKind,
    pub target: ItemRef,
    pub category: Option<String>,
    pub destination: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub amount: Option<f64>,
    pub duration_days: Option<u32>,
    pub group_size: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// Engagement counters carried by catalog items
///
/// `bookings` and `rating` are only meaningful for packages; content items
/// leave them at their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Engagement {
    pub likes: u64,
    pub comments: u64,
    pub views: u64,
    #[serde(default)]
    pub bookings: u64,
    #[serde(default)]
    pub rating: Option<f64>,
}

/// A piece of authored content (article, guide, trip report)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub category: String,
    pub destination: Option<String>,
    pub tags: Vec<String>,
    pub engagement: Engagement,
    pub created_at: DateTime<Utc>,
}

/// A bookable travel package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageItem {
    pub id: Uuid,
    pub category: String,
    pub destination: Option<String>,
    pub tags: Vec<String>,
    pub engagement: Engagement,
    pub created_at: DateTime<Utc>,
}

/// Candidate for recommendation, either content or a package
///
/// The variants expose a shared capability surface so the recommenders never
/// branch on a type string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CandidateItem {
    Content(ContentItem),
    Package(PackageItem),
}

impl CandidateItem {
    pub fn item_ref(&self) -> ItemRef {
        match self {
            CandidateItem::Content(c) => ItemRef::content(c.id),
            CandidateItem::Package(p) => ItemRef::package(p.id),
        }
    }

    pub fn target_type(&self) -> TargetType {
        match self {
            CandidateItem::Content(_) => TargetType::Content,
            CandidateItem::Package(_) => TargetType::Package,
        }
    }

    pub fn category(&self) -> &str {
        match self {
            CandidateItem::Content(c) => &c.category,
            CandidateItem::Package(p) => &p.category,
        }
    }

    pub fn destination(&self) -> Option<&str> {
        match self {
            CandidateItem::Content(c) => c.destination.as_deref(),
            CandidateItem::Package(p) => p.destination.as_deref(),
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            CandidateItem::Content(c) => &c.tags,
            CandidateItem::Package(p) => &p.tags,
        }
    }

    pub fn engagement(&self) -> &Engagement {
        match self {
            CandidateItem::Content(c) => &c.engagement,
            CandidateItem::Package(p) => &p.engagement,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            CandidateItem::Content(c) => c.created_at,
            CandidateItem::Package(p) => p.created_at,
        }
    }

    /// Fractional age in days relative to `now`, floored at zero
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        let secs = (now - self.created_at()).num_seconds();
        (secs.max(0) as f64) / 86_400.0
    }
}

/// Which strategy produced a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationSource {
    Content,
    Collaborative,
    Trending,
}

impl Display for RecommendationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecommendationSource::Content => write!(f, "content"),
            RecommendationSource::Collaborative => write!(f, "collaborative"),
            RecommendationSource::Trending => write!(f, "trending"),
        }
    }
}

/// A single scored recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub item: ItemRef,
    pub source: RecommendationSource,
    pub score: f64,
    pub reason: String,
}

/// Immutable result of one personalized generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationBatch {
    pub id: Uuid,
    pub user_id: Uuid,
    pub recommendations: Vec<Recommendation>,
    /// 0..=100, derived from how many profile signals backed the run
    pub confidence: u8,
    pub profile_snapshot_id: Uuid,
    pub generated_at: DateTime<Utc>,
}

/// User feedback on a previously generated batch, append-only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub batch_id: Uuid,
    pub item: ItemRef,
    pub rating: u8,
    pub helpful: bool,
    pub reason: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Lookback window for trending computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
    #[serde(rename = "90d")]
    NinetyDays,
}

impl Timeframe {
    pub fn window_days(&self) -> u32 {
        match self {
            Timeframe::OneDay => 1,
            Timeframe::SevenDays => 7,
            Timeframe::ThirtyDays => 30,
            Timeframe::NinetyDays => 90,
        }
    }
}

impl std::str::FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1d" => Ok(Timeframe::OneDay),
            "7d" => Ok(Timeframe::SevenDays),
            "30d" => Ok(Timeframe::ThirtyDays),
            "90d" => Ok(Timeframe::NinetyDays),
            other => Err(format!("unknown timeframe: {}", other)),
        }
    }
}

impl Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timeframe::OneDay => write!(f, "1d"),
            Timeframe::SevenDays => write!(f, "7d"),
            Timeframe::ThirtyDays => write!(f, "30d"),
            Timeframe::NinetyDays => write!(f, "90d"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn content_item(category: &str) -> CandidateItem {
        CandidateItem::Content(ContentItem {
            id: Uuid::new_v4(),
            category: category.to_string(),
            destination: Some("Lisbon".to_string()),
            tags: vec!["coast".to_string()],
            engagement: Engagement {
                likes: 4,
                comments: 1,
                views: 90,
                ..Default::default()
            },
            created_at: Utc::now(),
        })
    }

    #[test]
    fn test_item_ref_display() {
        let id = Uuid::nil();
        let r = ItemRef::content(id);
        assert_eq!(
            format!("{}", r),
            "content:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_target_type_parse() {
        assert_eq!("content".parse::<TargetType>(), Ok(TargetType::Content));
        assert_eq!("Package".parse::<TargetType>(), Ok(TargetType::Package));
        assert!("playlist".parse::<TargetType>().is_err());
    }

    #[test]
    fn test_timeframe_parse_and_window() {
        assert_eq!("7d".parse::<Timeframe>(), Ok(Timeframe::SevenDays));
        assert_eq!(Timeframe::NinetyDays.window_days(), 90);
        assert!("2w".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_candidate_capability_surface() {
        let item = content_item("Adventure");
        assert_eq!(item.category(), "Adventure");
        assert_eq!(item.destination(), Some("Lisbon"));
        assert_eq!(item.tags(), ["coast".to_string()]);
        assert_eq!(item.engagement().likes, 4);
        assert_eq!(item.target_type(), TargetType::Content);
    }

    #[test]
    fn test_age_days_floors_future_items_at_zero() {
        let now = Utc::now();
        let item = CandidateItem::Package(PackageItem {
            id: Uuid::new_v4(),
            category: "Beach".to_string(),
            destination: None,
            tags: vec![],
            engagement: Engagement::default(),
            created_at: now + Duration::hours(6),
        });
        assert_eq!(item.age_days(now), 0.0);
    }

    #[test]
    fn test_timeframe_serde_round_trip() {
        let json = serde_json::to_string(&Timeframe::ThirtyDays).unwrap();
        assert_eq!(json, r#""30d""#);
        let parsed: Timeframe = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Timeframe::ThirtyDays);
    }
}
