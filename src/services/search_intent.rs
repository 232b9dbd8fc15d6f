use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AppResult;
use crate::models::TargetType;
use crate::repos::CatalogRepository;

/// Curated keyword sets, pairwise disjoint. A query token matching a set
/// votes for that category.
const DESTINATION_TERMS: &[&str] = &[
    "beach", "island", "coast", "mountain", "mountains", "alps", "city", "desert", "lake",
    "fjord", "jungle", "reef", "paris", "tokyo", "bali", "lisbon", "iceland", "patagonia",
];

const ACTIVITY_TERMS: &[&str] = &[
    "hiking", "trekking", "surfing", "diving", "snorkeling", "skiing", "kayaking", "climbing",
    "cycling", "camping", "sailing", "safari", "rafting",
];

const CONTENT_TERMS: &[&str] = &[
    "guide", "tips", "itinerary", "review", "blog", "story", "photos", "checklist", "budget",
    "packing",
];

/// Suggestion category a query can map to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchCategory {
    Destinations,
    Activities,
    Content,
    General,
}

/// One typed-ahead suggestion with its ranking weight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    pub relevance: f64,
}

/// Classifier output: matched categories, confidence, merged suggestions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchIntent {
    pub categories: Vec<SearchCategory>,
    pub confidence: f64,
    pub suggestions: Vec<Suggestion>,
}

impl SearchIntent {
    fn empty() -> Self {
        Self {
            categories: Vec::new(),
            confidence: 0.0,
            suggestions: Vec::new(),
        }
    }
}

/// Pluggable per-category suggestion provider
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    fn category(&self) -> SearchCategory;

    async fn suggest(&self, query: &str, limit: usize) -> AppResult<Vec<Suggestion>>;
}

/// Maps free text to suggestion categories and fans out to the matching
/// suggestion sources
pub struct SearchClassifier {
    sources: Vec<Arc<dyn SuggestionSource>>,
}

impl SearchClassifier {
    pub fn new(sources: Vec<Arc<dyn SuggestionSource>>) -> Self {
        Self { sources }
    }

    /// Default source set backed by the catalog
    pub fn with_catalog(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self::new(vec![
            Arc::new(DestinationSuggestions::new(catalog.clone())),
            Arc::new(ActivitySuggestions),
            Arc::new(ContentSuggestions::new(catalog)),
            Arc::new(GeneralSuggestions),
        ])
    }

    /// Pure classification step: matched keyword sets and confidence
    pub fn classify(query: &str) -> (Vec<SearchCategory>, f64) {
        let tokens: Vec<String> = query
            .split_whitespace()
            .map(|t| {
                t.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|t| !t.is_empty())
            .collect();

        let mut categories = Vec::new();
        if tokens.iter().any(|t| DESTINATION_TERMS.contains(&t.as_str())) {
            categories.push(SearchCategory::Destinations);
        }
        if tokens.iter().any(|t| ACTIVITY_TERMS.contains(&t.as_str())) {
            categories.push(SearchCategory::Activities);
        }
        if tokens.iter().any(|t| CONTENT_TERMS.contains(&t.as_str())) {
            categories.push(SearchCategory::Content);
        }
        if categories.is_empty() {
            categories.push(SearchCategory::General);
        }

        let confidence = (0.3 * categories.len() as f64).min(1.0);
        (categories, confidence)
    }

    /// Full classification: queries under two characters yield the empty
    /// intent; a failing source is skipped, never fatal
    pub async fn classify_with_suggestions(
        &self,
        query: &str,
        limit: usize,
    ) -> AppResult<SearchIntent> {
        let trimmed = query.trim();
        if trimmed.chars().count() < 2 {
            return Ok(SearchIntent::empty());
        }

        let (categories, confidence) = Self::classify(trimmed);

        let mut suggestions = Vec::new();
        for source in &self.sources {
            if !categories.contains(&source.category()) {
                continue;
            }
            match source.suggest(trimmed, limit).await {
                Ok(batch) => suggestions.extend(batch),
                Err(e) => {
                    tracing::warn!(
                        category = ?source.category(),
                        error = %e,
                        "Suggestion source failed, skipping"
                    );
                }
            }
        }

        suggestions.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.text.cmp(&b.text))
        });
        suggestions.truncate(limit);

        Ok(SearchIntent {
            categories,
            confidence,
            suggestions,
        })
    }
}

/// Destination suggestions from booking demand
pub struct DestinationSuggestions {
    catalog: Arc<dyn CatalogRepository>,
}

impl DestinationSuggestions {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl SuggestionSource for DestinationSuggestions {
    fn category(&self) -> SearchCategory {
        SearchCategory::Destinations
    }

    async fn suggest(&self, _query: &str, limit: usize) -> AppResult<Vec<Suggestion>> {
        let destinations = self.catalog.top_destinations(limit).await?;
        let max = destinations
            .first()
            .map(|(_, count)| (*count).max(1))
            .unwrap_or(1);

        Ok(destinations
            .into_iter()
            .map(|(destination, count)| Suggestion {
                text: format!("Trips to {}", destination),
                relevance: count as f64 / max as f64,
            })
            .collect())
    }
}

/// Curated activity suggestions; tokens from the query float matching
/// entries to the top
pub struct ActivitySuggestions;

#[async_trait]
impl SuggestionSource for ActivitySuggestions {
    fn category(&self) -> SearchCategory {
        SearchCategory::Activities
    }

    async fn suggest(&self, query: &str, limit: usize) -> AppResult<Vec<Suggestion>> {
        let query = query.to_lowercase();
        let mut suggestions: Vec<Suggestion> = ACTIVITY_TERMS
            .iter()
            .enumerate()
            .map(|(rank, term)| {
                let base = 0.8 - rank as f64 * 0.02;
                let boost = if query.contains(term) { 0.2 } else { 0.0 };
                Suggestion {
                    text: format!("Best {} trips", term),
                    relevance: base + boost,
                }
            })
            .collect();

        suggestions.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        suggestions.truncate(limit);
        Ok(suggestions)
    }
}

/// Content suggestions from the largest content categories
pub struct ContentSuggestions {
    catalog: Arc<dyn CatalogRepository>,
}

impl ContentSuggestions {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl SuggestionSource for ContentSuggestions {
    fn category(&self) -> SearchCategory {
        SearchCategory::Content
    }

    async fn suggest(&self, _query: &str, limit: usize) -> AppResult<Vec<Suggestion>> {
        let categories = self
            .catalog
            .top_categories(TargetType::Content, limit)
            .await?;
        let max = categories
            .first()
            .map(|(_, count)| (*count).max(1))
            .unwrap_or(1);

        Ok(categories
            .into_iter()
            .map(|(category, count)| Suggestion {
                text: format!("{} guides and stories", category),
                relevance: 0.9 * count as f64 / max as f64,
            })
            .collect())
    }
}

/// Fallback starters for queries that match no curated set
pub struct GeneralSuggestions;

#[async_trait]
impl SuggestionSource for GeneralSuggestions {
    fn category(&self) -> SearchCategory {
        SearchCategory::General
    }

    async fn suggest(&self, query: &str, limit: usize) -> AppResult<Vec<Suggestion>> {
        let mut suggestions = vec![
            Suggestion {
                text: format!("{} travel ideas", query),
                relevance: 0.5,
            },
            Suggestion {
                text: "Popular destinations right now".to_string(),
                relevance: 0.4,
            },
            Suggestion {
                text: "Trending trip packages".to_string(),
                relevance: 0.3,
            },
        ];
        suggestions.truncate(limit);
        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_keyword_sets_are_disjoint() {
        for term in DESTINATION_TERMS {
            assert!(!ACTIVITY_TERMS.contains(term), "{} in two sets", term);
            assert!(!CONTENT_TERMS.contains(term), "{} in two sets", term);
        }
        for term in ACTIVITY_TERMS {
            assert!(!CONTENT_TERMS.contains(term), "{} in two sets", term);
        }
    }

    #[test]
    fn test_classify_reference_scenario() {
        let (categories, confidence) = SearchClassifier::classify("best beach hiking guide");
        assert_eq!(
            categories,
            vec![
                SearchCategory::Destinations,
                SearchCategory::Activities,
                SearchCategory::Content
            ]
        );
        assert!((confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_classify_is_case_insensitive_and_strips_punctuation() {
        let (categories, _) = SearchClassifier::classify("BEACH, please!");
        assert_eq!(categories, vec![SearchCategory::Destinations]);
    }

    #[test]
    fn test_unmatched_query_falls_back_to_general() {
        let (categories, confidence) = SearchClassifier::classify("quarterly report");
        assert_eq!(categories, vec![SearchCategory::General]);
        assert!((confidence - 0.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_short_query_yields_empty_intent() {
        let classifier = SearchClassifier::new(vec![Arc::new(GeneralSuggestions)]);
        let intent = classifier.classify_with_suggestions("a", 5).await.unwrap();
        assert!(intent.categories.is_empty());
        assert_eq!(intent.confidence, 0.0);
        assert!(intent.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_suggestions_are_merged_and_sorted() {
        struct Fixed(SearchCategory, Vec<(&'static str, f64)>);

        #[async_trait]
        impl SuggestionSource for Fixed {
            fn category(&self) -> SearchCategory {
                self.0
            }
            async fn suggest(&self, _query: &str, _limit: usize) -> AppResult<Vec<Suggestion>> {
                Ok(self
                    .1
                    .iter()
                    .map(|(text, relevance)| Suggestion {
                        text: text.to_string(),
                        relevance: *relevance,
                    })
                    .collect())
            }
        }

        let classifier = SearchClassifier::new(vec![
            Arc::new(Fixed(
                SearchCategory::Destinations,
                vec![("low", 0.2), ("high", 0.9)],
            )),
            Arc::new(Fixed(SearchCategory::Activities, vec![("mid", 0.5)])),
        ]);

        let intent = classifier
            .classify_with_suggestions("beach hiking", 2)
            .await
            .unwrap();
        assert_eq!(intent.suggestions.len(), 2);
        assert_eq!(intent.suggestions[0].text, "high");
        assert_eq!(intent.suggestions[1].text, "mid");
    }

    #[tokio::test]
    async fn test_failing_source_is_skipped() {
        struct Broken;

        #[async_trait]
        impl SuggestionSource for Broken {
            fn category(&self) -> SearchCategory {
                SearchCategory::Destinations
            }
            async fn suggest(&self, _query: &str, _limit: usize) -> AppResult<Vec<Suggestion>> {
                Err(AppError::Upstream("catalog down".to_string()))
            }
        }

        let classifier = SearchClassifier::new(vec![Arc::new(Broken)]);
        let intent = classifier
            .classify_with_suggestions("beach", 5)
            .await
            .unwrap();

        assert_eq!(intent.categories, vec![SearchCategory::Destinations]);
        assert!(intent.suggestions.is_empty());
    }
}
