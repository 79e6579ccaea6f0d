use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const MODEL_TYPE: &str = "activity_baseline";
pub const RESPONSE_SCHEMA_VERSION: u32 = 1;

/// One row of the canonical interaction table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: i64,
    pub product_id: i64,
    pub event_date: DateTime<Utc>,
}

impl Interaction {
    pub fn new(user_id: i64, product_id: i64, event_date: DateTime<Utc>) -> Self {
        Self {
            user_id,
            product_id,
            event_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserActivity {
    pub user_id: i64,
    pub recent_count: u64,
    pub last_seen: DateTime<Utc>,
    pub days_since: u64,
    pub activity_score: f64,
}

/// Users that have ever interacted with a product.
pub type ProductInteractionSet = HashSet<i64>;

/// A user in a ranked list. Ranks are dense and 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankedUser {
    pub user_id: i64,
    pub score: f64,
    pub rank: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendationEntry {
    pub product_id: i64,
    pub user_id: i64,
    pub score: f64,
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub model_type: String,
    pub recency_window_days: u32,
    pub trained_at: DateTime<Utc>,
    pub user_count: usize,
    pub product_count: usize,
    pub top_n: usize,
    pub fallback_size: usize,
}

/// Where a served list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    ProductHistory,
    ColdStartFallback,
}

impl RecommendationSource {
    pub fn note(&self) -> &'static str {
        match self {
            RecommendationSource::ProductHistory => {
                "Ranked from this product's own history: \
                 most recently active users who have not interacted with it."
            }
            RecommendationSource::ColdStartFallback => {
                "Cold-start fallback: no history for this product, \
                 returning globally most active users."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub schema_version: u32,
    pub product_id: i64,
    pub recommendations: Vec<RankedUser>,
    pub count: usize,
    pub available: usize,
    pub source: RecommendationSource,
    pub note: String,
}

impl RecommendationResponse {
    pub fn new(
        product_id: i64,
        recommendations: Vec<RankedUser>,
        available: usize,
        source: RecommendationSource,
    ) -> Self {
        Self {
            schema_version: RESPONSE_SCHEMA_VERSION,
            product_id,
            count: recommendations.len(),
            recommendations,
            available,
            source,
            note: source.note().to_string(),
        }
    }

    pub fn is_cold_start(&self) -> bool {
        self.source == RecommendationSource::ColdStartFallback
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub products: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub model_type: String,
    pub recency_window_days: u32,
    pub trained_at: DateTime<Utc>,
    pub user_count: usize,
    pub product_count: usize,
    pub available_products: usize,
    pub cached_recommendations: usize,
    pub fallback_size: usize,
    pub requests_total: u64,
    pub cold_start_total: u64,
    pub rejected_total: u64,
    pub max_latency_us: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleProductsResponse {
    pub sample_products: Vec<i64>,
    pub total_available: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_count_matches_recommendations() {
        let recs = vec![
            RankedUser { user_id: 1, score: 2.0, rank: 1 },
            RankedUser { user_id: 2, score: 1.0, rank: 2 },
        ];
        let response =
            RecommendationResponse::new(7, recs, 5, RecommendationSource::ProductHistory);
        assert_eq!(response.count, 2);
        assert_eq!(response.available, 5);
        assert!(!response.is_cold_start());
    }

    #[test]
    fn test_source_serializes_as_snake_case() {
        let json = serde_json::to_value(RecommendationSource::ColdStartFallback).unwrap();
        assert_eq!(json, "cold_start_fallback");

        let response =
            RecommendationResponse::new(3, Vec::new(), 0, RecommendationSource::ColdStartFallback);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["schema_version"], 1);
        assert_eq!(json["source"], "cold_start_fallback");
        assert!(json["note"].as_str().unwrap().contains("Cold-start"));
    }
}
