pub mod activity;
pub mod candidates;
pub mod evaluation;
pub mod fallback;

use crate::models::*;
use crate::services::cache::RecommendationCache;
use activity::ActivityScorer;
use candidates::{order_by_activity, CandidateRanker};
use chrono::{DateTime, Utc};
use fallback::FallbackRanker;
use std::collections::BTreeMap;
use tracing::info;

/// A model that learns from an interaction history and precomputes a serving cache.
pub trait RankingModel: Send + Sync {
    fn train(&mut self, interactions: &[Interaction]);
    fn precompute(
        &self,
        top_n: usize,
        fallback_size: usize,
        trained_at: DateTime<Utc>,
    ) -> RecommendationCache;
}

/// Ranks users for each product by recent activity, skipping users who already
/// interacted with the product.
#[derive(Debug, Clone)]
pub struct ActivityBaseline {
    scorer: ActivityScorer,
    user_activity: Vec<UserActivity>,
    product_interactions: BTreeMap<i64, ProductInteractionSet>,
}

impl ActivityBaseline {
    pub fn new(recency_days: u32) -> Self {
        Self {
            scorer: ActivityScorer::new(recency_days),
            user_activity: Vec::new(),
            product_interactions: BTreeMap::new(),
        }
    }

    pub fn recency_days(&self) -> u32 {
        self.scorer.recency_days()
    }

    pub fn user_activity(&self) -> &[UserActivity] {
        &self.user_activity
    }

    pub fn product_interactions(&self) -> &BTreeMap<i64, ProductInteractionSet> {
        &self.product_interactions
    }
}

impl RankingModel for ActivityBaseline {
    /// Replaces any previous training state wholesale.
    fn train(&mut self, interactions: &[Interaction]) {
        info!("Training activity baseline on {} interactions", interactions.len());

        self.user_activity = self.scorer.score(interactions);

        let mut product_interactions: BTreeMap<i64, ProductInteractionSet> = BTreeMap::new();
        for interaction in interactions {
            product_interactions
                .entry(interaction.product_id)
                .or_default()
                .insert(interaction.user_id);
        }
        self.product_interactions = product_interactions;

        info!(
            "Training complete: {} users, {} products",
            self.user_activity.len(),
            self.product_interactions.len()
        );
    }

    fn precompute(
        &self,
        top_n: usize,
        fallback_size: usize,
        trained_at: DateTime<Utc>,
    ) -> RecommendationCache {
        info!(
            "Precomputing top-{} candidates for {} products",
            top_n,
            self.product_interactions.len()
        );

        let ordered = order_by_activity(&self.user_activity);
        let ranked = CandidateRanker::new(top_n).rank_all(&ordered, &self.product_interactions);
        let fallback = FallbackRanker::new(fallback_size).rank(&ordered);

        let metadata = CacheMetadata {
            model_type: MODEL_TYPE.to_string(),
            recency_window_days: self.recency_days(),
            trained_at,
            user_count: self.user_activity.len(),
            product_count: self.product_interactions.len(),
            top_n,
            fallback_size,
        };

        let cache = RecommendationCache::build(metadata, ranked, fallback);
        info!(
            "Generated {} recommendations, {} fallback users",
            cache.total_entries(),
            cache.fallback().len()
        );
        cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::Lookup;
    use chrono::{Duration, TimeZone};

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
    }

    /// Users 1, 2 and 3 end up with (recent_count, days_since) of (5, 0), (2, 3) and (1, 10).
    fn scenario_interactions() -> Vec<Interaction> {
        let mut interactions = Vec::new();
        for i in 0..5 {
            interactions.push(Interaction::new(1, 100 + i, reference() - Duration::hours(i)));
        }
        interactions.push(Interaction::new(2, 200, reference() - Duration::days(3)));
        interactions.push(Interaction::new(2, 201, reference() - Duration::days(4)));
        interactions.push(Interaction::new(3, 300, reference() - Duration::days(10)));
        interactions
    }

    fn trained() -> ActivityBaseline {
        let mut model = ActivityBaseline::new(30);
        model.train(&scenario_interactions());
        model
    }

    #[test]
    fn test_scenario_scores() {
        let model = trained();
        let scores: Vec<(i64, u64, u64, f64)> = model
            .user_activity()
            .iter()
            .map(|a| (a.user_id, a.recent_count, a.days_since, a.activity_score))
            .collect();

        assert_eq!(scores[0], (1, 5, 0, 5.0));
        assert_eq!(scores[1], (2, 2, 3, 0.5));
        assert_eq!((scores[2].0, scores[2].1, scores[2].2), (3, 1, 10));
        assert!((scores[2].3 - 1.0 / 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_product_interaction_sets() {
        let model = trained();
        assert_eq!(model.product_interactions().len(), 8);
        assert!(model.product_interactions()[&200].contains(&2));
        assert!(!model.product_interactions()[&200].contains(&1));
    }

    #[test]
    fn test_precompute_excludes_and_ranks() {
        let cache = trained().precompute(2, 3, reference());

        // user 1 interacted with 100, so 2 and 3 are the candidates
        match cache.lookup(100) {
            Lookup::Product(list) => {
                let ranked: Vec<(i64, u32)> = list.iter().map(|u| (u.user_id, u.rank)).collect();
                assert_eq!(ranked, vec![(2, 1), (3, 2)]);
            }
            Lookup::Fallback(_) => panic!("product 100 was trained"),
        }

        // user 2 interacted with 200
        match cache.lookup(200) {
            Lookup::Product(list) => {
                assert_eq!(list.iter().map(|u| u.user_id).collect::<Vec<_>>(), vec![1, 3]);
            }
            Lookup::Fallback(_) => panic!("product 200 was trained"),
        }

        assert_eq!(cache.fallback().iter().map(|u| u.user_id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(cache.metadata().product_count, 8);
        assert_eq!(cache.metadata().user_count, 3);
        assert_eq!(cache.metadata().recency_window_days, 30);
    }

    #[test]
    fn test_product_known_to_every_active_user() {
        let mut interactions = scenario_interactions();
        for user_id in 1..=3 {
            interactions.push(Interaction::new(user_id, 999, reference() - Duration::days(20)));
        }
        let mut model = ActivityBaseline::new(30);
        model.train(&interactions);

        let cache = model.precompute(10, 10, reference());
        assert!(matches!(cache.lookup(999), Lookup::Product(list) if list.is_empty()));
    }

    #[test]
    fn test_precompute_is_idempotent() {
        let interactions: Vec<Interaction> = (0..500)
            .map(|i| Interaction::new(i % 37, i % 23, reference() - Duration::hours(i * 5 % 1500)))
            .collect();

        let mut first = ActivityBaseline::new(14);
        first.train(&interactions);
        let mut second = ActivityBaseline::new(14);
        second.train(&interactions);

        let a = first.precompute(10, 20, reference());
        let b = second.precompute(10, 20, reference());
        assert_eq!(
            serde_json::to_vec(&a.to_artifact()).unwrap(),
            serde_json::to_vec(&b.to_artifact()).unwrap()
        );
    }

    #[test]
    fn test_retraining_replaces_state() {
        let mut model = trained();
        model.train(&[Interaction::new(42, 7, reference())]);
        assert_eq!(model.user_activity().len(), 1);
        assert_eq!(model.product_interactions().len(), 1);
    }
}
