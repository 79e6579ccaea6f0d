use crate::models::Interaction;
use crate::services::cache::{Lookup, RecommendationCache};
use crate::utils::metrics::{calculate_coverage, MetricsAccumulator, RankingMetrics};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub test_products: usize,
    pub evaluatable_products: usize,
    pub coverage: f64,
    pub metrics: Vec<RankingMetrics>,
}

impl EvaluationReport {
    pub fn at(&self, k: usize) -> Option<&RankingMetrics> {
        self.metrics.iter().find(|m| m.k == k)
    }
}

/// Splits by time: the earliest `train_fraction` of interactions train, the rest test.
pub fn temporal_split(
    interactions: &[Interaction],
    train_fraction: f64,
) -> (Vec<Interaction>, Vec<Interaction>) {
    let mut sorted = interactions.to_vec();
    sorted.sort_by(|a, b| {
        a.event_date
            .cmp(&b.event_date)
            .then(a.user_id.cmp(&b.user_id))
            .then(a.product_id.cmp(&b.product_id))
    });

    let split = (sorted.len() as f64 * train_fraction) as usize;
    let test = sorted.split_off(split);
    (sorted, test)
}

/// Compares each test product's cached top-k with the users who actually
/// interacted with it in `test`. Products without a cached ranking are not
/// evaluatable and only count against coverage.
pub fn evaluate(
    cache: &RecommendationCache,
    test: &[Interaction],
    k_values: &[usize],
) -> EvaluationReport {
    let mut true_users: BTreeMap<i64, HashSet<i64>> = BTreeMap::new();
    for interaction in test {
        true_users
            .entry(interaction.product_id)
            .or_default()
            .insert(interaction.user_id);
    }

    let mut accumulators: Vec<MetricsAccumulator> =
        k_values.iter().map(|&k| MetricsAccumulator::new(k)).collect();
    let mut evaluatable = 0usize;

    for (product_id, relevant) in &true_users {
        let Lookup::Product(list) = cache.lookup(*product_id) else {
            continue;
        };
        evaluatable += 1;

        let recommended: Vec<i64> = list.iter().map(|u| u.user_id).collect();
        for acc in &mut accumulators {
            acc.record(&recommended, relevant);
        }
    }

    let report = EvaluationReport {
        test_products: true_users.len(),
        evaluatable_products: evaluatable,
        coverage: calculate_coverage(evaluatable, true_users.len()),
        metrics: if evaluatable == 0 {
            Vec::new()
        } else {
            accumulators.iter().map(MetricsAccumulator::finish).collect()
        },
    };

    info!(
        "Evaluated {}/{} test products (coverage {:.1}%)",
        report.evaluatable_products,
        report.test_products,
        report.coverage * 100.0
    );
    for metrics in &report.metrics {
        info!(
            "Precision@{}: {:.4}  Recall@{}: {:.4}",
            metrics.k, metrics.precision, metrics.k, metrics.recall
        );
    }

    report
}
