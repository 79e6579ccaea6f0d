use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Offline ranking quality at a single cutoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingMetrics {
    pub k: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    k: usize,
}

impl MetricsCalculator {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    fn hits(&self, recommended: &[i64], relevant: &HashSet<i64>) -> usize {
        recommended
            .iter()
            .take(self.k)
            .filter(|user| relevant.contains(user))
            .count()
    }

    /// Hits divided by `k`, so a short list is penalised for the slots it could not fill.
    pub fn calculate_precision_at_k(&self, recommended: &[i64], relevant: &HashSet<i64>) -> f64 {
        if self.k == 0 {
            return 0.0;
        }
        self.hits(recommended, relevant) as f64 / self.k as f64
    }

    pub fn calculate_recall_at_k(&self, recommended: &[i64], relevant: &HashSet<i64>) -> f64 {
        if relevant.is_empty() {
            return 0.0;
        }
        self.hits(recommended, relevant) as f64 / relevant.len() as f64
    }

    pub fn calculate_f1_score(&self, precision: f64, recall: f64) -> f64 {
        if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    }
}

/// Running mean of per-query precision and recall at one cutoff.
#[derive(Debug, Clone)]
pub struct MetricsAccumulator {
    calculator: MetricsCalculator,
    precision_sum: f64,
    recall_sum: f64,
    queries: usize,
}

impl MetricsAccumulator {
    pub fn new(k: usize) -> Self {
        Self {
            calculator: MetricsCalculator::new(k),
            precision_sum: 0.0,
            recall_sum: 0.0,
            queries: 0,
        }
    }

    pub fn record(&mut self, recommended: &[i64], relevant: &HashSet<i64>) {
        self.precision_sum += self.calculator.calculate_precision_at_k(recommended, relevant);
        self.recall_sum += self.calculator.calculate_recall_at_k(recommended, relevant);
        self.queries += 1;
    }

    pub fn finish(&self) -> RankingMetrics {
        let (precision, recall) = if self.queries == 0 {
            (0.0, 0.0)
        } else {
            (
                self.precision_sum / self.queries as f64,
                self.recall_sum / self.queries as f64,
            )
        };

        RankingMetrics {
            k: self.calculator.k(),
            precision,
            recall,
            f1_score: self.calculator.calculate_f1_score(precision, recall),
        }
    }
}

pub fn calculate_coverage(evaluatable: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        evaluatable as f64 / total as f64
    }
}
