use super::candidates::{assign_ranks, ScoredUser};
use crate::models::RankedUser;

/// Product-independent ranking of the most active users, served for cold-start products.
#[derive(Debug, Clone)]
pub struct FallbackRanker {
    size: usize,
}

impl FallbackRanker {
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    /// No exclusion: a product without history has no interaction set to filter by.
    pub fn rank(&self, ordered: &[ScoredUser]) -> Vec<RankedUser> {
        assign_ranks(ordered.iter().take(self.size).copied())
    }
}
