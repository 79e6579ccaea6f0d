use crate::models::{ProductInteractionSet, RankedUser, UserActivity};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A user and score in global ranking order.
pub type ScoredUser = (i64, f64);

/// Orders users by descending activity score, ties by ascending user id.
///
/// This is the only sort in precomputation; every product scans the result.
pub fn order_by_activity(activity: &[UserActivity]) -> Vec<ScoredUser> {
    let mut ordered: Vec<ScoredUser> = activity
        .iter()
        .map(|a| (a.user_id, a.activity_score))
        .collect();
    ordered.sort_by(compare_scored);
    ordered
}

pub(crate) fn compare_scored(a: &ScoredUser, b: &ScoredUser) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

/// Assigns dense 1-based ranks in iteration order.
pub(crate) fn assign_ranks<I>(users: I) -> Vec<RankedUser>
where
    I: Iterator<Item = ScoredUser>,
{
    users
        .enumerate()
        .map(|(i, (user_id, score))| RankedUser {
            user_id,
            score,
            rank: i as u32 + 1,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct CandidateRanker {
    top_n: usize,
}

impl CandidateRanker {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// First `top_n` users of `ordered` that are not in `excluded`.
    /// A short or empty list is the genuine candidate count.
    pub fn rank_product(
        &self,
        ordered: &[ScoredUser],
        excluded: &ProductInteractionSet,
    ) -> Vec<RankedUser> {
        assign_ranks(
            ordered
                .iter()
                .filter(|(user_id, _)| !excluded.contains(user_id))
                .take(self.top_n)
                .copied(),
        )
    }

    /// Ranks candidates for every product, in ascending product id order.
    pub fn rank_all(
        &self,
        ordered: &[ScoredUser],
        products: &BTreeMap<i64, ProductInteractionSet>,
    ) -> Vec<(i64, Vec<RankedUser>)> {
        let products: Vec<(&i64, &ProductInteractionSet)> = products.iter().collect();

        products
            .par_iter()
            .map(|(product_id, interacted)| (**product_id, self.rank_product(ordered, interacted)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashSet;

    fn activity(user_id: i64, recent_count: u64, days_since: u64) -> UserActivity {
        UserActivity {
            user_id,
            recent_count,
            last_seen: Utc::now(),
            days_since,
            activity_score: crate::algorithms::activity::activity_score(recent_count, days_since),
        }
    }

    fn set(users: &[i64]) -> ProductInteractionSet {
        users.iter().copied().collect::<HashSet<_>>()
    }

    #[test]
    fn test_ordering_breaks_ties_by_user_id() {
        let users = vec![
            activity(9, 2, 1),
            activity(3, 1, 0),
            activity(5, 4, 3),
            activity(1, 0, 4),
        ];
        let ordered = order_by_activity(&users);
        assert_eq!(ordered.iter().map(|u| u.0).collect::<Vec<_>>(), vec![3, 5, 9, 1]);
    }

    #[test]
    fn test_scenario_product_without_prior_interactions() {
        let users = vec![activity(1, 5, 0), activity(2, 2, 3), activity(3, 1, 10)];
        let ordered = order_by_activity(&users);

        let ranked = CandidateRanker::new(2).rank_product(&ordered, &set(&[]));
        assert_eq!(ranked.len(), 2);
        assert_eq!((ranked[0].user_id, ranked[0].score, ranked[0].rank), (1, 5.0, 1));
        assert_eq!((ranked[1].user_id, ranked[1].score, ranked[1].rank), (2, 0.5, 2));
    }

    #[test]
    fn test_excludes_interacted_users_and_ranks_densely() {
        let users: Vec<UserActivity> = (1..=6).map(|u| activity(u, 7 - u as u64, 0)).collect();
        let ordered = order_by_activity(&users);

        let ranked = CandidateRanker::new(3).rank_product(&ordered, &set(&[1, 3]));
        assert_eq!(ranked.iter().map(|r| r.user_id).collect::<Vec<_>>(), vec![2, 4, 5]);
        assert_eq!(ranked.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_short_list_when_most_users_excluded() {
        let users = vec![activity(1, 3, 0), activity(2, 2, 0), activity(3, 0, 40)];
        let ordered = order_by_activity(&users);

        let ranked = CandidateRanker::new(10).rank_product(&ordered, &set(&[1, 2]));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].user_id, 3);
        assert_eq!(ranked[0].score, 0.0);

        let ranked = CandidateRanker::new(10).rank_product(&ordered, &set(&[1, 2, 3]));
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_rank_all_matches_single_product_ranking() {
        let users: Vec<UserActivity> = (1..=50)
            .map(|u| activity(u, (u % 7) as u64, (u % 5) as u64))
            .collect();
        let ordered = order_by_activity(&users);

        let mut products = BTreeMap::new();
        for product_id in (0..20).rev() {
            let interacted: Vec<i64> = (1..=50).filter(|u| u % (product_id + 2) == 0).collect();
            products.insert(product_id, set(&interacted));
        }

        let ranker = CandidateRanker::new(8);
        let all = ranker.rank_all(&ordered, &products);

        assert_eq!(all.iter().map(|(p, _)| *p).collect::<Vec<_>>(), (0..20).collect::<Vec<_>>());
        for (product_id, ranked) in &all {
            let excluded = &products[product_id];
            assert_eq!(ranked, &ranker.rank_product(&ordered, excluded));
            assert!(ranked.iter().all(|r| !excluded.contains(&r.user_id)));
            for pair in ranked.windows(2) {
                assert!(pair[0].score >= pair[1].score);
                assert_eq!(pair[0].rank + 1, pair[1].rank);
            }
        }
    }
}
