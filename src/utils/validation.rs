use crate::models::*;
use anyhow::{anyhow, Result};
use std::collections::HashSet;

/// Checks a requested list length against `[1, max_n]` and returns it as a usize.
pub fn validate_requested_count(n: i64, max_n: usize) -> Result<usize> {
    if n < 1 {
        return Err(anyhow!("n must be at least 1, got {}", n));
    }

    let n = usize::try_from(n).map_err(|_| anyhow!("n is too large: {}", n))?;
    if n > max_n {
        return Err(anyhow!("n must be at most {}, got {}", max_n, n));
    }

    Ok(n)
}

/// A ranked list must have ranks 1..=len, finite non-negative scores, and follow
/// ranking order: score descending, equal scores by ascending user id. Each user
/// appears at most once.
pub fn validate_ranked_list(list: &[RankedUser]) -> Result<()> {
    let mut seen = HashSet::with_capacity(list.len());

    for (i, entry) in list.iter().enumerate() {
        let expected = i as u32 + 1;
        if entry.rank != expected {
            return Err(anyhow!("rank {} found where {} was expected", entry.rank, expected));
        }

        if !entry.score.is_finite() || entry.score < 0.0 {
            return Err(anyhow!("user {} has invalid score {}", entry.user_id, entry.score));
        }

        if !seen.insert(entry.user_id) {
            return Err(anyhow!("user {} is listed more than once", entry.user_id));
        }

        if let Some(prev) = i.checked_sub(1).map(|p| &list[p]) {
            if entry.score > prev.score {
                return Err(anyhow!("score increases at rank {}", entry.rank));
            }
            if entry.score == prev.score && entry.user_id < prev.user_id {
                return Err(anyhow!(
                    "tied users {} and {} are out of user id order at rank {}",
                    prev.user_id,
                    entry.user_id,
                    entry.rank
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(entries: &[(i64, f64, u32)]) -> Vec<RankedUser> {
        entries
            .iter()
            .map(|&(user_id, score, rank)| RankedUser { user_id, score, rank })
            .collect()
    }

    #[test]
    fn test_validate_requested_count() {
        assert_eq!(validate_requested_count(1, 100).unwrap(), 1);
        assert_eq!(validate_requested_count(100, 100).unwrap(), 100);
        assert!(validate_requested_count(0, 100).is_err());
        assert!(validate_requested_count(-5, 100).is_err());
        assert!(validate_requested_count(1000, 100).is_err());
    }

    #[test]
    fn test_validate_ranked_list() {
        assert!(validate_ranked_list(&[]).is_ok());
        assert!(validate_ranked_list(&ranked(&[(1, 2.0, 1), (2, 2.0, 2), (3, 0.0, 3)])).is_ok());

        // sparse ranks
        assert!(validate_ranked_list(&ranked(&[(1, 2.0, 1), (2, 1.0, 3)])).is_err());
        // not starting at 1
        assert!(validate_ranked_list(&ranked(&[(1, 2.0, 2)])).is_err());
        // increasing score
        assert!(validate_ranked_list(&ranked(&[(1, 1.0, 1), (2, 2.0, 2)])).is_err());
        // invalid scores
        assert!(validate_ranked_list(&ranked(&[(1, f64::NAN, 1)])).is_err());
        assert!(validate_ranked_list(&ranked(&[(1, -1.0, 1)])).is_err());
    }

    #[test]
    fn test_validate_ranked_list_tie_break_and_duplicates() {
        // equal scores must run in ascending user id order
        assert!(validate_ranked_list(&ranked(&[(5, 1.0, 1), (3, 1.0, 2)])).is_err());
        assert!(validate_ranked_list(&ranked(&[(9, 3.0, 1), (3, 1.0, 2), (5, 1.0, 3)])).is_ok());

        assert!(validate_ranked_list(&ranked(&[(4, 2.0, 1), (4, 1.0, 2)])).is_err());
        assert!(validate_ranked_list(&ranked(&[(4, 2.0, 1), (6, 2.0, 2), (4, 2.0, 3)])).is_err());
    }
}
