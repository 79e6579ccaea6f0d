use crate::models::{Interaction, UserActivity};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// `recent_count / (days_since + 1)`.
pub fn activity_score(recent_count: u64, days_since: u64) -> f64 {
    recent_count as f64 / (days_since as f64 + 1.0)
}

/// Latest event in the history. All recency is measured against this,
/// never against the wall clock.
pub fn reference_time(interactions: &[Interaction]) -> Option<DateTime<Utc>> {
    interactions.iter().map(|i| i.event_date).max()
}

#[derive(Debug, Clone)]
pub struct ActivityScorer {
    recency_days: u32,
}

impl ActivityScorer {
    pub fn new(recency_days: u32) -> Self {
        Self { recency_days }
    }

    pub fn recency_days(&self) -> u32 {
        self.recency_days
    }

    /// Scores every distinct user in `interactions`, ordered by user id.
    pub fn score(&self, interactions: &[Interaction]) -> Vec<UserActivity> {
        let Some(reference) = reference_time(interactions) else {
            return Vec::new();
        };
        let cutoff = reference - Duration::days(i64::from(self.recency_days));

        let mut per_user: BTreeMap<i64, (u64, DateTime<Utc>)> = BTreeMap::new();
        for interaction in interactions {
            let recent = u64::from(interaction.event_date >= cutoff);
            per_user
                .entry(interaction.user_id)
                .and_modify(|(count, last_seen)| {
                    *count += recent;
                    if interaction.event_date > *last_seen {
                        *last_seen = interaction.event_date;
                    }
                })
                .or_insert((recent, interaction.event_date));
        }

        per_user
            .into_iter()
            .map(|(user_id, (recent_count, last_seen))| {
                // num_days truncates toward zero, which is a floor for a non-negative span
                let days_since = (reference - last_seen).num_days().max(0) as u64;
                UserActivity {
                    user_id,
                    recent_count,
                    last_seen,
                    days_since,
                    activity_score: activity_score(recent_count, days_since),
                }
            })
            .collect()
    }
}
