//! On-disk layout of a trained cache.
//!
//! `recommendations.json` holds the rankings in columnar form and carries no
//! timestamps, so identical training runs write identical bytes.
//! `metadata.json` holds provenance.

use serde::{Deserialize, Serialize};

pub const FORMAT_VERSION: u32 = 1;
pub const RECOMMENDATIONS_FILE: &str = "recommendations.json";
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationTable {
    pub product_id: Vec<i64>,
    pub user_id: Vec<i64>,
    pub score: Vec<f64>,
    pub rank: Vec<u32>,
}

impl RecommendationTable {
    pub fn with_capacity(rows: usize) -> Self {
        Self {
            product_id: Vec::with_capacity(rows),
            user_id: Vec::with_capacity(rows),
            score: Vec::with_capacity(rows),
            rank: Vec::with_capacity(rows),
        }
    }

    pub fn rows(&self) -> usize {
        self.product_id.len()
    }

    pub fn columns_aligned(&self) -> bool {
        let rows = self.rows();
        self.user_id.len() == rows && self.score.len() == rows && self.rank.len() == rows
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FallbackTable {
    pub user_id: Vec<i64>,
    pub score: Vec<f64>,
    pub rank: Vec<u32>,
}

impl FallbackTable {
    pub fn columns_aligned(&self) -> bool {
        self.score.len() == self.user_id.len() && self.rank.len() == self.user_id.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheArtifact {
    pub format_version: u32,
    /// Every product with a ranking, ascending. Products whose candidates were
    /// all excluded appear here with no rows in `table`.
    pub products: Vec<i64>,
    pub table: RecommendationTable,
    pub fallback: FallbackTable,
}
