pub mod artifact;

use crate::models::*;
use crate::utils::{validation::validate_ranked_list, write_atomic};
use artifact::{
    CacheArtifact, FallbackTable, RecommendationTable, FORMAT_VERSION, METADATA_FILE,
    RECOMMENDATIONS_FILE,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache artifact not found at {0}")]
    Missing(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed cache artifact {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported cache format version {0} (expected {})", FORMAT_VERSION)]
    UnsupportedVersion(u32),
    #[error("invalid cache artifact: {0}")]
    Invalid(String),
    #[error("failed to write cache artifact: {0:#}")]
    Persist(anyhow::Error),
}

/// Result of a product lookup: its own ranking, or the global fallback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    Product(&'a [RankedUser]),
    Fallback(&'a [RankedUser]),
}

/// Precomputed rankings for one training run. Immutable once built or loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationCache {
    metadata: CacheMetadata,
    products: HashMap<i64, Vec<RankedUser>>,
    product_keys: Vec<i64>,
    fallback: Vec<RankedUser>,
    total_entries: usize,
}

impl RecommendationCache {
    pub fn build(
        metadata: CacheMetadata,
        ranked: Vec<(i64, Vec<RankedUser>)>,
        fallback: Vec<RankedUser>,
    ) -> Self {
        let mut product_keys: Vec<i64> = ranked.iter().map(|(product_id, _)| *product_id).collect();
        product_keys.sort_unstable();
        product_keys.dedup();

        let total_entries = ranked.iter().map(|(_, list)| list.len()).sum();
        let products = ranked.into_iter().collect();

        Self {
            metadata,
            products,
            product_keys,
            fallback,
            total_entries,
        }
    }

    pub fn lookup(&self, product_id: i64) -> Lookup<'_> {
        match self.products.get(&product_id) {
            Some(list) => Lookup::Product(list),
            None => Lookup::Fallback(&self.fallback),
        }
    }

    pub fn metadata(&self) -> &CacheMetadata {
        &self.metadata
    }

    pub fn fallback(&self) -> &[RankedUser] {
        &self.fallback
    }

    pub fn product_keys(&self) -> &[i64] {
        &self.product_keys
    }

    pub fn product_count(&self) -> usize {
        self.product_keys.len()
    }

    pub fn total_entries(&self) -> usize {
        self.total_entries
    }

    /// All rows, grouped by ascending product id and ordered by rank.
    pub fn entries(&self) -> impl Iterator<Item = RecommendationEntry> + '_ {
        self.product_keys.iter().flat_map(move |product_id| {
            self.products[product_id].iter().map(move |user| RecommendationEntry {
                product_id: *product_id,
                user_id: user.user_id,
                score: user.score,
                rank: user.rank,
            })
        })
    }

    pub fn to_artifact(&self) -> CacheArtifact {
        let mut table = RecommendationTable::with_capacity(self.total_entries);
        for entry in self.entries() {
            table.product_id.push(entry.product_id);
            table.user_id.push(entry.user_id);
            table.score.push(entry.score);
            table.rank.push(entry.rank);
        }

        CacheArtifact {
            format_version: FORMAT_VERSION,
            products: self.product_keys.clone(),
            table,
            fallback: FallbackTable {
                user_id: self.fallback.iter().map(|u| u.user_id).collect(),
                score: self.fallback.iter().map(|u| u.score).collect(),
                rank: self.fallback.iter().map(|u| u.rank).collect(),
            },
        }
    }

    pub fn persist(&self, dir: &Path) -> Result<(), CacheError> {
        let recommendations =
            serde_json::to_vec(&self.to_artifact()).map_err(|e| CacheError::Persist(e.into()))?;
        let metadata =
            serde_json::to_vec_pretty(&self.metadata).map_err(|e| CacheError::Persist(e.into()))?;

        write_atomic(&dir.join(RECOMMENDATIONS_FILE), &recommendations)
            .map_err(CacheError::Persist)?;
        write_atomic(&dir.join(METADATA_FILE), &metadata).map_err(CacheError::Persist)?;

        info!(
            "Persisted cache to {}: {} products, {} recommendations",
            dir.display(),
            self.product_count(),
            self.total_entries
        );
        Ok(())
    }

    /// Loads and fully validates an artifact directory. Any defect fails the whole load.
    pub fn load(dir: &Path) -> Result<Self, CacheError> {
        let artifact: CacheArtifact = read_json(&dir.join(RECOMMENDATIONS_FILE))?;
        let metadata: CacheMetadata = read_json(&dir.join(METADATA_FILE))?;

        let cache = Self::from_artifact(metadata, artifact)?;
        info!(
            "Loaded cache from {}: {} products, {} recommendations, {} fallback users",
            dir.display(),
            cache.product_count(),
            cache.total_entries,
            cache.fallback.len()
        );
        Ok(cache)
    }

    pub fn from_artifact(
        metadata: CacheMetadata,
        artifact: CacheArtifact,
    ) -> Result<Self, CacheError> {
        if artifact.format_version != FORMAT_VERSION {
            return Err(CacheError::UnsupportedVersion(artifact.format_version));
        }
        if !artifact.products.windows(2).all(|w| w[0] < w[1]) {
            return Err(CacheError::Invalid("product keys are not strictly ascending".into()));
        }
        if artifact.products.len() != metadata.product_count {
            return Err(CacheError::Invalid(format!(
                "metadata reports {} products but the table holds {}",
                metadata.product_count,
                artifact.products.len()
            )));
        }

        let table = &artifact.table;
        if !table.columns_aligned() {
            return Err(CacheError::Invalid("recommendation columns have different lengths".into()));
        }

        let mut products: HashMap<i64, Vec<RankedUser>> =
            artifact.products.iter().map(|&product_id| (product_id, Vec::new())).collect();

        // Rows arrive grouped by ascending product id; a step backwards means a split group.
        let mut previous: Option<i64> = None;
        for row in 0..table.rows() {
            let product_id = table.product_id[row];
            if previous.is_some_and(|p| product_id < p) {
                return Err(CacheError::Invalid(format!(
                    "rows for product {} are not contiguous",
                    product_id
                )));
            }
            previous = Some(product_id);

            let list = products.get_mut(&product_id).ok_or_else(|| {
                CacheError::Invalid(format!("row references unknown product {}", product_id))
            })?;
            list.push(RankedUser {
                user_id: table.user_id[row],
                score: table.score[row],
                rank: table.rank[row],
            });
        }

        for (product_id, list) in &products {
            if list.len() > metadata.top_n {
                return Err(CacheError::Invalid(format!(
                    "product {} has {} entries, more than top_n {}",
                    product_id,
                    list.len(),
                    metadata.top_n
                )));
            }
            validate_ranked_list(list)
                .map_err(|e| CacheError::Invalid(format!("product {}: {}", product_id, e)))?;
        }

        let fallback_table = &artifact.fallback;
        if !fallback_table.columns_aligned() {
            return Err(CacheError::Invalid("fallback columns have different lengths".into()));
        }
        let fallback: Vec<RankedUser> = fallback_table
            .user_id
            .iter()
            .zip(&fallback_table.score)
            .zip(&fallback_table.rank)
            .map(|((&user_id, &score), &rank)| RankedUser { user_id, score, rank })
            .collect();
        if fallback.len() > metadata.fallback_size {
            return Err(CacheError::Invalid("fallback list is longer than fallback_size".into()));
        }
        validate_ranked_list(&fallback)
            .map_err(|e| CacheError::Invalid(format!("fallback: {}", e)))?;

        Ok(Self {
            total_entries: table.rows(),
            product_keys: artifact.products,
            products,
            fallback,
            metadata,
        })
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CacheError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CacheError::Missing(path.to_path_buf()))
        }
        Err(source) => {
            return Err(CacheError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_slice(&bytes).map_err(|source| CacheError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}
