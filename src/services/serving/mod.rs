use crate::config::ServingConfig;
use crate::models::*;
use crate::services::cache::{CacheError, Lookup, RecommendationCache};
use crate::utils::validation::validate_requested_count;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServeError {
    #[error("n must be between 1 and {max}, got {requested}")]
    InvalidCount { requested: i64, max: usize },
}

#[derive(Debug, Default)]
pub struct ServingStats {
    requests_total: AtomicU64,
    cold_start_total: AtomicU64,
    rejected_total: AtomicU64,
    max_latency_us: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub requests_total: u64,
    pub cold_start_total: u64,
    pub rejected_total: u64,
    pub max_latency_us: u64,
}

impl ServingStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            cold_start_total: self.cold_start_total.load(Ordering::Relaxed),
            rejected_total: self.rejected_total.load(Ordering::Relaxed),
            max_latency_us: self.max_latency_us.load(Ordering::Relaxed),
        }
    }

    fn record(&self, cold_start: bool, started: Instant) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if cold_start {
            self.cold_start_total.fetch_add(1, Ordering::Relaxed);
        }
        let elapsed = started.elapsed().as_micros().min(u128::from(u64::MAX)) as u64;
        self.max_latency_us.fetch_max(elapsed, Ordering::Relaxed);
    }
}

/// Answers recommendation requests from an in-memory cache snapshot.
///
/// The lock only guards the `Arc`: readers clone it and release immediately,
/// so a reload swaps the whole snapshot and in-flight requests finish on the
/// one they started with.
pub struct ServingService {
    snapshot: RwLock<Arc<RecommendationCache>>,
    config: ServingConfig,
    stats: ServingStats,
}

impl ServingService {
    pub fn new(cache: RecommendationCache, config: ServingConfig) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(cache)),
            config,
            stats: ServingStats::default(),
        }
    }

    pub fn load(dir: &Path, config: ServingConfig) -> Result<Self, CacheError> {
        let cache = RecommendationCache::load(dir)?;
        Ok(Self::new(cache, config))
    }

    pub fn config(&self) -> &ServingConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Arc<RecommendationCache> {
        self.snapshot.read().clone()
    }

    /// Installs `cache` and returns the snapshot it replaced.
    pub fn swap(&self, cache: RecommendationCache) -> Arc<RecommendationCache> {
        let next = Arc::new(cache);
        std::mem::replace(&mut *self.snapshot.write(), next)
    }

    /// Loads a new artifact and swaps it in. On failure the current snapshot keeps serving.
    pub fn reload(&self, dir: &Path) -> Result<(), CacheError> {
        match RecommendationCache::load(dir) {
            Ok(cache) => {
                let products = cache.product_count();
                let previous = self.swap(cache);
                info!(
                    "Reloaded cache from {}: {} products (was {})",
                    dir.display(),
                    products,
                    previous.product_count()
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    "Cache reload from {} failed, keeping current snapshot: {}",
                    dir.display(),
                    e
                );
                Err(e)
            }
        }
    }

    pub fn recommend(&self, product_id: i64, n: i64) -> Result<RecommendationResponse, ServeError> {
        let started = Instant::now();

        let n = validate_requested_count(n, self.config.max_n).map_err(|_| {
            self.stats.rejected_total.fetch_add(1, Ordering::Relaxed);
            ServeError::InvalidCount {
                requested: n,
                max: self.config.max_n,
            }
        })?;

        let cache = self.snapshot();
        let (list, source) = match cache.lookup(product_id) {
            Lookup::Product(list) => (list, RecommendationSource::ProductHistory),
            Lookup::Fallback(list) => (list, RecommendationSource::ColdStartFallback),
        };

        let take = n.min(list.len());
        let response =
            RecommendationResponse::new(product_id, list[..take].to_vec(), list.len(), source);

        self.stats.record(response.is_cold_start(), started);
        debug!(
            "Served {} recommendations for product {} ({:?})",
            response.count, product_id, source
        );
        Ok(response)
    }

    /// Distinct random product keys for client discovery.
    pub fn sample_products(&self, n: i64) -> Result<SampleProductsResponse, ServeError> {
        let n = validate_requested_count(n, self.config.max_n).map_err(|_| {
            ServeError::InvalidCount {
                requested: n,
                max: self.config.max_n,
            }
        })?;

        let cache = self.snapshot();
        let keys = cache.product_keys();
        let sample_products = keys.choose_multiple(&mut rand::thread_rng(), n).copied().collect();

        Ok(SampleProductsResponse {
            sample_products,
            total_available: keys.len(),
        })
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "healthy".to_string(),
            model_loaded: true,
            products: self.snapshot().product_count(),
        }
    }

    pub fn metrics(&self) -> MetricsResponse {
        let cache = self.snapshot();
        let metadata = cache.metadata();
        let stats = self.stats.snapshot();

        MetricsResponse {
            model_type: metadata.model_type.clone(),
            recency_window_days: metadata.recency_window_days,
            trained_at: metadata.trained_at,
            user_count: metadata.user_count,
            product_count: metadata.product_count,
            available_products: cache.product_count(),
            cached_recommendations: cache.total_entries(),
            fallback_size: cache.fallback().len(),
            requests_total: stats.requests_total,
            cold_start_total: stats.cold_start_total,
            rejected_total: stats.rejected_total,
            max_latency_us: stats.max_latency_us,
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
