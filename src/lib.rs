pub mod algorithms;
pub mod api;
pub mod config;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use models::*;

use anyhow::{Context, Result};
use services::cache::RecommendationCache;
use services::serving::ServingService;
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub serving: Arc<ServingService>,
}

impl AppState {
    /// Loads the cache artifact named by the config. Failure here must stop startup.
    pub fn new(config: Config) -> Result<Self> {
        let models_dir = config.paths.models_dir.clone();
        let serving = ServingService::load(&models_dir, config.serving.clone())
            .with_context(|| {
                format!("failed to load recommendation cache from {}", models_dir.display())
            })?;

        Ok(Self {
            config: Arc::new(config),
            serving: Arc::new(serving),
        })
    }

    pub fn from_cache(config: Config, cache: RecommendationCache) -> Self {
        let serving = ServingService::new(cache, config.serving.clone());
        Self {
            config: Arc::new(config),
            serving: Arc::new(serving),
        }
    }

    /// Reloads the cache from `paths.models_dir` on a blocking thread.
    /// A failed load or a panicked task leaves the current snapshot serving.
    pub async fn reload(&self) -> Result<()> {
        let serving = self.serving.clone();
        let dir = self.config.paths.models_dir.clone();

        match tokio::task::spawn_blocking(move || serving.reload(&dir)).await {
            Ok(result) => result.context("cache reload failed"),
            Err(e) => {
                error!("Cache reload task did not complete: {}", e);
                Err(e).context("cache reload task did not complete")
            }
        }
    }
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
