use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),
    #[error("invalid server address {0}")]
    Address(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub training: TrainingConfig,
    pub serving: ServingConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub request_timeout_ms: u64,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::Address(addr))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Trailing window, in days, that counts as "recent" activity.
    pub recency_days: u32,
    /// Candidates kept per product.
    pub top_n: usize,
    /// Length of the product-independent cold-start list.
    pub fallback_size: usize,
    pub train_fraction: f64,
    pub k_values: Vec<usize>,
    pub sample_fraction: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServingConfig {
    pub max_n: usize,
    pub default_n: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub interactions: PathBuf,
    pub models_dir: PathBuf,
    pub results_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                workers: num_cpus::get(),
                request_timeout_ms: 1000,
            },
            training: TrainingConfig {
                recency_days: 30,
                top_n: 100,
                fallback_size: 100,
                train_fraction: 0.8,
                k_values: vec![5, 10, 20],
                sample_fraction: 0.1,
                seed: 42,
            },
            serving: ServingConfig {
                max_n: 100,
                default_n: 10,
            },
            paths: PathsConfig {
                interactions: PathBuf::from("data/processed/interactions.jsonl"),
                models_dir: PathBuf::from("models"),
                results_dir: PathBuf::from("results"),
            },
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::build(path, true)
    }

    /// Like `from_file`, but a missing file leaves defaults and environment overrides.
    pub fn load_or_default(path: &str) -> Result<Self, ConfigError> {
        if !std::path::Path::new(path).exists() {
            tracing::info!("Config file {} not found, using default configuration", path);
        }
        Self::build(path, false)
    }

    fn build(path: &str, required: bool) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(config::File::with_name(path).required(required))
            .add_source(
                config::Environment::with_prefix("AUDIENCE_REC")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let serving = &self.serving;
        let training = &self.training;

        if serving.max_n == 0 {
            return Err(ConfigError::Invalid("serving.max_n must be at least 1".into()));
        }
        if serving.default_n == 0 || serving.default_n > serving.max_n {
            return Err(ConfigError::Invalid(format!(
                "serving.default_n must be within [1, {}]",
                serving.max_n
            )));
        }
        if training.top_n == 0 {
            return Err(ConfigError::Invalid("training.top_n must be at least 1".into()));
        }
        if training.fallback_size < serving.max_n {
            return Err(ConfigError::Invalid(format!(
                "training.fallback_size ({}) must cover serving.max_n ({})",
                training.fallback_size, serving.max_n
            )));
        }
        if !(training.train_fraction > 0.0 && training.train_fraction < 1.0) {
            return Err(ConfigError::Invalid("training.train_fraction must be in (0, 1)".into()));
        }
        if !(training.sample_fraction > 0.0 && training.sample_fraction <= 1.0) {
            return Err(ConfigError::Invalid("training.sample_fraction must be in (0, 1]".into()));
        }
        if training.k_values.is_empty() || training.k_values.contains(&0) {
            return Err(ConfigError::Invalid(
                "training.k_values must be non-empty and positive".into(),
            ));
        }
        if self.server.workers == 0 {
            return Err(ConfigError::Invalid("server.workers must be at least 1".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.serving.max_n, 100);
        assert_eq!(config.training.recency_days, 30);
        assert!(config.server.socket_addr().is_ok());
    }

    #[test]
    fn test_fallback_must_cover_max_n() {
        let mut config = Config::default();
        config.training.fallback_size = 50;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_default_n_bounded_by_max_n() {
        let mut config = Config::default();
        config.serving.default_n = 101;
        assert!(config.validate().is_err());

        config.serving.default_n = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_host_is_rejected() {
        let mut config = Config::default();
        config.server.host = "not a host".to_string();
        assert!(matches!(config.server.socket_addr(), Err(ConfigError::Address(_))));
    }

    #[test]
    fn test_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[serving]\nmax_n = 50\ndefault_n = 5\n").unwrap();

        let config = Config::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.serving.max_n, 50);
        assert_eq!(config.serving.default_n, 5);
        assert_eq!(config.training.top_n, 100);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let config = Config::load_or_default(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 8000);
        assert!(Config::from_file(path.to_str().unwrap()).is_err());
    }
}
