//! Configuration for Affinity
//!
//! Loaded from TOML; every field has a default so an empty file (or no file)
//! is a valid configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "affinity.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub preference: PreferenceConfig,
    pub ranking: RankingConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Offline feature hashing
    Hashing,
    /// OpenAI-compatible `/embeddings` endpoint
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding dimension D, fixed for the process
    pub dimension: usize,
    pub provider: EmbeddingProvider,
    pub model: String,
    pub endpoint: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            provider: EmbeddingProvider::Hashing,
            model: "all-minilm-l6-v2".to_string(),
            endpoint: "http://localhost:8081/v1".to_string(),
            api_key_env: "AFFINITY_EMBEDDING_API_KEY".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Weighted sum of every qualifying embedding
    Sum,
    /// Weighted mean of approvals minus weighted mean of rejections
    Mean,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreferenceConfig {
    pub approve_weight: f32,
    pub reject_weight: f32,
    pub aggregation: Aggregation,
    /// Scale the preference vector to unit length
    pub normalize: bool,
}

impl Default for PreferenceConfig {
    fn default() -> Self {
        Self {
            approve_weight: 1.0,
            reject_weight: 1.0,
            aggregation: Aggregation::Sum,
            normalize: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RankingConfig {
    /// Items scoring below this are dropped; -1.0 keeps everything
    pub min_score: f32,
    /// Multiply each score by an age-bucket boost
    pub recency_boost: bool,
    pub recency: RecencyBoosts,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_score: -1.0,
            recency_boost: false,
            recency: RecencyBoosts::default(),
        }
    }
}

/// Multipliers by item age
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecencyBoosts {
    pub within_1h: f32,
    pub within_6h: f32,
    pub within_24h: f32,
    pub within_3d: f32,
    pub within_7d: f32,
    pub older: f32,
}

impl Default for RecencyBoosts {
    fn default() -> Self {
        Self {
            within_1h: 2.0,
            within_6h: 1.8,
            within_24h: 1.5,
            within_3d: 1.3,
            within_7d: 1.1,
            older: 1.0,
        }
    }
}

impl RecencyBoosts {
    fn all(&self) -> [f32; 6] {
        [
            self.within_1h,
            self.within_6h,
            self.within_24h,
            self.within_3d,
            self.within_7d,
            self.older,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    /// Distinct request shapes kept per user before the oldest is evicted
    pub max_entries_per_user: usize,
    /// How often a request triggers a sweep of stale and expired entries
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 86_400,
            max_entries_per_user: crate::cache::DEFAULT_MAX_ENTRIES_PER_USER,
            sweep_interval_secs: crate::cache::DEFAULT_SWEEP_INTERVAL.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            path: PathBuf::from("affinity.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::load_from_str(&content)
    }

    /// Load configuration from string
    pub fn load_from_str(content: &str) -> Result<Self> {
        let mut config: Self =
            toml::from_str(content).context("Failed to parse configuration")?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, or `affinity.toml` if present, or defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_file(p),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::load_from_file(DEFAULT_CONFIG_FILE)
            }
            None => Self::load_from_str(""),
        }
    }

    /// AFFINITY_DB_PATH, AFFINITY_PORT and AFFINITY_LOG win over the file
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("AFFINITY_DB_PATH") {
            self.storage.path = PathBuf::from(path);
        }
        if let Ok(port) = std::env::var("AFFINITY_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("AFFINITY_PORT is not a port: {}", port))?;
        }
        if let Ok(level) = std::env::var("AFFINITY_LOG") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            anyhow::bail!("embedding.dimension must be positive");
        }
        if self.embedding.timeout_secs == 0 {
            anyhow::bail!("embedding.timeout_secs must be positive");
        }
        if !(self.preference.approve_weight > 0.0) || !(self.preference.reject_weight > 0.0) {
            anyhow::bail!(
                "preference weights must be positive (approve = {}, reject = {})",
                self.preference.approve_weight,
                self.preference.reject_weight
            );
        }
        if !(-1.0..=1.0).contains(&self.ranking.min_score) {
            anyhow::bail!(
                "ranking.min_score must be within [-1, 1], got {}",
                self.ranking.min_score
            );
        }
        if self.ranking.recency.all().iter().any(|b| !(*b > 0.0)) {
            anyhow::bail!("ranking.recency boosts must be positive");
        }
        if self.cache.ttl_secs == 0 {
            anyhow::bail!("cache.ttl_secs must be positive");
        }
        if self.cache.max_entries_per_user == 0 {
            anyhow::bail!("cache.max_entries_per_user must be positive");
        }
        Ok(())
    }

    /// Render as TOML (for `affinity config`)
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}
