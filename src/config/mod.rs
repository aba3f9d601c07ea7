//! Configuration management for Lexica
//!
//! Loads the TOML configuration, applies `LEXICA_*` environment overrides and
//! validates the result before any build or query runs.

use crate::error::{LexicaError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub lexical: LexicalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub authority: AuthorityConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

/// BM25 parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexicalConfig {
    pub k1: f64,
    pub b: f64,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Hashed trigram embedding parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub dims: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { dims: 1024 }
    }
}

/// Message graph construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Same-topic neighbours kept per source message
    pub same_topic_k: usize,
    /// Cosine floor for a same-topic edge
    pub same_topic_min_cos: f32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            same_topic_k: 3,
            same_topic_min_cos: 0.60,
        }
    }
}

/// Offline personalized PageRank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityConfig {
    /// Teleport probability
    pub alpha: f64,
    pub half_life_days: f64,
    pub iterations: usize,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            alpha: 0.15,
            half_life_days: 180.0,
            iterations: 100,
        }
    }
}

/// Query-time hybrid fusion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Depth of each first-stage recall list
    pub recall_depth: usize,
    /// Teleport probability of the candidate-restricted PageRank
    pub ppr_alpha: f64,
    pub ppr_iterations: usize,
    /// Exponent applied to the BM25 part of the seed weight
    pub beta: f64,
    /// Exponent applied to the semantic part of the seed weight
    pub gamma: f64,
    pub freshness_half_life_days: f64,
    pub snippet_chars: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            recall_depth: 400,
            ppr_alpha: 0.2,
            ppr_iterations: 20,
            beta: 1.0,
            gamma: 1.0,
            freshness_half_life_days: 90.0,
            snippet_chars: 800,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LexicaError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            LexicaError::io(e, format!("Failed to read config file: {:?}", path))
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults plus env overrides
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }

        tracing::warn!(
            "Config file not found at {}, using defaults. Run 'lexica config init' to create one.",
            path.display()
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| {
            LexicaError::io(e, format!("Failed to write config file: {:?}", path))
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: LEXICA_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("LEXICA_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "DATA_DIR" | "STORAGE__DATA_DIR" => {
                self.storage.data_dir = PathBuf::from(value);
            }
            "LEXICAL__K1" => self.lexical.k1 = parse_value(path, value)?,
            "LEXICAL__B" => self.lexical.b = parse_value(path, value)?,
            "EMBEDDING__DIMS" => self.embedding.dims = parse_value(path, value)?,
            "GRAPH__SAME_TOPIC_K" => self.graph.same_topic_k = parse_value(path, value)?,
            "GRAPH__SAME_TOPIC_MIN_COS" => {
                self.graph.same_topic_min_cos = parse_value(path, value)?
            }
            "AUTHORITY__ALPHA" => self.authority.alpha = parse_value(path, value)?,
            "AUTHORITY__HALF_LIFE_DAYS" => {
                self.authority.half_life_days = parse_value(path, value)?
            }
            "AUTHORITY__ITERATIONS" => self.authority.iterations = parse_value(path, value)?,
            "FUSION__RECALL_DEPTH" => self.fusion.recall_depth = parse_value(path, value)?,
            "FUSION__PPR_ALPHA" => self.fusion.ppr_alpha = parse_value(path, value)?,
            "FUSION__PPR_ITERATIONS" => self.fusion.ppr_iterations = parse_value(path, value)?,
            "FUSION__BETA" => self.fusion.beta = parse_value(path, value)?,
            "FUSION__GAMMA" => self.fusion.gamma = parse_value(path, value)?,
            "FUSION__FRESHNESS_HALF_LIFE_DAYS" => {
                self.fusion.freshness_half_life_days = parse_value(path, value)?
            }
            "FUSION__SNIPPET_CHARS" => self.fusion.snippet_chars = parse_value(path, value)?,
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| LexicaError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("lexica").join("config.toml"))
    }

    /// Data directory with a leading `~/` expanded
    pub fn data_dir(&self) -> Result<PathBuf> {
        expand_path(&self.storage.data_dir)
    }
}

fn parse_value<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| LexicaError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

/// Expand a leading `~/` to the home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| LexicaError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| LexicaError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("~/.lexica"),
            },
            lexical: LexicalConfig::default(),
            embedding: EmbeddingConfig::default(),
            graph: GraphConfig::default(),
            authority: AuthorityConfig::default(),
            fusion: FusionConfig::default(),
        }
    }
}
